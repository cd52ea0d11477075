//! Configuration constants and validation functions for binding rules.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{BindingError, Result};

/// Namespace URI reserved for namespace declaration attributes.
pub const XMLNS_ATTRIBUTE_NS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Attribute name used for namespace declarations.
pub const XMLNS_ATTRIBUTE: &str = "xmlns";

/// Namespace URI bound to the implicit `xml` prefix.
pub const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace URI of W3C XML Schema documents.
pub const XML_SCHEMA_NS_URI: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace URI of schema instance attributes (`xsi:type`, `xsi:nil`).
pub const XML_SCHEMA_INSTANCE_NS_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Declaration written ahead of serialized documents unless omitted.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\"?>\n";

/// Selector token addressing the whole document rather than an element path.
pub const DOCUMENT_FRAGMENT_SELECTOR: &str = "#document";

/// Descriptor key postfix declaring a namespace URI.
pub const DESCRIPTOR_NAMESPACE_POSTFIX: &str = ".namespace";

/// Descriptor key postfix locating a namespace's XML schema.
pub const DESCRIPTOR_SCHEMA_LOCATION_POSTFIX: &str = ".schemaLocation";

/// Descriptor key postfix locating a namespace's binding configuration.
pub const DESCRIPTOR_BINDING_CONFIG_LOCATION_POSTFIX: &str = ".bindingConfigLocation";

/// Descriptor key postfix carrying a namespace's sort order.
pub const DESCRIPTOR_ORDER_POSTFIX: &str = ".order";

/// Order assigned to namespaces that declare none; sorts last.
pub const DEFAULT_NAMESPACE_ORDER: i32 = i32::MAX;

/// Alias that selects the default writer or bean factory. Reserved.
pub const DEFAULT_ALIAS: &str = "default";

/// Writer alias the default alias resolves to.
pub const XML_WRITER_ALIAS: &str = "xml";

/// Bean factory alias the default alias resolves to.
pub const BASIC_FACTORY_ALIAS: &str = "basic";

/// Decoder parameter naming a date format.
pub const DATE_FORMAT_PARAM: &str = "format";

/// Date format used when a binding configures none.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Bean ids: a letter or underscore followed by word characters, dots or dashes.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BEAN_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"));

/// XML names without a prefix (NCName, ASCII subset).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NCNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"));

/// Validate a bean id.
///
/// # Examples
/// ```
/// use beanbinder::config::validate_bean_id;
///
/// assert!(validate_bean_id("orderItem").is_ok());
/// assert!(validate_bean_id("order-item.1").is_ok());
/// assert!(validate_bean_id("1order").is_err());
/// assert!(validate_bean_id("").is_err());
/// ```
pub fn validate_bean_id(bean_id: &str) -> Result<()> {
    if BEAN_ID_PATTERN.is_match(bean_id) {
        Ok(())
    } else {
        Err(BindingError::Config(format!(
            "Invalid bean id '{bean_id}'. Bean ids must start with a letter or underscore."
        )))
    }
}

/// Validate an unprefixed XML name used in a selector step.
///
/// # Examples
/// ```
/// use beanbinder::config::validate_ncname;
///
/// assert!(validate_ncname("order-item").is_ok());
/// assert!(validate_ncname("a:b").is_err());
/// ```
pub fn validate_ncname(name: &str) -> Result<()> {
    if NCNAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(BindingError::Config(format!("Invalid XML name '{name}'.")))
    }
}

/// Validate a writer or bean factory alias before it is registered.
///
/// The `default` alias is reserved: it selects whichever strategy the
/// registry treats as its default.
///
/// # Examples
/// ```
/// use beanbinder::config::validate_alias;
///
/// assert!(validate_alias("xml").is_ok());
/// assert!(validate_alias("default").is_err());
/// assert!(validate_alias(" ").is_err());
/// ```
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.trim().is_empty() {
        return Err(BindingError::Config("Alias must not be empty.".to_string()));
    }
    if alias == DEFAULT_ALIAS {
        return Err(BindingError::Config(format!(
            "The alias '{DEFAULT_ALIAS}' is a reserved alias name. Please use a different name."
        )));
    }
    Ok(())
}

/// Parse the `<id>.order` value of a descriptor.
///
/// A missing value sorts last.
///
/// # Examples
/// ```
/// use beanbinder::config::{parse_order, DEFAULT_NAMESPACE_ORDER};
///
/// assert_eq!(parse_order("a", Some(" 10 ")).unwrap(), 10);
/// assert_eq!(parse_order("a", None).unwrap(), DEFAULT_NAMESPACE_ORDER);
/// assert!(parse_order("a", Some("first")).is_err());
/// ```
pub fn parse_order(namespace_id: &str, raw: Option<&str>) -> Result<i32> {
    match raw {
        None => Ok(DEFAULT_NAMESPACE_ORDER),
        Some(value) => value.trim().parse::<i32>().map_err(|_| {
            BindingError::Config(format!(
                "Invalid value for descriptor config value '{namespace_id}{DESCRIPTOR_ORDER_POSTFIX}'. Must be a valid Integer value."
            ))
        }),
    }
}
