//! Composite schema built from the XSDs of every descriptor namespace.
//!
//! Validation is structural over the XSD subset binding documents use:
//! global and local element declarations, named and anonymous complex
//! types with sequence, choice, all, group and wildcard particles, simple
//! and complex content derivation, attribute declarations and attribute
//! groups, and simple types restricted by enumeration, pattern and length
//! facets. Identity constraints, substitution groups, list and union types
//! are not checked.

mod matcher;
mod reader;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use roxmltree::{Document, Node};

use crate::config::{XML_SCHEMA_INSTANCE_NS_URI, XML_SCHEMA_NS_URI};
use crate::error::{BindingError, Result};
use crate::xml::{element_text, get_tag_name, source_position};

use matcher::ContentMatcher;
use reader::SchemaReader;

/// Limit on type derivation chains and group reference nesting.
const MAX_REFERENCE_DEPTH: usize = 32;

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TIMEZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-][0-9]{2}:[0-9]{2})$").expect("valid regex"));

static ANY_SIMPLE: SimpleType = SimpleType::BuiltIn(BuiltIn::AnySimple);

/// Expanded name of a schema component or document element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Name {
    namespace: String,
    local: String,
}

impl Name {
    fn new(namespace: &str, local: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            local: local.to_string(),
        }
    }

    fn of(node: Node<'_, '_>) -> Self {
        Self::new(
            node.tag_name().namespace().unwrap_or_default(),
            node.tag_name().name(),
        )
    }

    fn is_xsd(&self) -> bool {
        self.namespace == XML_SCHEMA_NS_URI
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Built-in simple types with a lexical check. Other XSD built-ins accept
/// any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltIn {
    AnySimple,
    String,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
    Double,
    Date,
    DateTime,
}

impl BuiltIn {
    fn from_local(local: &str) -> Self {
        match local {
            "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "ID"
            | "IDREF" | "anyURI" | "NMTOKEN" => Self::String,
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "integer" => Self::Integer,
            "nonNegativeInteger" => Self::NonNegativeInteger,
            "positiveInteger" => Self::PositiveInteger,
            "decimal" => Self::Decimal,
            "double" | "float" => Self::Double,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "anySimpleType" | "anyType" => Self::AnySimple,
            other => {
                tracing::debug!(type_name = %other, "Built-in type is not checked");
                Self::AnySimple
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::AnySimple => "xs:anySimpleType",
            Self::String => "xs:string",
            Self::Boolean => "xs:boolean",
            Self::Byte => "xs:byte",
            Self::Short => "xs:short",
            Self::Int => "xs:int",
            Self::Long => "xs:long",
            Self::Integer => "xs:integer",
            Self::NonNegativeInteger => "xs:nonNegativeInteger",
            Self::PositiveInteger => "xs:positiveInteger",
            Self::Decimal => "xs:decimal",
            Self::Double => "xs:double",
            Self::Date => "xs:date",
            Self::DateTime => "xs:dateTime",
        }
    }

    fn accepts(self, raw: &str) -> bool {
        let value = raw.trim();
        match self {
            Self::AnySimple | Self::String => true,
            Self::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Self::Byte => value.parse::<i8>().is_ok(),
            Self::Short => value.parse::<i16>().is_ok(),
            Self::Int => value.parse::<i32>().is_ok(),
            Self::Long => value.parse::<i64>().is_ok(),
            Self::Integer => INTEGER.is_match(value),
            Self::NonNegativeInteger => {
                INTEGER.is_match(value) && !(value.starts_with('-') && has_nonzero_digit(value))
            }
            Self::PositiveInteger => {
                INTEGER.is_match(value) && !value.starts_with('-') && has_nonzero_digit(value)
            }
            Self::Decimal => DECIMAL.is_match(value),
            Self::Double => matches!(value, "INF" | "-INF" | "NaN") || value.parse::<f64>().is_ok(),
            Self::Date => NaiveDate::parse_from_str(strip_timezone(value), "%Y-%m-%d").is_ok(),
            Self::DateTime => {
                NaiveDateTime::parse_from_str(strip_timezone(value), "%Y-%m-%dT%H:%M:%S%.f")
                    .is_ok()
            }
        }
    }
}

fn has_nonzero_digit(value: &str) -> bool {
    value.bytes().any(|b| (b'1'..=b'9').contains(&b))
}

fn strip_timezone(value: &str) -> &str {
    TIMEZONE.find(value).map_or(value, |zone| &value[..zone.start()])
}

#[derive(Debug, Clone)]
enum SimpleType {
    BuiltIn(BuiltIn),
    /// A user-defined simple type, or a complex type with simple content.
    Named(Name),
    Restricted(Box<Restriction>),
}

#[derive(Debug, Clone)]
struct Restriction {
    base: SimpleType,
    enumeration: Vec<String>,
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

#[derive(Debug, Clone)]
enum Content {
    /// `xs:anyType`: anything goes, children are checked laxly.
    Any,
    Simple(SimpleType),
    Complex(Box<ComplexType>),
    Named(Name),
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: Name,
    content: Content,
}

#[derive(Debug, Clone, Default)]
struct ComplexType {
    derivation: Option<Derivation>,
    /// Set for simple content.
    simple_base: Option<SimpleType>,
    particle: Option<Particle>,
    attributes: Vec<AttributeUse>,
    attribute_groups: Vec<Name>,
    any_attribute: bool,
    mixed: bool,
}

#[derive(Debug, Clone)]
struct Derivation {
    base: Name,
    extension: bool,
}

#[derive(Debug, Clone)]
struct AttributeUse {
    name: Name,
    /// `None` for references to a global attribute.
    ty: Option<SimpleType>,
    required: bool,
    prohibited: bool,
}

#[derive(Debug, Clone, Default)]
struct AttributeGroup {
    attributes: Vec<AttributeUse>,
    groups: Vec<Name>,
    any_attribute: bool,
}

#[derive(Debug, Clone)]
struct Particle {
    min: u32,
    /// `None` is unbounded.
    max: Option<u32>,
    term: Term,
}

#[derive(Debug, Clone)]
enum Term {
    Element(ElementDecl),
    Ref(Name),
    Group(Name),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    All(Vec<Particle>),
    Any(Wildcard),
}

#[derive(Debug, Clone)]
struct Wildcard {
    namespaces: NamespaceConstraint,
    process: Process,
}

impl Wildcard {
    fn allows(&self, namespace: &str) -> bool {
        match &self.namespaces {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => !namespace.is_empty() && namespace != target,
            NamespaceConstraint::Only(allowed) => allowed.iter().any(|uri| uri == namespace),
        }
    }
}

#[derive(Debug, Clone)]
enum NamespaceConstraint {
    Any,
    /// `##other`: qualified and not in the given target namespace.
    Other(String),
    Only(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Process {
    Skip,
    Lax,
    Strict,
}

/// Content model, attributes and text rules of a complex type with its
/// derivation chain resolved.
#[derive(Default)]
struct Effective<'s> {
    particles: Vec<&'s Particle>,
    attributes: Vec<&'s AttributeUse>,
    any_attribute: bool,
    mixed: bool,
    simple: Option<&'s SimpleType>,
}

/// Element declarations and wildcards reachable from a content model.
#[derive(Default)]
struct Declarations<'s> {
    elements: HashMap<&'s Name, &'s Content>,
    wildcards: Vec<&'s Wildcard>,
}

/// Schema components of every added XSD, by expanded name.
#[derive(Debug, Clone, Default)]
pub struct CompositeSchema {
    namespaces: BTreeSet<String>,
    elements: HashMap<Name, ElementDecl>,
    complex_types: HashMap<Name, ComplexType>,
    simple_types: HashMap<Name, SimpleType>,
    groups: HashMap<Name, Particle>,
    attributes: HashMap<Name, AttributeUse>,
    attribute_groups: HashMap<Name, AttributeGroup>,
}

impl CompositeSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one XSD document.
    ///
    /// `namespace` is the descriptor namespace the schema was resolved for;
    /// the schema's own `targetNamespace` decides which elements it governs.
    /// Nothing is added when the source is rejected.
    ///
    /// # Errors
    /// Returns `BindingError::SchemaResolution` when the source is not
    /// well-formed, is not an XML schema or uses malformed declarations.
    pub fn add_source(&mut self, namespace: &str, xsd: &str) -> Result<()> {
        let document = Document::parse(xsd).map_err(|e| BindingError::SchemaResolution {
            namespace: namespace.to_string(),
            reason: format!("schema is not well-formed: {e}"),
        })?;
        let root = document.root_element();
        if !is_xsd(root, "schema") {
            return Err(BindingError::SchemaResolution {
                namespace: namespace.to_string(),
                reason: format!("root element '{}' is not an XML schema", get_tag_name(root)),
            });
        }

        let target = root.attribute("targetNamespace").unwrap_or_default();
        if target != namespace {
            tracing::warn!(
                namespace = %namespace,
                target_namespace = %target,
                "Schema target namespace differs from descriptor namespace"
            );
        }

        let mut part = Self::new();
        SchemaReader::new(namespace, root).read(root, &mut part)?;
        tracing::debug!(
            namespace = %target,
            elements = part.elements.len(),
            complex_types = part.complex_types.len(),
            simple_types = part.simple_types.len(),
            "Schema added"
        );
        self.namespaces.insert(target.to_string());
        self.elements.extend(part.elements);
        self.complex_types.extend(part.complex_types);
        self.simple_types.extend(part.simple_types);
        self.groups.extend(part.groups);
        self.attributes.extend(part.attributes);
        self.attribute_groups.extend(part.attribute_groups);
        Ok(())
    }

    /// Check whether a namespace is governed by one of the schemas.
    #[must_use]
    pub fn governs(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Validate a parsed document.
    ///
    /// Elements in a governed namespace are checked against their
    /// declarations: content model, attributes and simple content. Elements
    /// of other namespaces are skipped, their children are still searched
    /// for governed elements.
    ///
    /// # Errors
    /// Returns `BindingError::Validation` for the first violation, naming the
    /// element and its position. Returns `BindingError::SchemaResolution`
    /// when a declaration refers to a component no schema declares.
    pub fn validate(&self, document: &Document<'_>) -> Result<()> {
        self.validate_lax(document.root_element(), Process::Lax)
    }

    /// Validate an element that is not governed by an enclosing declaration.
    fn validate_lax(&self, node: Node<'_, '_>, process: Process) -> Result<()> {
        if process == Process::Skip {
            return Ok(());
        }
        let name = Name::of(node);
        if let Some(decl) = self.elements.get(&name) {
            return self.validate_element(node, &decl.content);
        }
        if process == Process::Strict || self.governs(&name.namespace) {
            return Err(invalid(
                node,
                format!(
                    "is not declared by the schema for namespace '{}'",
                    name.namespace
                ),
            ));
        }
        for child in node.children().filter(Node::is_element) {
            self.validate_lax(child, Process::Lax)?;
        }
        Ok(())
    }

    fn validate_element(&self, node: Node<'_, '_>, content: &Content) -> Result<()> {
        match content {
            Content::Any => {
                for child in node.children().filter(Node::is_element) {
                    self.validate_lax(child, Process::Lax)?;
                }
                Ok(())
            }
            Content::Simple(simple) => self.validate_with(
                node,
                &Effective {
                    simple: Some(simple),
                    ..Effective::default()
                },
            ),
            Content::Complex(ty) => self.validate_complex(node, ty),
            Content::Named(name) => {
                if let Some(ty) = self.complex_types.get(name) {
                    self.validate_complex(node, ty)
                } else if let Some(simple) = self.simple_types.get(name) {
                    self.validate_with(
                        node,
                        &Effective {
                            simple: Some(simple),
                            ..Effective::default()
                        },
                    )
                } else {
                    Err(undeclared("type", name))
                }
            }
        }
    }

    fn validate_complex(&self, node: Node<'_, '_>, ty: &ComplexType) -> Result<()> {
        let mut effective = Effective::default();
        self.resolve_type(ty, &mut effective, 0)?;
        self.validate_with(node, &effective)
    }

    fn validate_with(&self, node: Node<'_, '_>, effective: &Effective<'_>) -> Result<()> {
        self.check_attributes(node, effective)?;
        let children: Vec<Node<'_, '_>> = node.children().filter(Node::is_element).collect();

        if let Some(simple) = effective.simple {
            if let Some(child) = children.first() {
                return Err(invalid(
                    node,
                    format!("must not contain element '{}'", child.tag_name().name()),
                ));
            }
            return self
                .check_simple(simple, &element_text(node), 0)
                .map_err(|reason| invalid(node, format!("has invalid content: {reason}")));
        }

        if !effective.mixed {
            let text = node
                .children()
                .filter(Node::is_text)
                .filter_map(|child| child.text())
                .map(str::trim)
                .find(|text| !text.is_empty());
            if let Some(text) = text {
                return Err(invalid(node, format!("must not contain text '{text}'")));
            }
        }

        self.check_content_model(node, &effective.particles, &children)?;

        let mut declarations = Declarations::default();
        for particle in &effective.particles {
            self.collect_declarations(particle, &mut declarations, 0)?;
        }
        for child in children {
            let name = Name::of(child);
            match declarations.elements.get(&name) {
                Some(content) => self.validate_element(child, content)?,
                None => {
                    let process = declarations
                        .wildcards
                        .iter()
                        .find(|wildcard| wildcard.allows(&name.namespace))
                        .map_or(Process::Strict, |wildcard| wildcard.process);
                    self.validate_lax(child, process)?;
                }
            }
        }
        Ok(())
    }

    fn check_content_model(
        &self,
        node: Node<'_, '_>,
        particles: &[&Particle],
        children: &[Node<'_, '_>],
    ) -> Result<()> {
        let names: Vec<Name> = children.iter().map(|child| Name::of(*child)).collect();
        let mut matcher = ContentMatcher::new(self, &names);
        let ends = matcher.sequence(particles.iter().copied(), 0, 0)?;
        if ends.contains(&names.len()) {
            return Ok(());
        }

        if let Some(child) = children.get(matcher.furthest()) {
            return Err(invalid(
                *child,
                format!("is not expected in element '{}'", node.tag_name().name()),
            ));
        }
        let mut required = Vec::new();
        for particle in particles {
            self.required_names(particle, &mut required, 0)?;
        }
        required.retain(|name| !names.contains(name));
        required.dedup();
        if required.is_empty() {
            return Err(invalid(node, "has incomplete content"));
        }
        let required: Vec<&str> = required.iter().map(|name| name.local.as_str()).collect();
        Err(invalid(
            node,
            format!("is missing required child element(s): {}", required.join(", ")),
        ))
    }

    fn check_attributes(&self, node: Node<'_, '_>, effective: &Effective<'_>) -> Result<()> {
        for attribute in node.attributes() {
            let namespace = attribute.namespace().unwrap_or_default();
            if namespace == XML_SCHEMA_INSTANCE_NS_URI {
                continue;
            }
            let declared = effective
                .attributes
                .iter()
                .find(|decl| decl.name.namespace == namespace && decl.name.local == attribute.name());
            match declared {
                Some(decl) if decl.prohibited => {
                    return Err(invalid(
                        node,
                        format!("must not have attribute '{}'", attribute.name()),
                    ));
                }
                Some(decl) => {
                    self.check_simple(self.attribute_type(decl), attribute.value(), 0)
                        .map_err(|reason| {
                            invalid(
                                node,
                                format!("has invalid attribute '{}': {reason}", attribute.name()),
                            )
                        })?;
                }
                None if effective.any_attribute || !namespace.is_empty() => {}
                None => {
                    return Err(invalid(
                        node,
                        format!("has undeclared attribute '{}'", attribute.name()),
                    ));
                }
            }
        }

        for decl in effective.attributes.iter().filter(|decl| decl.required) {
            let present = node.attributes().any(|attribute| {
                attribute.name() == decl.name.local
                    && attribute.namespace().unwrap_or_default() == decl.name.namespace
            });
            if !present {
                return Err(invalid(
                    node,
                    format!("is missing required attribute '{}'", decl.name.local),
                ));
            }
        }
        Ok(())
    }

    fn attribute_type<'s>(&'s self, decl: &'s AttributeUse) -> &'s SimpleType {
        decl.ty
            .as_ref()
            .or_else(|| self.attributes.get(&decl.name).and_then(|global| global.ty.as_ref()))
            .unwrap_or(&ANY_SIMPLE)
    }

    /// Check a value against a simple type. The error is the reason, without
    /// the element context.
    fn check_simple(
        &self,
        ty: &SimpleType,
        value: &str,
        depth: usize,
    ) -> std::result::Result<(), String> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err("type derivation is too deep".to_string());
        }
        match ty {
            SimpleType::BuiltIn(builtin) => {
                if builtin.accepts(value) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not a valid {}", value.trim(), builtin.label()))
                }
            }
            SimpleType::Named(name) => {
                if let Some(simple) = self.simple_types.get(name) {
                    self.check_simple(simple, value, depth + 1)
                } else if let Some(base) = self
                    .complex_types
                    .get(name)
                    .and_then(|ty| ty.simple_base.as_ref())
                {
                    self.check_simple(base, value, depth + 1)
                } else {
                    Err(format!("type '{name}' is not declared"))
                }
            }
            SimpleType::Restricted(restriction) => {
                self.check_simple(&restriction.base, value, depth + 1)?;
                let trimmed = value.trim();
                if !restriction.enumeration.is_empty()
                    && !restriction.enumeration.iter().any(|allowed| allowed == trimmed)
                {
                    return Err(format!(
                        "'{trimmed}' is not one of {}",
                        restriction.enumeration.join(", ")
                    ));
                }
                if let Some(pattern) = &restriction.pattern {
                    if !pattern.is_match(trimmed) {
                        return Err(format!("'{trimmed}' does not match the required pattern"));
                    }
                }
                let length = value.chars().count();
                if restriction.min_length.is_some_and(|min| length < min)
                    || restriction.max_length.is_some_and(|max| length > max)
                {
                    return Err(format!("'{value}' has an invalid length of {length}"));
                }
                Ok(())
            }
        }
    }

    /// Resolve the derivation chain of a complex type into `out`.
    fn resolve_type<'s>(
        &'s self,
        ty: &'s ComplexType,
        out: &mut Effective<'s>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(too_deep("type derivation"));
        }
        if let Some(derivation) = &ty.derivation {
            if let Some(base) = self.complex_types.get(&derivation.base) {
                let mut inherited = Effective::default();
                self.resolve_type(base, &mut inherited, depth + 1)?;
                out.attributes.extend(inherited.attributes);
                out.any_attribute |= inherited.any_attribute;
                if derivation.extension {
                    out.particles.extend(inherited.particles);
                    out.mixed |= inherited.mixed;
                }
            } else if !self.simple_types.contains_key(&derivation.base) {
                return Err(undeclared("type", &derivation.base));
            }
        }
        out.particles.extend(ty.particle.as_ref());
        out.attributes.extend(&ty.attributes);
        for group in &ty.attribute_groups {
            self.resolve_attribute_group(group, out, depth + 1)?;
        }
        out.any_attribute |= ty.any_attribute;
        out.mixed |= ty.mixed;
        if let Some(simple) = &ty.simple_base {
            out.simple = Some(simple);
        }
        Ok(())
    }

    fn resolve_attribute_group<'s>(
        &'s self,
        name: &Name,
        out: &mut Effective<'s>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(too_deep("attribute group"));
        }
        let group = self
            .attribute_groups
            .get(name)
            .ok_or_else(|| undeclared("attribute group", name))?;
        out.attributes.extend(&group.attributes);
        out.any_attribute |= group.any_attribute;
        for nested in &group.groups {
            self.resolve_attribute_group(nested, out, depth + 1)?;
        }
        Ok(())
    }

    fn collect_declarations<'s>(
        &'s self,
        particle: &'s Particle,
        out: &mut Declarations<'s>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(too_deep("model group"));
        }
        match &particle.term {
            Term::Element(decl) => {
                out.elements.entry(&decl.name).or_insert(&decl.content);
            }
            Term::Ref(name) => {
                let decl = self.global_element(name)?;
                out.elements.entry(&decl.name).or_insert(&decl.content);
            }
            Term::Group(name) => {
                self.collect_declarations(self.group(name)?, out, depth + 1)?;
            }
            Term::Sequence(particles) | Term::Choice(particles) | Term::All(particles) => {
                for particle in particles {
                    self.collect_declarations(particle, out, depth + 1)?;
                }
            }
            Term::Any(wildcard) => out.wildcards.push(wildcard),
        }
        Ok(())
    }

    /// Names of the elements a content model requires regardless of the
    /// choices taken.
    fn required_names(&self, particle: &Particle, out: &mut Vec<Name>, depth: usize) -> Result<()> {
        if particle.min == 0 {
            return Ok(());
        }
        if depth > MAX_REFERENCE_DEPTH {
            return Err(too_deep("model group"));
        }
        match &particle.term {
            Term::Element(decl) => out.push(decl.name.clone()),
            Term::Ref(name) => out.push(name.clone()),
            Term::Group(name) => self.required_names(self.group(name)?, out, depth + 1)?,
            Term::Sequence(particles) | Term::All(particles) => {
                for particle in particles {
                    self.required_names(particle, out, depth + 1)?;
                }
            }
            Term::Choice(particles) => {
                if let [only] = particles.as_slice() {
                    self.required_names(only, out, depth + 1)?;
                }
            }
            Term::Any(_) => {}
        }
        Ok(())
    }

    fn global_element(&self, name: &Name) -> Result<&ElementDecl> {
        self.elements
            .get(name)
            .ok_or_else(|| undeclared("element", name))
    }

    fn group(&self, name: &Name) -> Result<&Particle> {
        self.groups.get(name).ok_or_else(|| undeclared("group", name))
    }
}

fn is_xsd(node: Node<'_, '_>, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace() == Some(XML_SCHEMA_NS_URI)
}

fn invalid(node: Node<'_, '_>, problem: impl fmt::Display) -> BindingError {
    let position = source_position(node);
    BindingError::Validation(format!(
        "Element '{}' at {}:{} {problem}.",
        node.tag_name().name(),
        position.row,
        position.col
    ))
}

fn undeclared(kind: &str, name: &Name) -> BindingError {
    BindingError::SchemaResolution {
        namespace: name.namespace.clone(),
        reason: format!("{kind} '{}' is not declared", name.local),
    }
}

fn too_deep(kind: &str) -> BindingError {
    BindingError::Validation(format!(
        "The {kind} nesting is deeper than {MAX_REFERENCE_DEPTH} levels."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_XSD: &str = r###"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
            xmlns:o="urn:order" targetNamespace="urn:order"
            elementFormDefault="qualified">
        <xs:simpleType name="Status">
            <xs:restriction base="xs:string">
                <xs:enumeration value="open"/>
                <xs:enumeration value="closed"/>
            </xs:restriction>
        </xs:simpleType>
        <xs:complexType name="Party">
            <xs:sequence>
                <xs:element name="name" type="xs:string"/>
            </xs:sequence>
            <xs:attribute name="code" type="xs:string" use="required"/>
        </xs:complexType>
        <xs:complexType name="Customer">
            <xs:complexContent>
                <xs:extension base="o:Party">
                    <xs:sequence>
                        <xs:element name="vip" type="xs:boolean" minOccurs="0"/>
                    </xs:sequence>
                </xs:extension>
            </xs:complexContent>
        </xs:complexType>
        <xs:element name="order">
            <xs:complexType>
                <xs:sequence>
                    <xs:element name="header" type="xs:string"/>
                    <xs:element name="customer" type="o:Customer" minOccurs="0"/>
                    <xs:choice maxOccurs="unbounded">
                        <xs:element name="line" type="xs:int"/>
                        <xs:element name="note" type="xs:string"/>
                    </xs:choice>
                    <xs:any namespace="##other" processContents="lax" minOccurs="0"/>
                </xs:sequence>
                <xs:attribute name="id" type="xs:int" use="required"/>
                <xs:attribute name="status" type="o:Status"/>
            </xs:complexType>
        </xs:element>
    </xs:schema>"###;

    fn schema() -> CompositeSchema {
        let mut schema = CompositeSchema::new();
        schema.add_source("urn:order", ORDER_XSD).unwrap();
        schema
    }

    fn validate(xml: &str) -> Result<()> {
        let document = Document::parse(xml).unwrap();
        schema().validate(&document)
    }

    fn order(attributes: &str, content: &str) -> String {
        format!(r#"<o:order xmlns:o="urn:order" xmlns:x="urn:other" {attributes}>{content}</o:order>"#)
    }

    fn validation_message(result: Result<()>) -> String {
        match result {
            Err(BindingError::Validation(message)) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_document_with_wildcard() {
        let xml = order(
            r#"id="1" status="open""#,
            r#"<o:header/>
               <o:customer code="c1"><o:name>Joe</o:name><o:vip>true</o:vip></o:customer>
               <o:line>1</o:line><o:note>fragile</o:note><o:line>2</o:line>
               <x:free><x:anything/></x:free>"#,
        );
        validate(&xml).unwrap();
    }

    #[test]
    fn test_misplaced_element() {
        let message = validation_message(validate(&order(
            r#"id="1""#,
            "<o:line>1</o:line><o:header/>",
        )));
        assert!(message.starts_with("Element 'line' at 1:"), "{message}");
        assert!(message.contains("is not expected in element 'order'"), "{message}");
    }

    #[test]
    fn test_missing_required_child() {
        let message = validation_message(validate(&order(r#"id="1""#, "<o:header/>")));
        assert!(message.starts_with("Element 'order'"), "{message}");
        assert!(message.contains("has incomplete content"), "{message}");

        let message = validation_message(validate(&order(
            r#"id="1""#,
            r#"<o:header/><o:customer code="c"/><o:line>1</o:line>"#,
        )));
        assert!(message.starts_with("Element 'customer'"), "{message}");
        assert!(message.contains("missing required child element(s): name"), "{message}");
    }

    #[test]
    fn test_attribute_checks() {
        let message = validation_message(validate(&order(
            r#"id="abc""#,
            "<o:header/><o:line>1</o:line>",
        )));
        assert!(
            message.contains("has invalid attribute 'id': 'abc' is not a valid xs:int"),
            "{message}"
        );

        let message = validation_message(validate(&order("", "<o:header/><o:line>1</o:line>")));
        assert!(message.contains("missing required attribute 'id'"), "{message}");

        let message = validation_message(validate(&order(
            r#"id="1" colour="red""#,
            "<o:header/><o:line>1</o:line>",
        )));
        assert!(message.contains("undeclared attribute 'colour'"), "{message}");
    }

    #[test]
    fn test_enumeration_restriction() {
        let message = validation_message(validate(&order(
            r#"id="1" status="lost""#,
            "<o:header/><o:line>1</o:line>",
        )));
        assert!(message.contains("'lost' is not one of open, closed"), "{message}");
    }

    #[test]
    fn test_simple_content_checks() {
        let message = validation_message(validate(&order(
            r#"id="1""#,
            "<o:header/><o:line>one</o:line>",
        )));
        assert!(message.starts_with("Element 'line'"), "{message}");
        assert!(message.contains("'one' is not a valid xs:int"), "{message}");

        let message = validation_message(validate(&order(
            r#"id="1""#,
            "<o:header/>stray<o:line>1</o:line>",
        )));
        assert!(message.contains("must not contain text 'stray'"), "{message}");
    }

    #[test]
    fn test_extension_inherits_base_content() {
        let message = validation_message(validate(&order(
            r#"id="1""#,
            r#"<o:header/><o:customer><o:name>Joe</o:name></o:customer><o:line>1</o:line>"#,
        )));
        assert!(message.contains("missing required attribute 'code'"), "{message}");

        let message = validation_message(validate(&order(
            r#"id="1""#,
            r#"<o:header/><o:customer code="c"><o:vip>true</o:vip><o:name>Joe</o:name></o:customer><o:line>1</o:line>"#,
        )));
        assert!(message.starts_with("Element 'vip'"), "{message}");
    }

    #[test]
    fn test_undeclared_root_in_governed_namespace() {
        let message =
            validation_message(validate(r#"<o:invoice xmlns:o="urn:order"/>"#));
        assert!(
            message.contains("is not declared by the schema for namespace 'urn:order'"),
            "{message}"
        );
        validate(r#"<x:wrapper xmlns:x="urn:other"><x:free/></x:wrapper>"#).unwrap();
    }

    #[test]
    fn test_builtin_lexical_spaces() {
        assert!(BuiltIn::Date.accepts("2026-10-18"));
        assert!(BuiltIn::Date.accepts("2026-10-18Z"));
        assert!(!BuiltIn::Date.accepts("18.10.2026"));
        assert!(BuiltIn::DateTime.accepts("2026-10-18T10:15:00+02:00"));
        assert!(BuiltIn::NonNegativeInteger.accepts("-0"));
        assert!(!BuiltIn::PositiveInteger.accepts("0"));
        assert!(BuiltIn::Decimal.accepts(".5"));
        assert!(!BuiltIn::Boolean.accepts("yes"));
    }

    #[test]
    fn test_add_source_rejects_non_schema() {
        let mut schema = CompositeSchema::new();
        let err = schema.add_source("urn:order", "<order/>").unwrap_err();
        assert!(matches!(err, BindingError::SchemaResolution { .. }));
        assert!(schema.is_empty());
        assert!(!schema.governs("urn:order"));
    }

    #[test]
    fn test_unsupported_pattern_is_ignored() {
        let mut schema = CompositeSchema::new();
        schema
            .add_source(
                "urn:code",
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:code">
                    <xs:element name="code">
                        <xs:simpleType>
                            <xs:restriction base="xs:string">
                                <xs:pattern value="[\i-[:]][\c-[:]]*"/>
                            </xs:restriction>
                        </xs:simpleType>
                    </xs:element>
                </xs:schema>"#,
            )
            .unwrap();
        let document = Document::parse(r#"<c:code xmlns:c="urn:code">a</c:code>"#).unwrap();
        schema.validate(&document).unwrap();
    }
}
