//! Value converters between text and typed property values.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::NaiveDate;

use super::{Value, ValueType};
use crate::config::{DATE_FORMAT_PARAM, DEFAULT_DATE_FORMAT};
use crate::error::{BindingError, Result};

/// Converter configuration parameters, e.g. `format` for dates.
pub type ConverterConfig = BTreeMap<String, String>;

/// Converts values from one value type to another.
pub trait TypeConverter: fmt::Debug + Send + Sync {
    /// Convert a value.
    ///
    /// # Errors
    /// Returns `BindingError::Conversion` when the value cannot be converted.
    fn convert(&self, value: &Value) -> Result<Value>;

    /// Configuration this converter was created with, if it is configurable.
    fn configuration(&self) -> Option<&ConverterConfig> {
        None
    }
}

type ConverterFactory =
    Arc<dyn Fn(Option<&ConverterConfig>) -> Arc<dyn TypeConverter> + Send + Sync>;

/// Converter factories keyed by (source, target) value type.
#[derive(Clone)]
pub struct ConverterRegistry {
    factories: HashMap<(ValueType, ValueType), ConverterFactory>,
}

impl ConverterRegistry {
    /// Create a registry without any converters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a converter factory for a (source, target) pair, replacing
    /// any existing one.
    pub fn register<F>(&mut self, from: ValueType, to: ValueType, factory: F)
    where
        F: Fn(Option<&ConverterConfig>) -> Arc<dyn TypeConverter> + Send + Sync + 'static,
    {
        self.factories.insert((from, to), Arc::new(factory));
    }

    /// Create a converter for a (source, target) pair.
    #[must_use]
    pub fn lookup(
        &self,
        from: ValueType,
        to: ValueType,
        config: Option<&ConverterConfig>,
    ) -> Option<Arc<dyn TypeConverter>> {
        self.factories.get(&(from, to)).map(|factory| factory(config))
    }

    #[must_use]
    pub fn has_converter(&self, from: ValueType, to: ValueType) -> bool {
        self.factories.contains_key(&(from, to))
    }
}

impl Default for ConverterRegistry {
    /// Registry holding the built-in text converters.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ValueType::Text, ValueType::Text, |_| {
            Arc::new(TextConverter) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Text, ValueType::Integer, |_| {
            Arc::new(TextToInteger) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Integer, ValueType::Text, |_| {
            Arc::new(ToText(ValueType::Integer)) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Text, ValueType::Boolean, |_| {
            Arc::new(TextToBoolean) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Boolean, ValueType::Text, |_| {
            Arc::new(ToText(ValueType::Boolean)) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Text, ValueType::Date, |config| {
            Arc::new(DateConverter::decoder(config)) as Arc<dyn TypeConverter>
        });
        registry.register(ValueType::Date, ValueType::Text, |config| {
            Arc::new(DateConverter::encoder(config)) as Arc<dyn TypeConverter>
        });
        registry
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<String> = self
            .factories
            .keys()
            .map(|(from, to)| format!("{from}->{to}"))
            .collect();
        pairs.sort();
        f.debug_struct("ConverterRegistry")
            .field("converters", &pairs)
            .finish()
    }
}

fn conversion_error(value: &Value, from: ValueType, to: ValueType, reason: &str) -> BindingError {
    let rendered = match value {
        Value::Text(text) => text.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Date(d) => d.to_string(),
        Value::Bean(bean) => format!("{bean:?}"),
    };
    BindingError::Conversion {
        value: rendered,
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

fn expect_text(value: &Value, to: ValueType) -> Result<&str> {
    value
        .as_text()
        .ok_or_else(|| conversion_error(value, value.value_type(), to, "expected a text value"))
}

#[derive(Debug)]
struct TextConverter;

impl TypeConverter for TextConverter {
    fn convert(&self, value: &Value) -> Result<Value> {
        expect_text(value, ValueType::Text).map(Value::from)
    }
}

#[derive(Debug)]
struct TextToInteger;

impl TypeConverter for TextToInteger {
    fn convert(&self, value: &Value) -> Result<Value> {
        let text = expect_text(value, ValueType::Integer)?;
        text.trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| conversion_error(value, ValueType::Text, ValueType::Integer, &e.to_string()))
    }
}

#[derive(Debug)]
struct TextToBoolean;

impl TypeConverter for TextToBoolean {
    fn convert(&self, value: &Value) -> Result<Value> {
        let text = expect_text(value, ValueType::Boolean)?;
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Boolean(true)),
            "false" | "no" | "0" => Ok(Value::Boolean(false)),
            _ => Err(conversion_error(
                value,
                ValueType::Text,
                ValueType::Boolean,
                "not a boolean",
            )),
        }
    }
}

/// Writes integers and booleans as text.
#[derive(Debug)]
struct ToText(ValueType);

impl TypeConverter for ToText {
    fn convert(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Integer(i) if self.0 == ValueType::Integer => Ok(Value::Text(i.to_string())),
            Value::Boolean(b) if self.0 == ValueType::Boolean => Ok(Value::Text(b.to_string())),
            other => Err(conversion_error(
                other,
                other.value_type(),
                ValueType::Text,
                &format!("expected a {} value", self.0),
            )),
        }
    }
}

/// Converts between text and dates using a `strftime` style format.
#[derive(Debug)]
pub struct DateConverter {
    format: String,
    configuration: Option<ConverterConfig>,
    decode: bool,
}

impl DateConverter {
    /// Text to date.
    #[must_use]
    pub fn decoder(config: Option<&ConverterConfig>) -> Self {
        Self::with_config(config, true)
    }

    /// Date to text.
    #[must_use]
    pub fn encoder(config: Option<&ConverterConfig>) -> Self {
        Self::with_config(config, false)
    }

    fn with_config(config: Option<&ConverterConfig>, decode: bool) -> Self {
        let format = config
            .and_then(|c| c.get(DATE_FORMAT_PARAM))
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        Self {
            format,
            configuration: config.cloned(),
            decode,
        }
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }
}

impl TypeConverter for DateConverter {
    fn convert(&self, value: &Value) -> Result<Value> {
        if self.decode {
            let text = expect_text(value, ValueType::Date)?;
            return NaiveDate::parse_from_str(text.trim(), &self.format)
                .map(Value::Date)
                .map_err(|e| {
                    conversion_error(value, ValueType::Text, ValueType::Date, &e.to_string())
                });
        }

        let Value::Date(date) = value else {
            return Err(conversion_error(
                value,
                value.value_type(),
                ValueType::Text,
                "expected a date value",
            ));
        };
        let mut out = String::new();
        write!(out, "{}", date.format(&self.format)).map_err(|_| {
            conversion_error(
                value,
                ValueType::Date,
                ValueType::Text,
                &format!("invalid date format '{}'", self.format),
            )
        })?;
        Ok(Value::Text(out))
    }

    fn configuration(&self) -> Option<&ConverterConfig> {
        self.configuration.as_ref()
    }
}
