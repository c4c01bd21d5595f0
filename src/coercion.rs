//! Type coercion
//!
//! Converts matched text into typed [`Value`]s. The converter for an item is
//! chosen once, as a [`Coercer`], in this order:
//!
//! 1. the item's parser hook (a function, or a method named on the target
//!    type and then on the owning schema)
//! 2. a nested schema, which folds back into the parser
//! 3. the constructor of a [`CustomType`]
//! 4. a built-in converter keyed by [`ScalarType`]
//!
//! Numeric and date/time failures surface as [`CoercionError`]; boolean
//! conversion never fails.

use crate::error::{CoercionError, Error, Result};
use crate::items::{ItemSpec, OnSave, ParserHook};
use crate::schema::Schema;
use crate::types::{CustomType, ItemType, ParseFn, ScalarType, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Tokens read as `true`; compared case-insensitively
static TRUE_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| ["true", "1"].into_iter().collect());

/// Date formats tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Time-of-day formats tried in order
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Date-time formats carrying an offset, tried after RFC 3339 and RFC 2822
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%a %b %d %H:%M:%S %z %Y",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Date-time formats without an offset; read as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Converter selected for one item
#[derive(Clone)]
pub enum Coercer {
    /// Built-in scalar conversion
    Builtin(ScalarType),
    /// Inner markup of the matched node
    XmlContent,
    /// Nested mapped type; handled by the parser
    Schema(Arc<Schema>),
    /// A parser function, from a hook or a custom type constructor
    Function(ParseFn),
}

impl std::fmt::Debug for Coercer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coercer::Builtin(scalar) => f.debug_tuple("Builtin").field(scalar).finish(),
            Coercer::XmlContent => f.write_str("XmlContent"),
            Coercer::Schema(schema) => f
                .debug_tuple("Schema")
                .field(&schema.display_name())
                .finish(),
            Coercer::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl Coercer {
    /// Select the converter for `item`, declared on `owner`.
    ///
    /// `nested` is the already-resolved schema when the item type is a
    /// schema reference.
    pub fn for_item(item: &ItemSpec, owner: &Schema, nested: Option<Arc<Schema>>) -> Result<Self> {
        if let Some(hook) = &item.options().parser {
            return match hook {
                ParserHook::Function(f) => Ok(Coercer::Function(Arc::clone(f))),
                ParserHook::Method(method) => {
                    resolve_method(method, item.item_type(), nested.as_deref(), owner)
                        .map(Coercer::Function)
                }
            };
        }

        if let Some(schema) = nested {
            return Ok(Coercer::Schema(schema));
        }

        Ok(match item.item_type() {
            ItemType::Scalar(scalar) => Coercer::Builtin(*scalar),
            ItemType::XmlContent => Coercer::XmlContent,
            ItemType::Custom(custom) => match custom.constructor() {
                Some(constructor) => Coercer::Function(Arc::clone(constructor)),
                None => {
                    tracing::debug!(
                        r#type = custom.name(),
                        "custom type has no constructor; text passed through"
                    );
                    Coercer::Builtin(ScalarType::String)
                }
            },
            ItemType::Schema(_) => {
                return Err(Error::UnknownType(format!(
                    "schema reference for item '{}' was not resolved",
                    item.name()
                )))
            }
        })
    }

    /// Convert matched text.
    ///
    /// `Ok(None)` is nil: empty text for any type other than `String`.
    pub fn coerce(&self, text: &str, item_name: &str) -> Result<Option<Value>> {
        match self {
            Coercer::Builtin(scalar) => coerce_scalar(text, *scalar)
                .map_err(|e| e.with_item(item_name).into()),
            Coercer::XmlContent => Ok(Some(Value::String(text.to_string()))),
            Coercer::Function(f) => f(text).map(Some),
            Coercer::Schema(schema) => Err(Error::UnknownType(format!(
                "nested type {} cannot be built from text",
                schema.display_name()
            ))),
        }
    }
}

fn resolve_method(
    method: &str,
    item_type: &ItemType,
    nested: Option<&Schema>,
    owner: &Schema,
) -> Result<ParseFn> {
    let on_target = match (item_type, nested) {
        (ItemType::Custom(custom), _) => custom.parser(method).cloned(),
        (_, Some(schema)) => schema.parser(method).cloned(),
        _ => None,
    };
    on_target
        .or_else(|| owner.parser(method).cloned())
        .ok_or_else(|| Error::UnknownMethod {
            method: method.to_string(),
            type_name: format!("{} or {}", item_type.name(), owner.display_name()),
        })
}

/// Convert text with a built-in converter
pub fn coerce_scalar(
    text: &str,
    scalar: ScalarType,
) -> std::result::Result<Option<Value>, CoercionError> {
    if scalar == ScalarType::String {
        return Ok(Some(Value::String(text.to_string())));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let fail = |reason: String| CoercionError::new(trimmed, scalar.name()).with_reason(reason);

    let value = match scalar {
        ScalarType::String => Value::String(text.to_string()),
        ScalarType::Integer => {
            Value::Integer(trimmed.parse::<i64>().map_err(|e| fail(e.to_string()))?)
        }
        ScalarType::Float => Value::Float(trimmed.parse::<f64>().map_err(|e| fail(e.to_string()))?),
        ScalarType::Decimal => Value::Decimal(
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map_err(|e| fail(e.to_string()))?,
        ),
        ScalarType::Boolean => {
            Value::Boolean(TRUE_TOKENS.contains(trimmed.to_ascii_lowercase().as_str()))
        }
        ScalarType::Date => Value::Date(
            parse_date(trimmed).ok_or_else(|| fail("unrecognised date format".into()))?,
        ),
        ScalarType::Time => Value::Time(
            parse_time(trimmed).ok_or_else(|| fail("unrecognised time format".into()))?,
        ),
        ScalarType::DateTime => Value::DateTime(
            parse_datetime(trimmed).ok_or_else(|| fail("unrecognised date-time format".into()))?,
        ),
        ScalarType::Timestamp => Value::DateTime(
            parse_datetime(trimmed)
                .or_else(|| parse_epoch_seconds(trimmed))
                .ok_or_else(|| fail("neither a date-time nor seconds since the epoch".into()))?,
        ),
    };
    Ok(Some(value))
}

/// Parse a calendar date; date-times yield their date part
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_datetime(text).map(|dt| dt.date_naive()))
}

/// Parse a time of day; date-times yield their time part
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
        .or_else(|| parse_datetime(text).map(|dt| dt.time()))
}

/// Parse a date and time; values without an offset are read as UTC and a
/// bare date is midnight UTC.
pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }
    if let Some(dt) = OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
    {
        return Some(dt);
    }
    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().fixed_offset())
}

fn parse_epoch_seconds(text: &str) -> Option<DateTime<FixedOffset>> {
    let seconds = text.parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|dt| dt.fixed_offset())
}

/// Apply an item's on-save hook.
///
/// A hook naming a method the owning schema does not define leaves the
/// value unchanged. Nil values are passed through untouched.
pub fn apply_on_save(item: &ItemSpec, value: Option<&Value>, owner: &Schema) -> Option<Value> {
    let value = value?;
    let Some(hook) = &item.options().on_save else {
        return Some(value.clone());
    };
    match hook {
        OnSave::Function(f) => Some(f(value)),
        OnSave::Method(method) => match owner.save_hook(method) {
            Some(f) => Some(f(value)),
            None => {
                tracing::warn!(
                    method = %method,
                    schema = owner.display_name(),
                    item = item.name(),
                    "on-save method not defined; value written unchanged"
                );
                Some(value.clone())
            }
        },
    }
}

/// Convert harvested attribute text for the `attributes` sub-map of an element
pub fn coerce_attribute_value(
    text: &str,
    item_type: &ItemType,
    name: &str,
) -> Result<Option<Value>> {
    match item_type {
        ItemType::Scalar(scalar) => {
            coerce_scalar(text, *scalar).map_err(|e| e.with_item(name).into())
        }
        ItemType::Custom(custom) => custom_constructor(custom, text),
        _ => Ok(Some(Value::String(text.to_string()))),
    }
}

fn custom_constructor(custom: &CustomType, text: &str) -> Result<Option<Value>> {
    match custom.constructor() {
        Some(constructor) => constructor(text).map(Some),
        None => Ok(Some(Value::String(text.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ElementSpec;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_integer_and_float() {
        assert_eq!(
            coerce_scalar(" 51 ", ScalarType::Integer).unwrap(),
            Some(Value::Integer(51))
        );
        assert_eq!(
            coerce_scalar("32.5", ScalarType::Float).unwrap(),
            Some(Value::Float(32.5))
        );
        let err = coerce_scalar("fifty", ScalarType::Integer).unwrap_err();
        assert_eq!(err.text, "fifty");
        assert_eq!(err.target, "Integer");
    }

    #[test]
    fn test_empty_text_is_nil_except_for_strings() {
        assert_eq!(coerce_scalar("", ScalarType::Integer).unwrap(), None);
        assert_eq!(coerce_scalar("  ", ScalarType::Date).unwrap(), None);
        assert_eq!(
            coerce_scalar("", ScalarType::String).unwrap(),
            Some(Value::String(String::new()))
        );
    }

    #[test]
    fn test_boolean_never_fails() {
        let b = |s| coerce_scalar(s, ScalarType::Boolean).unwrap();
        assert_eq!(b("true"), Some(Value::Boolean(true)));
        assert_eq!(b("TRUE"), Some(Value::Boolean(true)));
        assert_eq!(b("1"), Some(Value::Boolean(true)));
        assert_eq!(b("false"), Some(Value::Boolean(false)));
        assert_eq!(b("yes"), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_decimal() {
        let value = coerce_scalar("1.10", ScalarType::Decimal).unwrap().unwrap();
        assert_eq!(value, Value::Decimal(Decimal::new(110, 2)));
    }

    #[test]
    fn test_dates_and_times() {
        let date = parse_date("2008-01-31").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2008, 1, 31));
        assert_eq!(parse_date("2008-01-31T12:00:00Z"), Some(date));

        let time = parse_time("14:30").unwrap();
        assert_eq!((time.hour(), time.minute()), (14, 30));

        let dt = parse_datetime("Thu Mar 06 21:09:50 +0000 2008").unwrap();
        assert_eq!(dt.year(), 2008);
        let naive = parse_datetime("2008-01-31T10:00:00").unwrap();
        assert_eq!(naive.offset().local_minus_utc(), 0);

        assert!(coerce_scalar("not a date", ScalarType::Date).is_err());
    }

    #[test]
    fn test_timestamp_falls_back_to_epoch_seconds() {
        let value = coerce_scalar("1204837790", ScalarType::Timestamp).unwrap().unwrap();
        match value {
            Value::DateTime(dt) => assert_eq!(dt.year(), 2008),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parser_hook_function_wins() {
        let schema = Schema::new("Thing");
        let item = ElementSpec::new("value", ScalarType::Integer)
            .with_parser(|text| Ok(Value::from(text.to_uppercase())));
        let coercer = Coercer::for_item(&item, &schema, None).unwrap();
        assert_eq!(coercer.coerce("abc", "value").unwrap(), Some(Value::from("ABC")));
    }

    #[test]
    fn test_parser_hook_method_lookup_order() {
        let custom = CustomType::new("Coerce")
            .with_parser("shout", |text| Ok(Value::from(format!("{}!", text))));
        let mut owner = Schema::new("Owner");
        owner.define_parser("shout", |text| Ok(Value::from(text.to_string())));
        owner.define_parser("whisper", |text| Ok(Value::from(text.to_lowercase())));

        let on_target = ElementSpec::new("a", custom.clone()).with_parser_method("shout");
        let coercer = Coercer::for_item(&on_target, &owner, None).unwrap();
        assert_eq!(coercer.coerce("hi", "a").unwrap(), Some(Value::from("hi!")));

        let on_owner = ElementSpec::new("b", custom.clone()).with_parser_method("whisper");
        let coercer = Coercer::for_item(&on_owner, &owner, None).unwrap();
        assert_eq!(coercer.coerce("HI", "b").unwrap(), Some(Value::from("hi")));

        let missing = ElementSpec::new("c", custom).with_parser_method("missing");
        let err = Coercer::for_item(&missing, &owner, None).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { .. }));
    }

    #[test]
    fn test_on_save() {
        let mut owner = Schema::new("Owner");
        owner.define_save_hook("double", |v| Value::from(v.as_i64().unwrap_or(0) * 2));

        let by_fn = ElementSpec::new("a", ScalarType::String)
            .with_on_save(|v| Value::from(format!("<{}>", v)));
        assert_eq!(
            apply_on_save(&by_fn, Some(&Value::from("x")), &owner),
            Some(Value::from("<x>"))
        );

        let by_method = ElementSpec::new("b", ScalarType::Integer).with_on_save_method("double");
        assert_eq!(
            apply_on_save(&by_method, Some(&Value::from(21)), &owner),
            Some(Value::from(42))
        );

        let unknown = ElementSpec::new("c", ScalarType::Integer).with_on_save_method("nope");
        assert_eq!(
            apply_on_save(&unknown, Some(&Value::from(1)), &owner),
            Some(Value::from(1))
        );
        assert_eq!(apply_on_save(&by_fn, None, &owner), None);
    }
}
