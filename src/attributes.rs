//! Typed access to xml attributes.
//!
//! Every node kind we read has a fixed [schema](schema): a list of [Field]s
//! naming the attribute, the primitive type it holds and what to use when it
//! is missing. [normalize] turns the raw attribute strings of a node into a
//! [Record] following that schema.
//!
//! Parsing is lenient for optional fields: a value that does not parse is
//! replaced by the field's default (or the zero value of its type) and a
//! warning is added to the [Diagnostics]. Only required fields abort.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Diagnostics, Error, Result};

/// Primitive type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Non-negative integer that fits into 32 bits.
    UInt,
    Float,
    /// Integer or float, integral values are kept as integers.
    Number,
    /// `"1"` is true, anything else is false.
    Bool,
    Text,
}

/// What a field resolves to when the attribute is missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    /// Missing attribute is a [StructureError](Error::StructureError).
    Required,
    /// Field is left out of the record.
    Absent,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: Kind,
    pub fallback: Fallback,
}

impl Field {
    pub const fn required(name: &'static str, kind: Kind) -> Self {
        Self { name, kind, fallback: Fallback::Required }
    }

    pub const fn optional(name: &'static str, kind: Kind) -> Self {
        Self { name, kind, fallback: Fallback::Absent }
    }

    pub const fn int(name: &'static str, default: i64) -> Self {
        Self { name, kind: Kind::UInt, fallback: Fallback::Int(default) }
    }

    pub const fn number(name: &'static str) -> Self {
        Self { name, kind: Kind::Number, fallback: Fallback::Int(0) }
    }

    pub const fn float(name: &'static str, default: f64) -> Self {
        Self { name, kind: Kind::Float, fallback: Fallback::Float(default) }
    }

    pub const fn flag(name: &'static str, default: bool) -> Self {
        Self { name, kind: Kind::Bool, fallback: Fallback::Bool(default) }
    }

    pub const fn text(name: &'static str, default: &'static str) -> Self {
        Self { name, kind: Kind::Text, fallback: Fallback::Text(default) }
    }
}

/// A json number that stays an integer when the source value is integral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        match integral(f) {
            Some(i) => Number::Int(i),
            None => Number::Float(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Number(Number),
    Bool(bool),
    Text(String),
}

impl Kind {
    fn zero(self) -> Value {
        match self {
            Kind::UInt => Value::Int(0),
            Kind::Float => Value::Float(0.),
            Kind::Number => Value::Number(Number::Int(0)),
            Kind::Bool => Value::Bool(false),
            Kind::Text => Value::Text(String::new()),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Kind::UInt => "unsigned integer",
            Kind::Float => "float",
            Kind::Number => "number",
            Kind::Bool => "boolean",
            Kind::Text => "string",
        }
    }

    fn coerce(self, raw: &str) -> Result<Value> {
        Ok(match self {
            Kind::UInt => Value::Int(coerce_uint(raw)? as i64),
            Kind::Float => Value::Float(coerce_float(raw)?),
            Kind::Number => Value::Number(coerce_number(raw)?),
            Kind::Bool => Value::Bool(coerce_bool(raw)),
            Kind::Text => Value::Text(raw.to_string()),
        })
    }
}

impl Fallback {
    fn value(self, kind: Kind) -> Option<Value> {
        let value = match (self, kind) {
            (Fallback::Required | Fallback::Absent, _) => return None,
            (Fallback::Int(i), Kind::UInt) => Value::Int(i),
            (Fallback::Int(i), Kind::Number) => Value::Number(Number::Int(i)),
            (Fallback::Int(i), Kind::Float) => Value::Float(i as f64),
            (Fallback::Float(f), Kind::Float) => Value::Float(f),
            (Fallback::Float(f), Kind::Number) => Value::Number(f.into()),
            (Fallback::Bool(b), Kind::Bool) => Value::Bool(b),
            (Fallback::Text(t), Kind::Text) => Value::Text(t.to_string()),
            (_, kind) => kind.zero(),
        };
        Some(value)
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0. && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse an integer, accepting integral float notation such as `"4.0"`.
pub fn coerce_int(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(i) => Ok(i),
        Err(e) => raw
            .parse::<f64>()
            .ok()
            .and_then(integral)
            .ok_or_else(|| Error::from(e)),
    }
}

pub fn coerce_uint(raw: &str) -> Result<u32> {
    let value = coerce_int(raw)?;
    u32::try_from(value)
        .map_err(|_| Error::ParseError(format!("{} is out of range for an unsigned value", value).into()))
}

pub fn coerce_float(raw: &str) -> Result<f64> {
    Ok(raw.trim().parse()?)
}

pub fn coerce_number(raw: &str) -> Result<Number> {
    Ok(coerce_float(raw)?.into())
}

/// Attribute booleans are written as `0`/`1`.
pub fn coerce_bool(raw: &str) -> bool {
    raw.trim() == "1"
}

/// Short human readable description of a node for diagnostics.
pub fn describe(node: &roxmltree::Node) -> String {
    match node.attribute("name") {
        Some(name) => format!("{} '{}'", node.tag_name().name(), name),
        None => node.tag_name().name().to_string(),
    }
}

/// Typed attributes of one xml node.
#[derive(Debug, Default, Clone)]
pub struct Record {
    values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn uint(&self, name: &str) -> u32 {
        self.opt_uint(name).unwrap_or(0)
    }

    pub fn opt_uint(&self, name: &str) -> Option<u32> {
        match self.values.get(name) {
            Some(Value::Int(i)) => u32::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(Value::Float(f)) => *f,
            _ => 0.,
        }
    }

    pub fn number(&self, name: &str) -> Number {
        match self.values.get(name) {
            Some(Value::Number(n)) => *n,
            _ => Number::default(),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(Value::Bool(true)))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(Value::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }
}

/// Read the attributes named by `schema` from `node`.
pub fn normalize(node: &roxmltree::Node, schema: &[Field], diagnostics: &mut Diagnostics) -> Result<Record> {
    let mut record = Record::default();

    for field in schema {
        let value = match node.attribute(field.name) {
            None => {
                if field.fallback == Fallback::Required {
                    return Err(Error::StructureError{
                        tag: node.tag_name().name().to_string(),
                        msg: format!("Required attribute '{}' missing", field.name),
                    });
                }
                field.fallback.value(field.kind)
            }
            Some(raw) => match field.kind.coerce(raw) {
                Ok(value) => Some(value),
                Err(e) if field.fallback == Fallback::Required => return Err(e),
                Err(e) => {
                    // optional fields without a default stay unset so callers can derive them
                    let fallback = field.fallback.value(field.kind);
                    let outcome = match &fallback {
                        Some(value) => format!("using {:?}", value),
                        None => "leaving it unset".to_string(),
                    };
                    diagnostics.warn(
                        describe(node),
                        format!(
                            "attribute '{}'=\"{}\" is not a valid {} ({}), {}",
                            field.name, raw, field.kind.name(), e, outcome
                        ),
                    );
                    fallback
                }
            },
        };

        if let Some(value) = value {
            record.values.insert(field.name, value);
        }
    }

    Ok(record)
}

/// Attribute schemas of the tmx/tsx node kinds we read.
pub mod schema {
    use super::{Field, Kind};

    pub const MAP: &[Field] = &[
        Field::text("tiledversion", "1.0"),
        Field::optional("orientation", Kind::Text),
        Field::optional("renderorder", Kind::Text),
        Field::required("width", Kind::UInt),
        Field::required("height", Kind::UInt),
        Field::required("tilewidth", Kind::UInt),
        Field::required("tileheight", Kind::UInt),
        Field::flag("infinite", false),
        Field::optional("nextlayerid", Kind::UInt),
        Field::optional("nextobjectid", Kind::UInt),
    ];

    /// The `<tileset>` node inside of a map, inline or not.
    pub const TILESET_REF: &[Field] = &[
        Field::required("firstgid", Kind::UInt),
        Field::optional("source", Kind::Text),
    ];

    /// Geometry of a tileset, read from the inline node or the tsx root.
    pub const TILESET: &[Field] = &[
        Field::text("name", ""),
        Field::required("tilewidth", Kind::UInt),
        Field::required("tileheight", Kind::UInt),
        Field::int("spacing", 0),
        Field::int("margin", 0),
        Field::optional("tilecount", Kind::UInt),
        Field::optional("columns", Kind::UInt),
    ];

    pub const IMAGE: &[Field] = &[
        Field::required("source", Kind::Text),
        Field::int("width", 0),
        Field::int("height", 0),
        Field::optional("trans", Kind::Text),
    ];

    pub const TILE: &[Field] = &[
        Field::required("id", Kind::UInt),
    ];

    pub const FRAME: &[Field] = &[
        Field::required("tileid", Kind::UInt),
        Field::required("duration", Kind::UInt),
    ];

    /// Attributes shared by all layer kinds.
    pub const LAYER: &[Field] = &[
        Field::int("id", 0),
        Field::text("name", ""),
        Field::float("opacity", 1.),
        Field::flag("visible", true),
        Field::number("x"),
        Field::number("y"),
        Field::number("offsetx"),
        Field::number("offsety"),
    ];

    pub const TILE_LAYER: &[Field] = &[
        Field::required("width", Kind::UInt),
        Field::required("height", Kind::UInt),
    ];

    pub const DATA: &[Field] = &[
        Field::optional("encoding", Kind::Text),
        Field::optional("compression", Kind::Text),
    ];

    pub const OBJECT: &[Field] = &[
        Field::int("id", 0),
        Field::text("name", ""),
        Field::optional("type", Kind::Text),
        Field::optional("class", Kind::Text),
        Field::number("x"),
        Field::number("y"),
        Field::number("width"),
        Field::number("height"),
        Field::number("rotation"),
        Field::flag("visible", true),
        Field::optional("gid", Kind::UInt),
    ];
}

#[cfg(test)]
mod test {
    use super::*;

    fn normalize_str(xml: &str, schema: &[Field]) -> (Result<Record>, Diagnostics) {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let mut diagnostics = Diagnostics::new();
        let record = normalize(&doc.root_element(), schema, &mut diagnostics);
        (record, diagnostics)
    }

    #[test]
    fn test_integral_floats_become_ints() -> Result<()> {
        assert_eq!(coerce_int("4.0")?, 4);
        assert_eq!(coerce_number("4.0")?, Number::Int(4));
        assert_eq!(coerce_number("4.5")?, Number::Float(4.5));
        assert!(coerce_int("4.5").is_err());
        Ok(())
    }

    #[test]
    fn test_bool_convention() {
        assert!(coerce_bool("1"));
        assert!(!coerce_bool("0"));
        assert!(!coerce_bool("true"));
    }

    #[test]
    fn test_layer_defaults() -> Result<()> {
        let (record, diagnostics) = normalize_str(r#"<layer name="Ground"/>"#, schema::LAYER);
        let record = record?;
        assert_eq!(record.float("opacity"), 1.);
        assert!(record.flag("visible"));
        assert_eq!(record.uint("id"), 0);
        assert_eq!(record.number("offsetx"), Number::Int(0));
        assert!(diagnostics.is_empty());
        Ok(())
    }

    #[test]
    fn test_visible_zero_hides_layer() -> Result<()> {
        let (record, _) = normalize_str(r#"<layer visible="0"/>"#, schema::LAYER);
        assert!(!record?.flag("visible"));
        Ok(())
    }

    #[test]
    fn test_bad_optional_value_falls_back() -> Result<()> {
        let (record, diagnostics) = normalize_str(r#"<layer id="seven" opacity="half"/>"#, schema::LAYER);
        let record = record?;
        assert_eq!(record.uint("id"), 0);
        assert_eq!(record.float("opacity"), 1.);
        assert_eq!(diagnostics.warnings().count(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_required_is_error() {
        let (record, _) = normalize_str(r#"<map width="10" height="10" tilewidth="32"/>"#, schema::MAP);
        assert!(matches!(record, Err(Error::StructureError{ .. })));
    }

    #[test]
    fn test_bad_required_is_error() {
        let (record, _) = normalize_str(
            r#"<map width="ten" height="10" tilewidth="32" tileheight="32"/>"#,
            schema::MAP,
        );
        assert!(matches!(record, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_bad_value_without_default_stays_unset() -> Result<()> {
        let (record, diagnostics) = normalize_str(
            r#"<tileset tilewidth="16" tileheight="16" tilecount="lots" columns="4"/>"#,
            schema::TILESET,
        );
        let record = record?;
        assert_eq!(record.opt_uint("tilecount"), None);
        assert_eq!(record.opt_uint("columns"), Some(4));
        assert_eq!(diagnostics.warnings().count(), 1);
        Ok(())
    }

    #[test]
    fn test_negative_unsigned_falls_back() -> Result<()> {
        let (record, diagnostics) = normalize_str(r#"<tileset name="t" tilewidth="32" tileheight="32" spacing="-2"/>"#, schema::TILESET);
        assert_eq!(record?.uint("spacing"), 0);
        assert_eq!(diagnostics.len(), 1);
        Ok(())
    }
}
