//! This module provides functionality for custom
//! [properties](https://doc.mapeditor.org/en/stable/reference/tmx-map-format/#properties)

use serde::{Deserialize, Serialize};

use crate::attributes::{coerce_float, coerce_int};
use crate::{Diagnostics, Error, Result};

/// The declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Color,
    File,
    Object,
}

impl std::str::FromStr for PropertyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use PropertyType::*;
        match s {
            "string" => Ok(String),
            "int" => Ok(Int),
            "float" => Ok(Float),
            "bool" => Ok(Bool),
            "color" => Ok(Color),
            "file" => Ok(File),
            "object" => Ok(Object),
            _ => Err(Error::ParseError(format!("Unknown property type '{}'", s).into()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Coerce the raw text of a property into its declared type.
    /// Values that do not parse fall back to zero and are reported as `Err` next to that fallback.
    fn coerce(type_: PropertyType, raw: &str) -> std::result::Result<Self, (Self, Error)> {
        use PropertyValue::*;
        match type_ {
            PropertyType::Int | PropertyType::Object => coerce_int(raw).map(Int).map_err(|e| (Int(0), e)),
            PropertyType::Float => coerce_float(raw).map(Float).map_err(|e| (Float(0.), e)),
            PropertyType::Bool => Ok(Bool(coerce_property_bool(raw))),
            PropertyType::String | PropertyType::Color | PropertyType::File => Ok(String(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Tiled writes bool properties as `true`/`false`, older files use `1`/`0`.
fn coerce_property_bool(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw == "1"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: PropertyType,
    pub value: PropertyValue,
}

impl Property {
    fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let name = tmx.attribute("name").ok_or_else(|| Error::StructureError{
            tag: tmx.tag_name().name().into(),
            msg: "Property is missing a name!".into(),
        })?;
        let context = format!("property '{}'", name);

        let type_ = match tmx.attribute("type").unwrap_or("string") {
            "class" => {
                diagnostics.warn(&context, "class properties are not converted, keeping an empty string");
                return Ok(Property{ name: name.into(), type_: PropertyType::String, value: PropertyValue::String(String::new()) });
            }
            other => other.parse().unwrap_or_else(|_| {
                diagnostics.warn(&context, format!("unknown property type '{}', keeping the value as string", other));
                PropertyType::String
            }),
        };

        // multi-line strings are stored as node text instead of the value attribute
        let raw = tmx.attribute("value").or_else(|| tmx.text()).unwrap_or_default();

        let value = match PropertyValue::coerce(type_, raw) {
            Ok(value) => value,
            Err((fallback, e)) => {
                diagnostics.warn(&context, format!("value \"{}\" is not a valid {:?} ({}), using {:?}", raw, type_, e, fallback));
                fallback
            }
        };

        Ok(Property{ name: name.into(), type_, value })
    }
}

/// Ordered list of the custom properties of a map, tile, layer or object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyContainer {
    properties: Vec<Property>
}

impl PropertyContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the properties from an tmx xml node.
    /// This function takes any node in the tmx file that supports properties
    /// and looks for a child node "properties".
    pub(crate) fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let mut container = PropertyContainer::new();

        let properties = match tmx.children().find(|c| c.tag_name().name() == "properties") {
            Some(properties) => properties,
            None => return Ok(container),
        };

        for property in properties.children().filter(|c| c.tag_name().name() == "property") {
            container.properties.push(Property::from_xml(&property, diagnostics)?);
        }

        Ok(container)
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }
}
