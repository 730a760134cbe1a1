use std::path::Path;

use roxmltree::Document;
use serde::{Deserialize, Serialize};

use crate::attributes::{normalize, schema};
use crate::resource_manager::write_atomic;
use crate::{ConvertOptions, Diagnostics, Error, Layer, PropertyContainer, ResourceManager, Result, Tileset};

/// Version of the json map format that is written.
pub const FORMAT_VERSION: f64 = 1.0;

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl std::str::FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use Orientation::*;
        match s {
            "orthogonal" => Ok(Orthogonal),
            "isometric" => Ok(Isometric),
            "staggered" => Ok(Staggered),
            "hexagonal" => Ok(Hexagonal),
            _ => Err(Error::ParseError(format!("Invalid orientation '{}'", s).into()))
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Renderorder {
    #[default]
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

impl std::str::FromStr for Renderorder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        use Renderorder::*;
        match s {
            "right-down" => Ok(RightDown),
            "right-up" => Ok(RightUp),
            "left-down" => Ok(LeftDown),
            "left-up" => Ok(LeftUp),
            _ => Err(Error::ParseError(format!("Invalid render order '{}'", s).into()))
        }
    }
}

/// The `type` key of the document.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    #[default]
    Map,
}

/// The Map struct is the top level container of the json document.
/// A Map consists of [Tilesets](Tileset) and [Layers](Layer).
/// Stacking the layers in order creates the final map image.
/// Each tile layer contains gids referencing a specific tile in a tileset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    #[serde(rename = "type")]
    pub type_: DocumentType,
    pub version: f64,
    pub tiledversion: String,
    pub orientation: Orientation,
    pub renderorder: Renderorder,
    pub width: u32,
    pub height: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub infinite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextlayerid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextobjectid: Option<u32>,

    /// Custom properties contained in this map.
    #[serde(default, skip_serializing_if = "PropertyContainer::is_empty")]
    pub properties: PropertyContainer,

    /// The Layers that make up this map, in paint order.
    pub layers: Vec<Layer>,

    /// Ordered by strictly increasing `firstgid`.
    pub tilesets: Vec<Tileset>,
}

/// A converted map together with everything noteworthy found on the way.
#[derive(Debug)]
pub struct Conversion {
    pub map: Map,
    pub diagnostics: Diagnostics,
}

impl Map {
    pub fn from_file(path: &Path, options: &ConvertOptions) -> Result<Conversion> {
        Self::from_file_with_loader(path, &mut ResourceManager::default(), options)
    }

    /// Load a tmx file, resolving external files relative to its directory.
    pub fn from_file_with_loader(path: &Path, resource_manager: &mut ResourceManager, options: &ConvertOptions) -> Result<Conversion> {
        let file_xml = std::fs::read_to_string(path)?;

        resource_manager.set_base_path(path.parent().map(Path::to_path_buf).unwrap_or_default());
        Self::from_xml_str(&file_xml, resource_manager, options)
    }

    /// Parse a map from xml data
    pub fn from_xml_str(tmx: &str, resource_manager: &mut ResourceManager, options: &ConvertOptions) -> Result<Conversion> {
        let document = Document::parse(tmx)?;
        let mut diagnostics = Diagnostics::new();

        let map_node = document.root_element();

        if map_node.tag_name().name() != "map" {
            return Err(Error::StructureError{
                tag: map_node.tag_name().name().to_string(),
                msg: format!("Expected tag 'map' at root level, got '{}'.", map_node.tag_name().name())
            });
        }

        let attributes = normalize(&map_node, schema::MAP, &mut diagnostics)?;

        let orientation = match attributes.text("orientation") {
            None => Orientation::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                diagnostics.warn("map", format!("{}, using orthogonal", e));
                Orientation::default()
            }),
        };
        let renderorder = match attributes.text("renderorder") {
            None => Renderorder::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                diagnostics.warn("map", format!("{}, using right-down", e));
                Renderorder::default()
            }),
        };

        let tilesets = map_node.children()
            .filter(|n| n.tag_name().name() == "tileset")
            .map(|n| Tileset::from_xml(&n, resource_manager, options, &mut diagnostics))
            .collect::<Result<Vec<_>>>()?
        ;
        check_tileset_order(&tilesets)?;

        let mut layers = Vec::new();
        for node in map_node.children() {
            if let Some(layer) = Layer::try_from_xml(&node, resource_manager, options, &mut diagnostics) {
                layers.push(layer?);
            }
        }

        let map = Map{
            type_: DocumentType::Map,
            version: FORMAT_VERSION,
            tiledversion: attributes.string("tiledversion"),
            orientation,
            renderorder,
            width: attributes.uint("width"),
            height: attributes.uint("height"),
            tilewidth: attributes.uint("tilewidth"),
            tileheight: attributes.uint("tileheight"),
            infinite: attributes.flag("infinite"),
            nextlayerid: attributes.opt_uint("nextlayerid"),
            nextobjectid: attributes.opt_uint("nextobjectid"),
            properties: PropertyContainer::from_xml(&map_node, &mut diagnostics)?,
            layers,
            tilesets,
        };
        Ok(Conversion{ map, diagnostics })
    }

    /// Read a map previously written by [Map::write_json].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compact json text of the map. Equal maps give identical text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the map to `path`, replacing any previous file atomically.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_json()?.as_bytes())?;
        log::info!("Saved {}", path.display());
        Ok(())
    }
}

/// Range based gid lookup needs the tilesets sorted by firstgid.
/// A list that is not already sorted is rejected instead of reordered.
pub fn check_tileset_order(tilesets: &[Tileset]) -> Result<()> {
    for pair in tilesets.windows(2) {
        if pair[1].firstgid <= pair[0].firstgid {
            return Err(Error::TilesetOrder{
                name: pair[1].name.clone(),
                firstgid: pair[1].firstgid,
                previous: pair[0].firstgid,
            });
        }
    }
    Ok(())
}

/// Convert the tmx file at `tmx` and write the json document to `output`.
pub fn convert_file(tmx: &Path, output: &Path, options: &ConvertOptions) -> Result<Diagnostics> {
    log::info!("Converting {}", tmx.display());
    let Conversion{ map, diagnostics } = Map::from_file(tmx, options)?;
    log::info!(
        "{} layers, {} tilesets, {} diagnostics",
        map.layers.len(), map.tilesets.len(), diagnostics.len()
    );
    map.write_json(output)?;
    Ok(diagnostics)
}
