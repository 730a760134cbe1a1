//! Tile layers, object groups and image layers of a map.

use serde::{Deserialize, Serialize};

use crate::attributes::{coerce_number, describe, normalize, schema, Number};
use crate::data::{check_length, read_data_tag};
use crate::resource_manager::{clean_path, normalize as normalize_path, to_slash};
use crate::{ConvertOptions, Diagnostics, Error, PropertyContainer, ResourceManager, Result};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Attributes every layer kind has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerHeader {
    pub id: u32,
    pub name: String,
    pub opacity: f64,
    pub visible: bool,
    pub x: Number,
    pub y: Number,
    #[serde(default, skip_serializing_if = "Number::is_zero")]
    pub offsetx: Number,
    #[serde(default, skip_serializing_if = "Number::is_zero")]
    pub offsety: Number,
    #[serde(default, skip_serializing_if = "PropertyContainer::is_empty")]
    pub properties: PropertyContainer,
}

impl LayerHeader {
    fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let attributes = normalize(tmx, schema::LAYER, diagnostics)?;
        Ok(Self{
            id: attributes.uint("id"),
            name: attributes.string("name"),
            opacity: attributes.float("opacity"),
            visible: attributes.flag("visible"),
            x: attributes.number("x"),
            y: attributes.number("y"),
            offsetx: attributes.number("offsetx"),
            offsety: attributes.number("offsety"),
            properties: PropertyContainer::from_xml(tmx, diagnostics)?,
        })
    }
}

/// This enum contains the different types of layers that can be found in a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Layer {
    /// A layer containing a grid of tiles
    #[serde(rename = "tilelayer")]
    Tile(TileLayer),

    /// A layer containing objects.
    /// Objects are not aligned to the tile grid.
    ///
    /// Object layers are also called object groups.
    #[serde(rename = "objectgroup")]
    Object(ObjectLayer),

    /// A layer showing a single image.
    #[serde(rename = "imagelayer")]
    Image(ImageLayer),
}

impl Layer {
    /// Build the layer described by `node`.
    /// Returns `None` for nodes that are not layers, and for group layers,
    /// which are reported as a diagnostic and skipped.
    pub fn try_from_xml(
        node: &roxmltree::Node,
        resources: &ResourceManager,
        options: &ConvertOptions,
        diagnostics: &mut Diagnostics,
    ) -> Option<Result<Self>> {
        match node.tag_name().name() {
            "layer" => Some(TileLayer::from_xml(node, options, diagnostics).map(Layer::Tile)),
            "objectgroup" => Some(ObjectLayer::from_xml(node, diagnostics).map(Layer::Object)),
            "imagelayer" => Some(ImageLayer::from_xml(node, resources, options, diagnostics).map(Layer::Image)),
            "group" => {
                diagnostics.warn(describe(node), "group layers are not converted, skipping it and its children");
                None
            }
            _ => None,
        }
    }

    pub fn header(&self) -> &LayerHeader {
        match self {
            Layer::Tile(l) => &l.header,
            Layer::Object(l) => &l.header,
            Layer::Image(l) => &l.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    #[serde(flatten)]
    pub header: LayerHeader,
    pub width: u32,
    pub height: u32,
    /// Row major gids, 0 is an empty cell.
    pub data: Vec<u32>,
}

impl TileLayer {
    pub fn from_xml(tmx: &roxmltree::Node, options: &ConvertOptions, diagnostics: &mut Diagnostics) -> Result<Self> {
        let header = LayerHeader::from_xml(tmx, diagnostics)?;
        let size = normalize(tmx, schema::TILE_LAYER, diagnostics)?;
        let (width, height) = (size.uint("width"), size.uint("height"));

        let data_node = tmx.children().find(|n| n.tag_name().name() == "data").ok_or_else(|| Error::StructureError{
            tag: describe(tmx),
            msg: "Tile layer has no data tag".into(),
        })?;
        let data = read_data_tag(&header.name, &data_node, diagnostics)?;
        check_length(&header.name, &data, width, height, options.length_check(), diagnostics)?;

        log::debug!("Decoded layer '{}': {}x{}, {} gids", header.name, width, height, data.len());
        Ok(Self{ header, width, height, data })
    }
}

/// An ObjectLayer is a container of Objects.
/// Objects are not aligned to the tile grid,
/// and can be used to include extra information in a map.
///
/// Check the [Tiled Documentation](https://doc.mapeditor.org/en/stable/manual/objects/)
/// for more information on objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLayer {
    #[serde(flatten)]
    pub header: LayerHeader,
    pub draworder: String,
    pub objects: Vec<Object>,
}

impl ObjectLayer {
    pub fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let header = LayerHeader::from_xml(tmx, diagnostics)?;

        let objects = tmx.children()
            .filter(|t| t.tag_name().name() == "object")
            .map(|t| Object::from_xml(&t, diagnostics))
            .collect::<Result<_>>()?
        ;

        Ok(Self{
            header,
            draworder: tmx.attribute("draworder").unwrap_or("topdown").to_string(),
            objects,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: Number,
    pub y: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap: bool,
}

/// An element of an [ObjectLayer].
///
/// Plain rectangles carry none of the shape fields, other shapes set exactly one of
/// `ellipse`, `point`, `polygon`, `polyline` or `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub x: Number,
    pub y: Number,
    pub width: Number,
    pub height: Number,
    pub rotation: Number,
    /// Set for tile objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ellipse: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub point: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
    #[serde(default)]
    pub properties: PropertyContainer,
}

trait AsPointListExt { fn as_point_list(&self) -> Result<Vec<Point>>; }

impl AsPointListExt for &str {
    fn as_point_list(&self) -> Result<Vec<Point>> {
        let mut points = vec![];
        for point in self.split_ascii_whitespace() {
            let mut coords = point.split(',');
            if let (Some(x), Some(y), None) = (coords.next(), coords.next(), coords.next()) {
                points.push(Point{ x: coerce_number(x)?, y: coerce_number(y)? });
            } else {
                return Err(Error::ParseError(format!("{} is not a valid point", point).into()));
            }
        }
        Ok(points)
    }
}

impl Object {
    fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let attributes = normalize(tmx, schema::OBJECT, diagnostics)?;

        // Tiled 1.9 renamed "type" to "class"
        let type_ = attributes.text("type").or_else(|| attributes.text("class")).unwrap_or_default();

        let mut object = Object{
            id: attributes.uint("id"),
            name: attributes.string("name"),
            type_: type_.to_string(),
            x: attributes.number("x"),
            y: attributes.number("y"),
            width: attributes.number("width"),
            height: attributes.number("height"),
            rotation: attributes.number("rotation"),
            gid: attributes.opt_uint("gid"),
            visible: attributes.flag("visible"),
            ellipse: false,
            point: false,
            polygon: None,
            polyline: None,
            text: None,
            properties: PropertyContainer::from_xml(tmx, diagnostics)?,
        };
        object.read_shape(tmx)?;
        Ok(object)
    }

    fn read_shape(&mut self, tmx: &roxmltree::Node) -> Result<()> {
        use Error::StructureError;
        for child in tmx.children() {
            match child.tag_name().name() {
                "ellipse" => self.ellipse = true,
                "point" => self.point = true,
                poly @ ("polygon" | "polyline") => {
                    let points = child
                        .attribute("points")
                        .ok_or(StructureError{
                            tag: child.tag_name().name().into(),
                            msg: "Missing attribute points".into()
                        })?
                        .as_point_list()?
                    ;
                    match poly {
                        "polygon" => self.polygon = Some(points),
                        _ => self.polyline = Some(points),
                    }
                }
                "text" => {
                    self.text = Some(Text{
                        text: child.text().unwrap_or_default().into(),
                        wrap: child.attribute("wrap") == Some("1"),
                    });
                }
                _ => continue,
            }
            return Ok(());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    #[serde(flatten)]
    pub header: LayerHeader,
    /// Image path relative to the map file.
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparentcolor: Option<String>,
}

impl ImageLayer {
    pub fn from_xml(
        tmx: &roxmltree::Node,
        resources: &ResourceManager,
        options: &ConvertOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let header = LayerHeader::from_xml(tmx, diagnostics)?;

        let image_node = match tmx.children().find(|n| n.tag_name().name() == "image") {
            Some(node) => node,
            None => {
                diagnostics.warn(describe(tmx), "image layer without an image");
                return Ok(Self{ header, image: String::new(), transparentcolor: None });
            }
        };
        let image = normalize(&image_node, schema::IMAGE, diagnostics)?;
        let path = to_slash(&normalize_path(&clean_path(image.text("source").unwrap_or_default())));

        if options.verify_images && !resources.exists(&path) {
            return Err(Error::Resolution{ path: resources.resolve(&path) });
        }

        Ok(Self{
            header,
            image: path,
            transparentcolor: image.text("trans").map(|trans| format!("#{}", trans.trim_start_matches('#'))),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::MemoryProvider;

    fn build(xml: &str, provider: MemoryProvider, options: &ConvertOptions) -> (Option<Result<Layer>>, Diagnostics) {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let resources = ResourceManager::new(provider);
        let mut diagnostics = Diagnostics::new();
        let layer = Layer::try_from_xml(&doc.root_element(), &resources, options, &mut diagnostics);
        (layer, diagnostics)
    }

    fn build_ok(xml: &str) -> Result<Layer> {
        build(xml, MemoryProvider::new(), &ConvertOptions::default()).0.unwrap()
    }

    #[test]
    fn test_tile_layer_defaults() -> Result<()> {
        let layer = build_ok(r#"<layer id="3" name="Ground" width="2" height="2"><data encoding="csv">1,2,3,4</data></layer>"#)?;
        let tiles = match layer {
            Layer::Tile(tiles) => tiles,
            _ => panic!("expected a tile layer"),
        };
        assert_eq!(tiles.header.id, 3);
        assert_eq!(tiles.header.opacity, 1.);
        assert!(tiles.header.visible);
        assert_eq!(tiles.data, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn test_tile_layer_json() -> Result<()> {
        let layer = build_ok(r#"<layer id="1" name="Ground" width="2" height="1" visible="0"><data encoding="csv">0,5</data></layer>"#)?;
        assert_eq!(
            serde_json::to_string(&layer)?,
            r#"{"type":"tilelayer","id":1,"name":"Ground","opacity":1.0,"visible":false,"x":0,"y":0,"width":2,"height":1,"data":[0,5]}"#
        );
        Ok(())
    }

    #[test]
    fn test_strict_length_mismatch() {
        let options = ConvertOptions{ strict: true, ..ConvertOptions::default() };
        let (layer, _) = build(
            r#"<layer name="Ground" width="2" height="2"><data encoding="csv">1,2,3</data></layer>"#,
            MemoryProvider::new(),
            &options,
        );
        assert!(matches!(layer, Some(Err(Error::LengthMismatch{ .. }))));
    }

    #[test]
    fn test_missing_data_tag() {
        assert!(matches!(
            build_ok(r#"<layer name="Ground" width="2" height="2"/>"#),
            Err(Error::StructureError{ .. })
        ));
    }

    #[test]
    fn test_object_group() -> Result<()> {
        let layer = build_ok(r#"
            <objectgroup id="2" name="Entities" offsetx="4">
              <object id="1" name="door" type="Door" x="16" y="32.5" width="16" height="16">
                <properties><property name="locked" type="bool" value="true"/></properties>
              </object>
              <object id="2" class="Spawn" x="1" y="2"><point/></object>
              <object id="3" x="0" y="0"><polygon points="0,0 16,0 16,8.5"/></object>
              <object id="4" gid="7" x="0" y="32" width="32" height="32"/>
            </objectgroup>
        "#)?;
        let group = match layer {
            Layer::Object(group) => group,
            _ => panic!("expected an object group"),
        };
        assert_eq!(group.header.offsetx, Number::Int(4));
        assert_eq!(group.objects.len(), 4);

        let door = &group.objects[0];
        assert_eq!(door.type_, "Door");
        assert_eq!(door.y, Number::Float(32.5));
        assert_eq!(door.rotation, Number::Int(0));
        assert!(door.properties.get("locked").is_some());

        assert_eq!(group.objects[1].type_, "Spawn");
        assert!(group.objects[1].point);
        assert_eq!(group.objects[2].polygon.as_ref().map(Vec::len), Some(3));
        assert_eq!(group.objects[3].gid, Some(7));
        Ok(())
    }

    #[test]
    fn test_object_json_keys() -> Result<()> {
        let layer = build_ok(r#"<objectgroup name="Entities"><object id="9" x="4.0" y="8"/></objectgroup>"#)?;
        let json = serde_json::to_string(&layer)?;
        assert!(json.contains(
            r#""objects":[{"id":9,"name":"","type":"","x":4,"y":8,"width":0,"height":0,"rotation":0,"visible":true,"properties":[]}]"#
        ));
        Ok(())
    }

    #[test]
    fn test_bad_point_list() {
        assert!(build_ok(r#"<objectgroup><object id="1"><polyline points="0,0 1"/></object></objectgroup>"#).is_err());
    }

    #[test]
    fn test_group_is_skipped_with_warning() {
        let (layer, diagnostics) = build(r#"<group name="Decor"/>"#, MemoryProvider::new(), &ConvertOptions::default());
        assert!(layer.is_none());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_image_layer() -> Result<()> {
        let mut provider = MemoryProvider::new();
        provider.insert("img/sky.png", vec![0u8]);
        let (layer, _) = build(
            r#"<imagelayer id="5" name="Sky"><image source="img\sky.png" width="64" height="64"/></imagelayer>"#,
            provider,
            &ConvertOptions::default(),
        );
        match layer.unwrap()? {
            Layer::Image(image) => assert_eq!(image.image, "img/sky.png"),
            _ => panic!("expected an image layer"),
        }
        Ok(())
    }

    #[test]
    fn test_image_layer_missing_image() {
        let (layer, _) = build(
            r#"<imagelayer name="Sky"><image source="sky.png"/></imagelayer>"#,
            MemoryProvider::new(),
            &ConvertOptions::default(),
        );
        assert!(matches!(layer, Some(Err(Error::Resolution{ .. }))));
    }
}
