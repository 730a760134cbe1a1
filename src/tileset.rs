//! Tilesets, inline or loaded from an external tsx file, and the gid ranges they own.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::attributes::{describe, normalize, schema, Record};
use crate::math::uvec2;
use crate::resource_manager::{clean_path, normalize as normalize_path, to_slash};
use crate::{ConvertOptions, Diagnostics, Error, PropertyContainer, ResourceManager, Result};

pub const GID_HORIZONTAL_FLIP_FLAG: u32 = 0x80000000;
pub const GID_VERTICAL_FLIP_FLAG: u32   = 0x40000000;
pub const GID_DIAGONAL_FLIP_FLAG: u32   = 0x20000000;

pub const GID_FLIP_MASK: u32 = GID_HORIZONTAL_FLIP_FLAG | GID_VERTICAL_FLIP_FLAG | GID_DIAGONAL_FLIP_FLAG;

/// Strip the flip flags from a gid.
pub const fn gid_to_id(gid: u32) -> u32 {
    gid & !GID_FLIP_MASK
}

/// One frame of a tile animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Local id of the tile shown in this frame.
    pub tileid: u32,
    /// Frame duration in milliseconds.
    pub duration: u32,
}

/// Extra data attached to a single tile of a tileset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMeta {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animation: Vec<Frame>,
    #[serde(default, skip_serializing_if = "PropertyContainer::is_empty")]
    pub properties: PropertyContainer,
}

impl TileMeta {
    fn from_xml(tmx: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Self> {
        let id = normalize(tmx, schema::TILE, diagnostics)?.uint("id");

        let animation = match tmx.children().find(|c| c.tag_name().name() == "animation") {
            None => Vec::new(),
            Some(animation) => animation
                .children()
                .filter(|c| c.tag_name().name() == "frame")
                .map(|frame| {
                    let frame = normalize(&frame, schema::FRAME, diagnostics)?;
                    Ok(Frame{ tileid: frame.uint("tileid"), duration: frame.uint("duration") })
                })
                .collect::<Result<_>>()?,
        };

        Ok(Self{
            id,
            animation,
            properties: PropertyContainer::from_xml(tmx, diagnostics)?,
        })
    }
}

/// Corrected atlas heights for tilesets whose tsx understates the real image size.
///
/// Keys are matched as substrings against the tileset name and the image path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightOverrides {
    table: BTreeMap<String, u32>,
}

impl HeightOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pattern: impl Into<String>, height: u32) -> &mut Self {
        self.table.insert(pattern.into(), height);
        self
    }

    /// First override (in key order) whose pattern occurs in `name` or `image`.
    pub fn lookup(&self, name: &str, image: &str) -> Option<(&str, u32)> {
        self.table
            .iter()
            .find(|(pattern, _)| name.contains(pattern.as_str()) || image.contains(pattern.as_str()))
            .map(|(pattern, height)| (pattern.as_str(), *height))
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Number of whole tiles that fit along one axis of an atlas.
pub fn tiles_along(image_extent: u32, tile_extent: u32, margin: u32, spacing: u32) -> u32 {
    if tile_extent == 0 {
        return 0;
    }
    // wide enough for any u32 attribute, the quotient never exceeds image_extent
    let usable = u64::from(image_extent).saturating_sub(2 * u64::from(margin)) + u64::from(spacing);
    (usable / (u64::from(tile_extent) + u64::from(spacing))) as u32
}

fn overflow(context: &str, what: String) -> Error {
    Error::StructureError{ tag: context.to_string(), msg: format!("{} does not fit into 32 bits", what) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tileset {
    pub firstgid: u32,
    pub name: String,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub spacing: u32,
    pub margin: u32,
    /// Atlas image, relative to the map file.
    pub image: String,
    pub imagewidth: u32,
    pub imageheight: u32,
    pub tilecount: u32,
    pub columns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparentcolor: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tiles: BTreeMap<u32, TileMeta>,
    /// Path of the tsx file this tileset was embedded from.
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Tileset {
    /// Load a tileset from a `<tileset>` node of a map.
    ///
    /// The `firstgid` always comes from this node. If it references an external
    /// tsx file, everything else is read from that file.
    pub fn from_xml(
        node: &roxmltree::Node,
        resources: &mut ResourceManager,
        options: &ConvertOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let reference = normalize(node, schema::TILESET_REF, diagnostics)?;
        let firstgid = reference.uint("firstgid");
        if firstgid == 0 {
            return Err(Error::StructureError{
                tag: node.tag_name().name().into(),
                msg: "firstgid must be at least 1".into(),
            });
        }
        let source = reference.text("source").map(str::to_string);

        // Need those two for lifetime reasons related to data_node
        let extern_text;
        let extern_document;

        let (data_node, image_dir) = match &source {
            Some(source) => {
                extern_text = resources.load_text(source)?;
                extern_document = roxmltree::Document::parse(&extern_text)?;
                let root = extern_document.root_element();
                if root.tag_name().name() != "tileset" {
                    return Err(Error::StructureError{
                        tag: root.tag_name().name().into(),
                        msg: format!("Expected tag 'tileset' at root level of '{}'", source),
                    });
                }
                let dir = clean_path(source).parent().map(Path::to_path_buf).unwrap_or_default();
                (root, dir)
            }
            None => (*node, PathBuf::new()),
        };

        let geometry = normalize(&data_node, schema::TILESET, diagnostics)?;
        let name = match geometry.text("name") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => node.attribute("name").unwrap_or_default().to_string(),
        };
        let context = format!("tileset '{}'", name);

        let image = match data_node.children().find(|n| n.tag_name().name() == "image") {
            Some(image) => Some(normalize(&image, schema::IMAGE, diagnostics)?),
            None => {
                diagnostics.warn(&context, "no atlas image, the tileset is an image collection");
                None
            }
        };

        let mut tileset = Self{
            firstgid,
            name,
            tilewidth: geometry.uint("tilewidth"),
            tileheight: geometry.uint("tileheight"),
            spacing: geometry.uint("spacing"),
            margin: geometry.uint("margin"),
            image: String::new(),
            imagewidth: 0,
            imageheight: 0,
            tilecount: 0,
            columns: 0,
            transparentcolor: None,
            tiles: BTreeMap::new(),
            source,
        };

        if let Some(image) = &image {
            tileset.attach_image(image, &image_dir, resources, options)?;
        }

        if let Some(source) = &tileset.source {
            diagnostics.info(&context, format!("embedded from {}", source));
        }

        tileset.columns = match geometry.opt_uint("columns") {
            Some(columns) => columns,
            None => tileset.derived_columns(),
        };
        tileset.tilecount = match geometry.opt_uint("tilecount") {
            Some(tilecount) => tilecount,
            None => tileset.derived_tilecount().ok_or_else(|| overflow(&context, "derived tile count".into()))?,
        };

        tileset.apply_height_override(options, &context, diagnostics)?;

        if tileset.firstgid.checked_add(tileset.tilecount).is_none() {
            return Err(overflow(&context, format!("gid range {} + {}", tileset.firstgid, tileset.tilecount)));
        }

        for tile in data_node.children().filter(|c| c.tag_name().name() == "tile") {
            let meta = TileMeta::from_xml(&tile, diagnostics)?;
            if meta.id >= tileset.tilecount && tileset.tilecount > 0 {
                diagnostics.warn(describe(&tile), format!("tile id {} is outside of {}", meta.id, context));
            }
            tileset.tiles.insert(meta.id, meta);
        }

        log::debug!(
            "Loaded {} (firstgid {}, {} tiles, {}x{} image)",
            context, tileset.firstgid, tileset.tilecount, tileset.imagewidth, tileset.imageheight
        );
        Ok(tileset)
    }

    fn attach_image(
        &mut self,
        image: &Record,
        image_dir: &Path,
        resources: &ResourceManager,
        options: &ConvertOptions,
    ) -> Result<()> {
        // images of external tilesets are relative to the tsx file, rebase them onto the map
        let relative = normalize_path(&image_dir.join(clean_path(image.text("source").unwrap_or_default())));
        let relative_str = to_slash(&relative);

        if options.verify_images && !resources.exists(&relative_str) {
            return Err(Error::Resolution{ path: resources.resolve(&relative_str) });
        }

        self.image = if options.image_basename {
            relative.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or(relative_str)
        } else {
            relative_str
        };
        self.imagewidth = image.uint("width");
        self.imageheight = image.uint("height");
        self.transparentcolor = image.text("trans").map(|trans| format!("#{}", trans.trim_start_matches('#')));
        Ok(())
    }

    fn apply_height_override(&mut self, options: &ConvertOptions, context: &str, diagnostics: &mut Diagnostics) -> Result<()> {
        let (pattern, height) = match options.height_overrides.lookup(&self.name, &self.image) {
            Some(found) => found,
            None => return Ok(()),
        };
        if self.image.is_empty() || height == self.imageheight {
            return Ok(());
        }

        let rows = tiles_along(height, self.tileheight, self.margin, self.spacing);
        let tilecount = self.columns.checked_mul(rows)
            .ok_or_else(|| overflow(context, format!("tile count {} x {}", self.columns, rows)))?;
        diagnostics.warn(
            context,
            format!(
                "image height {} overridden to {} (matches '{}'), tile count {} -> {}",
                self.imageheight, height, pattern, self.tilecount, tilecount
            ),
        );
        self.imageheight = height;
        self.tilecount = tilecount;
        Ok(())
    }

    pub fn derived_columns(&self) -> u32 {
        tiles_along(self.imagewidth, self.tilewidth, self.margin, self.spacing)
    }

    pub fn derived_rows(&self) -> u32 {
        tiles_along(self.imageheight, self.tileheight, self.margin, self.spacing)
    }

    /// Tile count implied by the image geometry, `None` if it overflows.
    pub fn derived_tilecount(&self) -> Option<u32> {
        let grid = uvec2::new(self.derived_columns(), self.derived_rows());
        u32::try_from(grid.area()).ok()
    }

    /// First gid after the range owned by this tileset.
    pub fn end_gid(&self) -> u32 {
        self.firstgid.saturating_add(self.tilecount)
    }

    pub fn contains(&self, gid: u32) -> bool {
        let id = gid_to_id(gid);
        id >= self.firstgid && id < self.end_gid()
    }
}

/// Find the tileset owning `gid`: the one with the largest `firstgid <= gid`.
/// Returns `None` for the empty gid 0 and for gids past the end of that tileset.
///
/// `tilesets` must be ordered by increasing `firstgid`.
pub fn tileset_for_gid(tilesets: &[Tileset], gid: u32) -> Option<(usize, &Tileset)> {
    let id = gid_to_id(gid);
    if id == 0 {
        return None;
    }
    let (index, tileset) = tilesets.iter().enumerate().rfind(|(_, t)| t.firstgid <= id)?;
    if id - tileset.firstgid >= tileset.tilecount {
        return None;
    }
    Some((index, tileset))
}
