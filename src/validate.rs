//! Checks of tmx files that do not convert anything.
//!
//! Each file is parsed on its own and checked for the layers a game expects,
//! for tilesets, for the tsx and image files they reference and for a sane
//! map geometry. The result is a [Report] per file, files with errors fail.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::attributes::coerce_int;
use crate::resource_manager::{clean_path, normalize, to_slash};
use crate::{Error, ResourceManager, Result, ValidateOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// The tmx file is not well formed xml.
    XmlParse,
    MissingLayer,
    NoTileset,
    /// A referenced tsx or image file does not exist.
    Resolution,
    /// A tsx file that exists but could not be read.
    BrokenTileset,
    /// A tsx file without any image.
    NoImages,
    Geometry,
    TileSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self{ kind, message: message.into() }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result of validating a single tmx file.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub path: PathBuf,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub layers_found: BTreeSet<String>,
    pub tsx_files: Vec<PathBuf>,
    pub images_found: Vec<PathBuf>,
}

impl Report {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.errors.push(Issue::new(kind, message));
    }

    fn warning(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.warnings.push(Issue::new(kind, message));
    }
}

fn children<'a, 'input>(node: roxmltree::Node<'a, 'input>, tag: &'static str) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    node.children().filter(move |c| c.tag_name().name() == tag)
}

/// Sources of the atlas image and of the per tile images of a tileset node.
fn image_sources<'a>(tileset: roxmltree::Node<'a, '_>) -> Vec<&'a str> {
    let atlas = children(tileset, "image");
    let per_tile = children(tileset, "tile").flat_map(|tile| children(tile, "image"));
    atlas
        .chain(per_tile)
        .filter_map(|image| image.attribute("source"))
        .filter(|source| !source.trim().is_empty())
        .collect()
}

/// Path of `source`, written in a file inside of `dir`, relative to the map directory.
fn rebase(dir: &Path, source: &str) -> String {
    to_slash(&normalize(&dir.join(clean_path(source))))
}

/// Validate the tmx file at `path`.
pub fn validate_file(path: &Path, options: &ValidateOptions) -> Report {
    let mut resources = ResourceManager::default();
    resources.set_base_path(path.parent().map(Path::to_path_buf).unwrap_or_default());

    match std::fs::read_to_string(path) {
        Ok(text) => validate_str(path, &text, &mut resources, options),
        Err(e) => {
            let mut report = Report{ path: path.to_path_buf(), ..Report::default() };
            report.error(IssueKind::XmlParse, format!("TMX could not be read: {}", e));
            report
        }
    }
}

/// Validate tmx text. Referenced files are looked up through `resources`,
/// whose base path must be the directory of the tmx file.
pub fn validate_str(path: &Path, tmx: &str, resources: &mut ResourceManager, options: &ValidateOptions) -> Report {
    let mut report = Report{ path: path.to_path_buf(), ..Report::default() };

    let document = match roxmltree::Document::parse(tmx) {
        Ok(document) => document,
        Err(e) => {
            report.error(IssueKind::XmlParse, format!("TMX XML parse failed: {}", e));
            return report;
        }
    };
    let root = document.root_element();

    report.layers_found = ["layer", "objectgroup", "imagelayer", "group"]
        .iter()
        .flat_map(|tag| children(root, tag))
        .filter_map(|node| node.attribute("name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    for required in &options.required_layers {
        if !report.layers_found.contains(required) {
            report.error(IssueKind::MissingLayer, format!("Missing required layer: {}", required));
        }
    }

    let tilesets: Vec<_> = children(root, "tileset").collect();
    if tilesets.is_empty() {
        report.error(IssueKind::NoTileset, "No <tileset> found in TMX.");
    }

    for tileset in tilesets {
        match tileset.attribute("source") {
            Some(source) => check_external_tileset(&mut report, source, resources),
            None => {
                for source in image_sources(tileset) {
                    let image = rebase(Path::new(""), source);
                    check_image(&mut report, &image, resources, "inline by TMX");
                }
            }
        }
    }

    check_geometry(&mut report, root, options);
    report
}

fn check_image(report: &mut Report, image: &str, resources: &ResourceManager, referenced_by: &str) {
    let path = resources.resolve(image);
    report.images_found.push(path.clone());
    if !resources.exists(image) {
        report.error(
            IssueKind::Resolution,
            format!("Missing tileset image referenced {}: {}", referenced_by, path.display()),
        );
    }
}

fn check_external_tileset(report: &mut Report, source: &str, resources: &mut ResourceManager) {
    let tsx_path = resources.resolve(source);
    report.tsx_files.push(tsx_path.clone());

    let text = match resources.load_text(source) {
        Ok(text) => text,
        Err(e @ Error::Resolution{ .. }) => {
            report.error(IssueKind::Resolution, format!("Missing TSX file: {}", e));
            return;
        }
        Err(e) => {
            report.warning(IssueKind::BrokenTileset, format!("TSX could not be read: {}: {}", tsx_path.display(), e));
            return;
        }
    };
    let document = match roxmltree::Document::parse(&text) {
        Ok(document) => document,
        Err(e) => {
            report.warning(IssueKind::BrokenTileset, format!("TSX XML parse failed: {}: {}", tsx_path.display(), e));
            return;
        }
    };

    // images inside of a tsx are relative to the tsx
    let tsx_dir = clean_path(source).parent().map(Path::to_path_buf).unwrap_or_default();
    let sources = image_sources(document.root_element());
    if sources.is_empty() {
        report.warning(IssueKind::NoImages, format!("No <image> tags found inside TSX: {}", tsx_path.display()));
    }
    for source in sources {
        check_image(report, &rebase(&tsx_dir, source), resources, "by TSX");
    }
}

fn check_geometry(report: &mut Report, root: roxmltree::Node, options: &ValidateOptions) {
    let attributes: Option<Vec<&str>> = ["width", "height", "tilewidth", "tileheight"]
        .iter()
        .map(|name| root.attribute(*name))
        .collect();
    let attributes = match attributes {
        Some(attributes) => attributes,
        None => {
            report.warning(IssueKind::Geometry, "TMX missing width/height/tilewidth/tileheight attributes.");
            return;
        }
    };

    let values: Result<Vec<i64>> = attributes.iter().map(|raw| coerce_int(raw)).collect();
    let (width, height, tile_width, tile_height) = match values.as_deref() {
        Ok(&[width, height, tile_width, tile_height]) => (width, height, tile_width, tile_height),
        _ => {
            report.warning(IssueKind::Geometry, "Could not parse width/height/tilewidth/tileheight as ints.");
            return;
        }
    };

    if width <= 0 || height <= 0 {
        report.error(IssueKind::Geometry, format!("Invalid map size: {}x{}", width, height));
    }
    let usual = |size: i64| u32::try_from(size).map_or(false, |size| options.tile_sizes.contains(&size));
    if !usual(tile_width) {
        report.warning(IssueKind::TileSize, format!("Unusual tilewidth: {}", tile_width));
    }
    if !usual(tile_height) {
        report.warning(IssueKind::TileSize, format!("Unusual tileheight: {}", tile_height));
    }
}

/// All tmx files below `root`, sorted, at most `max_files` of them.
pub fn find_tmx_files(root: &Path, max_files: usize) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.tmx", glob::Pattern::escape(&root.to_string_lossy()));
    let paths = glob(&pattern).map_err(|e| Error::ParseError(Box::new(e)))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable path: {}", e),
        }
    }
    files.sort();
    files.truncate(max_files);
    Ok(files)
}

/// Validate every tmx file below `root`.
pub fn validate_dir(root: &Path, options: &ValidateOptions) -> Result<Vec<Report>> {
    let files = find_tmx_files(root, options.max_files)?;
    log::info!("Scanning {} TMX file(s) under: {}", files.len(), root.display());
    Ok(files.iter().map(|path| validate_file(path, options)).collect())
}
