//! tmxbake turns [Tiled](https://mapeditor.org) maps into a single json
//! document that a 2D engine can load without knowing about tmx or tsx files.
//!
//! Tilesets referenced from external tsx files are embedded, tile layer data is
//! decoded into plain gid arrays and custom properties get their declared types.
//! Tilesets whose atlas image is taller than the engine supports can be
//! [split](partition) into several tilesets afterwards.
//!
//! As a starting point,
//! convert a map using any of the *from_\** functions provided in the [Map] type.
//!
//! ```no_run
//! let path = std::path::Path::new("maps/town.tmx");
//! let conversion = tmxbake::Map::from_file(&path, &tmxbake::ConvertOptions::default())?;
//!
//! for diagnostic in conversion.diagnostics.entries() {
//!     println!("{}", diagnostic);
//! }
//! conversion.map.write_json(std::path::Path::new("maps/town.json"))?;
//!
//! # Ok::<(),tmxbake::Error>(())
//! ```

#[macro_use] extern crate impl_ops;

mod errors;
mod resource_manager;
mod property;
mod diagnostics;
pub mod attributes;
pub mod audit;
pub mod cli;
pub mod config;
pub mod data;
pub mod inspect;
pub mod layer;
pub mod map;
pub mod math;
pub mod partition;
pub mod tileset;
pub mod validate;

pub use resource_manager::{ResourceManager, Provider, FileProvider, MemoryProvider, write_atomic};
pub use property::{PropertyContainer, Property, PropertyType, PropertyValue};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use config::{Config, ConvertOptions, PartitionOptions, ValidateOptions};
pub use layer::{Layer, LayerHeader, TileLayer, ObjectLayer, ImageLayer, Object};
pub use map::{Map, Conversion, Orientation, Renderorder};
pub use tileset::{Tileset, HeightOverrides, tileset_for_gid};
pub use tileset::{GID_HORIZONTAL_FLIP_FLAG, GID_VERTICAL_FLIP_FLAG, GID_DIAGONAL_FLIP_FLAG};
pub use errors::Error;
pub use errors::Result;
