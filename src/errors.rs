use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An error in the structure of the data, e.g. a required tag is missing.
    #[error(r#"Error in the map data at '{tag}': "{msg}""#)]
    StructureError{ tag: String, msg: String },

    /// A required value could not be parsed, e.g. `width="ten"` on a map.
    #[error(transparent)]
    ParseError(Box<dyn std::error::Error + Send + Sync>),

    /// The tmx or tsx file is not valid xml.
    #[error("Malformed xml: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// An external tileset or image referenced by the map does not exist.
    #[error("Cannot resolve '{}'", path.display())]
    Resolution{ path: PathBuf },

    /// Layer data uses an encoding/compression pair we do not decode.
    #[error("Unsupported layer data encoding '{encoding}' with compression '{compression}'")]
    UnsupportedEncoding{ encoding: String, compression: String },

    /// Decoded tile count does not match the layer geometry.
    #[error("Layer '{layer}' decoded to {actual} tiles, expected {expected}")]
    LengthMismatch{ layer: String, expected: usize, actual: usize },

    /// A chunk of an atlas is not a whole number of tile rows.
    #[error("Chunk {index} is {height}px high, which is not a multiple of the {tile_height}px tile height")]
    MisalignedChunk{ index: usize, height: u32, tile_height: u32 },

    /// Split tilesets would run into the tileset that follows them.
    #[error("Chunks of '{tileset}' end at gid {end}, past the firstgid {next_firstgid} of '{next}'")]
    GidContiguity{ tileset: String, end: u32, next: String, next_firstgid: u32 },

    /// Tilesets are not listed in strictly increasing firstgid order.
    #[error("Tileset '{name}' has firstgid {firstgid}, which does not follow {previous}")]
    TilesetOrder{ name: String, firstgid: u32, previous: u32 },

    /// Chunk tile counts do not add up to the tileset they replace.
    #[error("Chunks of '{tileset}' hold {actual} tiles, the tileset declares {expected}")]
    TileCountMismatch{ tileset: String, expected: u32, actual: u64 },

    /// A general IO error, e.g. opening a file failed
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// Map uses features that are not (yet) supported
    #[error("Feature not supported: {0}")]
    UnsupportedFeature(String)
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::ParseError(Box::new(e))
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(e: std::num::ParseFloatError) -> Self {
        Error::ParseError(Box::new(e))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::ParseError(Box::new(e))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::IO(e.error)
    }
}
