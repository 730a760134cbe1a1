//! Decoding of the `<data>` payload of tile layers into a flat list of gids.
//!
//! Supported are base64 (raw, zlib or gzip compressed), csv and the plain xml
//! form with one `<tile gid=".."/>` per cell. Anything else is rejected with
//! [UnsupportedEncoding](Error::UnsupportedEncoding).

use std::io::{Read, Write};

use crate::attributes::{normalize, schema};
use crate::{Diagnostics, Error, Result};

const GID_SIZE: usize = std::mem::size_of::<u32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Base64,
    Csv,
    /// No encoding attribute, one `<tile>` child per cell.
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    Gzip,
}

/// How a decoded tile count that does not match the layer size is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthCheck {
    /// Record a warning and keep the data as decoded.
    #[default]
    Lenient,
    /// Fail with [LengthMismatch](Error::LengthMismatch).
    Strict,
}

impl Encoding {
    /// Map the `encoding`/`compression` attributes of a data tag to a supported pair.
    pub fn from_attributes(encoding: Option<&str>, compression: Option<&str>) -> Result<(Encoding, Compression)> {
        let pair = match (encoding, compression) {
            (Some("base64"), None) => (Encoding::Base64, Compression::None),
            (Some("base64"), Some("zlib")) => (Encoding::Base64, Compression::Zlib),
            (Some("base64"), Some("gzip")) => (Encoding::Base64, Compression::Gzip),
            (Some("csv"), None) => (Encoding::Csv, Compression::None),
            (None, None) => (Encoding::Xml, Compression::None),
            (encoding, compression) => return Err(Error::UnsupportedEncoding{
                encoding: encoding.unwrap_or("none").to_string(),
                compression: compression.unwrap_or("none").to_string(),
            }),
        };
        Ok(pair)
    }

    fn name(self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Csv => "csv",
            Encoding::Xml => "xml",
        }
    }
}

impl Compression {
    fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zlib => "zlib",
            Compression::Gzip => "gzip",
        }
    }
}

fn unsupported(encoding: Encoding, compression: Compression) -> Error {
    Error::UnsupportedEncoding{
        encoding: encoding.name().to_string(),
        compression: compression.name().to_string(),
    }
}

/// Decode the textual payload of `layer` into gids.
/// [Encoding::Xml] has no textual payload, use [read_data_tag] for it.
pub fn decode(
    layer: &str,
    payload: &str,
    encoding: Encoding,
    compression: Compression,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<u32>> {
    match (encoding, compression) {
        (Encoding::Base64, compression) => {
            let raw_bytes = base64::decode(payload.trim())?;
            let raw_bytes = match compression {
                Compression::None => raw_bytes,
                Compression::Zlib => inflate_zlib(&raw_bytes)?,
                Compression::Gzip => inflate_gzip(layer, &raw_bytes, diagnostics)?,
            };
            gids_from_bytes(&raw_bytes)
        }
        (Encoding::Csv, Compression::None) => parse_csv(payload),
        (encoding, compression) => Err(unsupported(encoding, compression)),
    }
}

/// Encode gids into a textual payload, the inverse of [decode].
pub fn encode(gids: &[u32], encoding: Encoding, compression: Compression) -> Result<String> {
    match (encoding, compression) {
        (Encoding::Base64, compression) => {
            let raw_bytes: Vec<u8> = gids.iter().flat_map(|gid| gid.to_le_bytes()).collect();
            let raw_bytes = match compression {
                Compression::None => raw_bytes,
                Compression::Zlib => {
                    let mut encoder = libflate::zlib::Encoder::new(Vec::new())?;
                    encoder.write_all(&raw_bytes)?;
                    encoder.finish().into_result()?
                }
                Compression::Gzip => {
                    // a fixed timestamp keeps the output reproducible
                    let header = libflate::gzip::HeaderBuilder::new().modification_time(0).finish();
                    let options = libflate::gzip::EncodeOptions::new().header(header);
                    let mut encoder = libflate::gzip::Encoder::with_options(Vec::new(), options)?;
                    encoder.write_all(&raw_bytes)?;
                    encoder.finish().into_result()?
                }
            };
            Ok(base64::encode(raw_bytes))
        }
        (Encoding::Csv, Compression::None) => {
            Ok(gids.iter().map(|gid| gid.to_string()).collect::<Vec<_>>().join(","))
        }
        (encoding, compression) => Err(unsupported(encoding, compression)),
    }
}

fn inflate_zlib(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut decoder = libflate::zlib::Decoder::new(input)?;
    decoder.read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Some exporters write a broken or truncated gzip trailer.
/// The inflated data is kept as long as the deflate stream itself was complete.
fn inflate_gzip(layer: &str, input: &[u8], diagnostics: &mut Diagnostics) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    let mut decoder = libflate::gzip::Decoder::new(input)?;
    if let Err(e) = decoder.read_to_end(&mut decoded) {
        if decoded.is_empty() {
            return Err(e.into());
        }
        diagnostics.warn(format!("layer '{}'", layer), format!("ignoring bad gzip trailer: {}", e));
    }
    Ok(decoded)
}

/// Interpret a byte buffer as consecutive little endian u32 values.
fn gids_from_bytes(raw_bytes: &[u8]) -> Result<Vec<u32>> {
    if raw_bytes.len() % GID_SIZE != 0 {
        return Err(Error::StructureError{
            tag: "data".into(),
            msg: format!("{} bytes of tile data is not a whole number of 32 bit gids", raw_bytes.len()),
        });
    }

    Ok(
        raw_bytes.chunks_exact(GID_SIZE)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
    )
}

fn parse_csv(payload: &str) -> Result<Vec<u32>> {
    payload
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<u32>().map_err(Error::from))
        .collect()
}

/// Helper function to read the gids contained in the "data" tag of `layer`
pub fn read_data_tag(layer: &str, data_node: &roxmltree::Node, diagnostics: &mut Diagnostics) -> Result<Vec<u32>> {
    let attributes = normalize(data_node, schema::DATA, diagnostics)?;
    let (encoding, compression) = Encoding::from_attributes(attributes.text("encoding"), attributes.text("compression"))?;

    if data_node.children().any(|c| c.tag_name().name() == "chunk") {
        return Err(Error::UnsupportedFeature("Chunked tile data of infinite maps".into()));
    }

    match encoding {
        Encoding::Xml => data_node
            .children()
            .filter(|c| c.tag_name().name() == "tile")
            .map(|tile| -> Result<u32> {
                Ok(tile.attribute("gid").map(|gid| gid.trim().parse::<u32>()).transpose()?.unwrap_or(0))
            })
            .collect(),
        encoding => decode(layer, data_node.text().unwrap_or_default(), encoding, compression, diagnostics),
    }
}

/// Make sure a layer decoded to exactly `width * height` gids.
pub fn check_length(
    layer: &str,
    gids: &[u32],
    width: u32,
    height: u32,
    mode: LengthCheck,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let expected = width as usize * height as usize;
    if gids.len() == expected {
        return Ok(());
    }

    let error = Error::LengthMismatch{ layer: layer.to_string(), expected, actual: gids.len() };
    match mode {
        LengthCheck::Strict => Err(error),
        LengthCheck::Lenient => {
            diagnostics.warn(format!("layer '{}'", layer), error.to_string());
            Ok(())
        }
    }
}
