//! Settings for the conversion, partitioning and validation steps.
//!
//! Every step takes its options as a plain value. The command line tool can
//! read them from a toml file:
//!
//! ```toml
//! [convert]
//! strict = true
//!
//! [convert.height_overrides]
//! terrain-map-v8 = 12000
//!
//! [partition]
//! max_chunk_height = 4096
//!
//! [validate]
//! required_layers = ["Ground", "Collisions"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::LengthCheck;
use crate::tileset::HeightOverrides;
use crate::Result;

/// Options of the tmx to json conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Fail instead of warn when a layer decodes to the wrong number of tiles.
    pub strict: bool,
    /// Fail when a tileset or image layer image does not exist.
    pub verify_images: bool,
    /// Write image paths as bare file names.
    pub image_basename: bool,
    pub height_overrides: HeightOverrides,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self{
            strict: false,
            verify_images: true,
            image_basename: false,
            height_overrides: HeightOverrides::new(),
        }
    }
}

impl ConvertOptions {
    pub fn length_check(&self) -> LengthCheck {
        if self.strict { LengthCheck::Strict } else { LengthCheck::Lenient }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionOptions {
    /// Tallest atlas image, in pixels, the engine accepts.
    pub max_chunk_height: u32,
    /// Substring of the name or image of the tileset to split.
    /// Without it the first tileset taller than `max_chunk_height` is split.
    pub target: Option<String>,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self{ max_chunk_height: 4096, target: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    pub required_layers: Vec<String>,
    /// Upper bound on the number of tmx files scanned.
    pub max_files: usize,
    /// Tile sizes that do not raise a warning.
    pub tile_sizes: Vec<u32>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self{
            required_layers: Vec::new(),
            max_files: 2000,
            tile_sizes: vec![8, 16, 32, 64],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub convert: ConvertOptions,
    pub partition: PartitionOptions,
    pub validate: ValidateOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_config_is_default() -> Result<()> {
        let config = Config::from_toml_str("")?;
        assert_eq!(config, Config::default());
        assert!(config.convert.verify_images);
        assert_eq!(config.partition.max_chunk_height, 4096);
        assert_eq!(config.validate.max_files, 2000);
        assert_eq!(config.validate.tile_sizes, vec![8, 16, 32, 64]);
        Ok(())
    }

    #[test]
    fn test_partial_config() -> Result<()> {
        let config = Config::from_toml_str(r#"
            [convert]
            strict = true

            [convert.height_overrides]
            terrain-map-v8 = 12000

            [validate]
            required_layers = ["Ground", "Collisions"]
        "#)?;

        assert_eq!(config.convert.length_check(), LengthCheck::Strict);
        assert!(config.convert.verify_images);
        assert_eq!(config.convert.height_overrides.lookup("terrain-map-v8", ""), Some(("terrain-map-v8", 12000)));
        assert_eq!(config.validate.required_layers, vec!["Ground", "Collisions"]);
        assert_eq!(config.validate.max_files, 2000);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::from_toml_str("[partition]\nmax_chunk_height = \"tall\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tmxbake.toml");
        std::fs::write(&path, "[partition]\ntarget = \"terrain\"\n")?;
        let config = Config::load(&path)?;
        assert_eq!(config.partition.target.as_deref(), Some("terrain"));
        Ok(())
    }
}
