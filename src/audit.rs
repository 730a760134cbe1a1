//! Size check of atlas images against the texture limits of the engine.

use std::fmt;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageStatus {
    Ok,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOptions {
    /// Images wider or taller than this are reported as a warning.
    pub warn: u32,
    pub critical: u32,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self{ warn: 4096, critical: 8192 }
    }
}

impl AuditOptions {
    pub fn classify(&self, width: u32, height: u32) -> ImageStatus {
        let largest = width.max(height);
        if largest > self.critical {
            ImageStatus::Critical
        } else if largest > self.warn {
            ImageStatus::Warning
        } else {
            ImageStatus::Ok
        }
    }
}

#[derive(Debug)]
pub struct ImageEntry {
    pub path: PathBuf,
    /// Width, height and status, or why the image could not be read.
    pub outcome: Result<(u32, u32, ImageStatus)>,
}

impl ImageEntry {
    pub fn status(&self) -> Option<ImageStatus> {
        self.outcome.as_ref().ok().map(|(_, _, status)| *status)
    }

    /// Display of the entry with its path relative to `base`.
    pub fn display<'a>(&'a self, base: &'a Path, options: &'a AuditOptions) -> impl fmt::Display + 'a {
        EntryDisplay{ entry: self, base, options }
    }
}

struct EntryDisplay<'a> {
    entry: &'a ImageEntry,
    base: &'a Path,
    options: &'a AuditOptions,
}

impl fmt::Display for EntryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.entry.path.strip_prefix(self.base).unwrap_or(&self.entry.path);
        match &self.entry.outcome {
            Ok((width, height, ImageStatus::Ok)) => write!(f, "{}: {}x{} - OK", path.display(), width, height),
            Ok((width, height, ImageStatus::Warning)) => {
                write!(f, "{}: {}x{} - WARNING (>{})", path.display(), width, height, self.options.warn)
            }
            Ok((width, height, ImageStatus::Critical)) => {
                write!(f, "{}: {}x{} - CRITICAL (>{})", path.display(), width, height, self.options.critical)
            }
            Err(e) => write!(f, "{}: Could not read dimensions: {}", path.display(), e),
        }
    }
}

pub fn audit_image(path: &Path, options: &AuditOptions) -> Result<(u32, u32, ImageStatus)> {
    let (width, height) = image::image_dimensions(path)?;
    Ok((width, height, options.classify(width, height)))
}

/// Audit every png below `dir`, sorted by path.
pub fn audit_dir(dir: &Path, options: &AuditOptions) -> Result<Vec<ImageEntry>> {
    let pattern = format!("{}/**/*.png", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| Error::ParseError(Box::new(e)))?
        .filter_map(|entry| entry.map_err(|e| log::warn!("Skipping unreadable path: {}", e)).ok())
        .collect();
    paths.sort();

    log::info!("Checking {} image(s) in {}", paths.len(), dir.display());
    Ok(paths
        .into_iter()
        .map(|path| {
            let outcome = audit_image(&path, options);
            ImageEntry{ path, outcome }
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify() {
        let options = AuditOptions::default();
        assert_eq!(options.classify(4096, 4096), ImageStatus::Ok);
        assert_eq!(options.classify(256, 4097), ImageStatus::Warning);
        assert_eq!(options.classify(8193, 16), ImageStatus::Critical);
    }

    #[test]
    fn test_audit_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        image::RgbaImage::new(8, 4100).save(dir.path().join("tall.png"))?;
        std::fs::create_dir(dir.path().join("sub"))?;
        image::RgbaImage::new(16, 16).save(dir.path().join("sub/small.png"))?;
        std::fs::write(dir.path().join("broken.png"), b"not a png")?;

        let options = AuditOptions::default();
        let entries = audit_dir(dir.path(), &options)?;
        let statuses: Vec<_> = entries.iter().map(ImageEntry::status).collect();
        assert_eq!(statuses, vec![None, Some(ImageStatus::Ok), Some(ImageStatus::Warning)]);
        assert_eq!(entries[2].display(dir.path(), &options).to_string(), "tall.png: 8x4100 - WARNING (>4096)");
        Ok(())
    }
}
