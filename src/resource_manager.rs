use std::{collections::HashMap, io::{Read, Write}, path::{Component, Path, PathBuf}};

use crate::{Result, Error};

/// Resolves file references of a map relative to the directory of the map
/// and reads them through a [Provider].
pub struct ResourceManager {
    base_path: PathBuf,
    file_provider: Box<dyn Provider>,
}

impl ResourceManager {
    /// Create a new resource manager with a given data provider.
    /// Defaults the base path to the current directory (`.`).
    pub fn new<P: Provider + 'static>(file_provider: P) -> Self {
        Self {
            base_path: ".".into(),
            file_provider: Box::new(file_provider),
        }
    }

    /// Path of a file referenced from the map, e.g. `../tilesets/terrain.tsx`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        normalize(&self.base_path.join(clean_path(path)))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.file_provider.exists(&self.resolve(path))
    }

    /// Read a referenced text file.
    /// A missing file is a [Resolution](Error::Resolution) error.
    pub fn load_text(&mut self, path: &str) -> Result<String> {
        let path = self.resolve(path);
        if !self.file_provider.exists(&path) {
            return Err(Error::Resolution{ path });
        }
        let data = self.file_provider.read(&path)?;
        String::from_utf8(data).map_err(|e| Error::ParseError(Box::new(e)))
    }

    /// Set the resource manager's base path.
    pub fn set_base_path(&mut self, base_path: PathBuf) {
        self.base_path = base_path;
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        ResourceManager::new(FileProvider{})
    }
}

/// Trait to provide external data.
pub trait Provider {
    /// Return the contents of the file at `path`.
    fn read(&mut self, path: &Path) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;
}

/// [Provider] that reads the data from files on the file system.
pub struct FileProvider {}

impl Provider for FileProvider {
    fn read(&mut self, path: &Path) -> Result<Vec<u8>> {
        let mut file = std::fs::File::open(path)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// [Provider] serving files from memory, keyed by their normalized path.
#[derive(Default)]
pub struct MemoryProvider {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(normalize(path.as_ref()), content.into());
        self
    }
}

impl Provider for MemoryProvider {
    fn read(&mut self, path: &Path) -> Result<Vec<u8>> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| Error::Resolution{ path: path.to_path_buf() })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }
}

/// Turn a path as written in a tmx/tsx file into a native relative path.
/// Tiled on windows writes backslashes.
pub fn clean_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.trim().replace('\\', "/"))
}

/// Lexically remove `.` and `name/..` pairs from a path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(result.components().next_back(), Some(Component::Normal(_))) {
                    result.pop();
                } else {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Render a path with forward slashes, the way json consumers expect it.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replace `path` with `contents` without ever leaving a truncated file behind.
/// The data is written to a temporary file next to the target and renamed over it.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./maps/../tilesets/a.tsx")), PathBuf::from("tilesets/a.tsx"));
        assert_eq!(normalize(Path::new("../a.png")), PathBuf::from("../a.png"));
        assert_eq!(normalize(Path::new("maps/./town/../../img/a.png")), PathBuf::from("img/a.png"));
    }

    #[test]
    fn test_clean_windows_path() {
        assert_eq!(to_slash(&clean_path("..\\tilesets\\a.tsx")), "../tilesets/a.tsx");
    }

    #[test]
    fn test_missing_file_is_resolution_error() {
        let mut manager = ResourceManager::new(MemoryProvider::new());
        assert!(matches!(manager.load_text("nope.tsx"), Err(Error::Resolution{ .. })));
    }

    #[test]
    fn test_memory_provider_resolves_relative_to_base() -> Result<()> {
        let mut provider = MemoryProvider::new();
        provider.insert("maps/tilesets/a.tsx", "<tileset/>");
        let mut manager = ResourceManager::new(provider);
        manager.set_base_path("maps".into());
        assert!(manager.exists("tilesets/a.tsx"));
        assert_eq!(manager.load_text("./tilesets/a.tsx")?, "<tileset/>");
        Ok(())
    }

    #[test]
    fn test_write_atomic_replaces_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out/map.json");
        write_atomic(&path, b"first")?;
        write_atomic(&path, b"second")?;
        assert_eq!(std::fs::read(&path)?, b"second");
        assert_eq!(std::fs::read_dir(path.parent().unwrap())?.count(), 1);
        Ok(())
    }
}
