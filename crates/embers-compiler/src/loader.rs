//! Content loaders: where template and include text comes from.
//!
//! Paths are plain `/`-separated strings. Include paths are resolved and
//! normalized before a loader sees them, so loaders only map a path to text.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    fn from_io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_string())
        } else {
            LoadError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Synchronous source of template text.
pub trait ContentLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<String, LoadError>;
}

/// Asynchronous source of template text.
pub trait AsyncContentLoader: Send + Sync {
    fn load(&self, path: &str) -> impl Future<Output = Result<String, LoadError>> + Send;
}

/// Loads templates from the file system, optionally below a root directory.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    /// Paths are taken relative to the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths are taken relative to `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl ContentLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        std::fs::read_to_string(self.resolve(path)).map_err(|e| LoadError::from_io(path, e))
    }
}

impl AsyncContentLoader for FsLoader {
    async fn load(&self, path: &str) -> Result<String, LoadError> {
        tokio::fs::read_to_string(self.resolve(path))
            .await
            .map_err(|e| LoadError::from_io(path, e))
    }
}

/// In-memory templates keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, text: impl Into<String>) {
        self.templates.insert(normalize_path(path), text.into());
    }

    /// Builder form of [`MemoryLoader::insert`].
    pub fn with(mut self, path: &str, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn get(&self, path: &str) -> Result<String, LoadError> {
        self.templates
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}

impl<P: AsRef<str>, T: Into<String>> FromIterator<(P, T)> for MemoryLoader {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        let mut loader = MemoryLoader::new();
        for (path, text) in iter {
            loader.insert(path.as_ref(), text);
        }
        loader
    }
}

impl ContentLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        self.get(path)
    }
}

impl AsyncContentLoader for MemoryLoader {
    async fn load(&self, path: &str) -> Result<String, LoadError> {
        self.get(path)
    }
}

/// Lexically normalize a `/`-separated path, folding `.` and `..`.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` above the root stays at the root
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Extension of the last path component, if it has one.
pub fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => Some(ext),
        _ => None,
    }
}

/// Resolve an include `target` against the including file's path.
///
/// Relative targets are joined to the caller's directory. A target without an
/// extension gets `.<extension>` appended.
pub fn resolve_include_path(caller: &str, target: &str, extension: &str) -> String {
    let joined = if target.starts_with('/') {
        target.to_string()
    } else {
        match caller.rfind('/') {
            Some(i) => format!("{}/{}", &caller[..i], target),
            None => target.to_string(),
        }
    };

    let mut path = normalize_path(&joined);
    if !extension.is_empty() && extension_of(&path).is_none() {
        path.push('.');
        path.push_str(extension);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_path("./views/user.ejs"), "views/user.ejs");
        assert_eq!(normalize_path("../a/../../b"), "../../b");
        assert_eq!(normalize_path("/a/../../b"), "/b");
        assert_eq!(normalize_path("a/.."), ".");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("views/user.ejs"), Some("ejs"));
        assert_eq!(extension_of("style.css"), Some("css"));
        assert_eq!(extension_of("views.d/user"), None);
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn test_resolve_include_path() {
        assert_eq!(resolve_include_path("views/index.ejs", "user/show", "ejs"), "views/user/show.ejs");
        assert_eq!(resolve_include_path("views/index.ejs", "../style.css", "ejs"), "style.css");
        assert_eq!(resolve_include_path("index.ejs", "pet", "ejs"), "pet.ejs");
        assert_eq!(resolve_include_path("views/index.ejs", "/abs/menu", "ejs"), "/abs/menu.ejs");
    }

    #[test]
    fn test_memory_loader() {
        let loader = MemoryLoader::new().with("./views/a.ejs", "A");
        assert_eq!(ContentLoader::load(&loader, "views/a.ejs").unwrap(), "A");
        assert!(matches!(
            ContentLoader::load(&loader, "views/b.ejs"),
            Err(LoadError::NotFound(p)) if p == "views/b.ejs"
        ));
    }

    #[test]
    fn test_fs_loader_reads_below_root() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("hello.ejs")).unwrap();
        write!(file, "hi <%= name %>").unwrap();

        let loader = FsLoader::with_root(dir.path());
        assert_eq!(ContentLoader::load(&loader, "hello.ejs").unwrap(), "hi <%= name %>");
        assert!(matches!(ContentLoader::load(&loader, "missing.ejs"), Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fs_loader_async() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ejs"), "async").unwrap();

        let loader = FsLoader::with_root(dir.path());
        assert_eq!(AsyncContentLoader::load(&loader, "a.ejs").await.unwrap(), "async");
        assert!(matches!(
            AsyncContentLoader::load(&loader, "b.ejs").await,
            Err(LoadError::NotFound(_))
        ));
    }
}
