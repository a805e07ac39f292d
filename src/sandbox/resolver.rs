//! Lookup of referenced assemblies in a managed-assemblies directory.
//!
//! [`AssemblyResolver`] maps a simple assembly name to a loaded [`BinaryImage`]. Candidates are
//! searched by extension in the order `dll`, `so`, `dylib`; within one extension directory entries
//! are visited sorted by file name and the first whose stem matches the requested name, ignoring
//! ASCII case, wins. Every resolved image is cached until [`AssemblyResolver::clear`] is called or
//! the resolver is dropped.
//!
//! # Thread Safety
//!
//! The cache is a [`DashMap`], so a single resolver can be shared by concurrent scans of the same
//! installation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::sandbox::AssemblyResolver;
//!
//! let resolver = AssemblyResolver::new("Game_Data/Managed");
//! let runtime = resolver.resolve("System.Runtime")?;
//! println!("resolved {}", runtime.name());
//! # Ok::<(), dotsandbox::Error>(())
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use tracing::debug;

use crate::{metadata::image::BinaryImage, Error, Result};

/// Extensions searched for assemblies, in priority order
const EXTENSIONS: &[&str] = &["dll", "so", "dylib"];

/// Resolves assembly names to images of a managed directory
pub struct AssemblyResolver {
    managed_dir: PathBuf,
    /// Lowercased assembly name to loaded image
    cache: DashMap<String, Arc<BinaryImage>>,
}

impl AssemblyResolver {
    /// Create a resolver over `managed_dir`
    ///
    /// The directory is not read until the first lookup.
    pub fn new(managed_dir: impl Into<PathBuf>) -> Self {
        AssemblyResolver {
            managed_dir: managed_dir.into(),
            cache: DashMap::new(),
        }
    }

    /// The directory searched by this resolver
    #[must_use]
    pub fn managed_dir(&self) -> &Path {
        &self.managed_dir
    }

    /// Load the assembly `name`, or return the cached image of an earlier lookup
    ///
    /// # Errors
    /// Returns [`Error::AssemblyNotFound`] if no file matches, [`Error::FileError`] if the
    /// directory cannot be read, or the load error of the matching file.
    pub fn resolve(&self, name: &str) -> Result<Arc<BinaryImage>> {
        let key = name.to_ascii_lowercase();
        if let Some(image) = self.cache.get(&key) {
            return Ok(image.clone());
        }

        let Some(path) = self.find(name)? else {
            return Err(Error::AssemblyNotFound(name.to_string()));
        };

        debug!("Found DLL for assembly '{}': {}", name, path.display());
        let image = Arc::new(BinaryImage::from_file(&path)?);

        Ok(self.cache.entry(key).or_insert(image).clone())
    }

    /// Number of cached images
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached image, releasing their memory maps
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn find(&self, name: &str) -> Result<Option<PathBuf>> {
        let mut entries = fs::read_dir(&self.managed_dir)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for extension in EXTENSIONS {
            let found = entries.iter().find(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                    && path
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .is_some_and(|stem| stem.eq_ignore_ascii_case(name))
            });

            if let Some(path) = found {
                return Ok(Some(path.clone()));
            }
        }

        Ok(None)
    }
}
