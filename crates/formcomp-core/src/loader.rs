//! Spreadsheet loaders
//!
//! File formats live outside this crate. A front end registers one [`SpreadsheetLoader`] per
//! format in a [`LoaderRegistry`] and opens files through it; the registry is an ordinary value
//! owned by the caller.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::spreadsheet::Spreadsheet;

/// Builds a [`Spreadsheet`] from some serialized form
pub trait SpreadsheetLoader: Send + Sync {
    /// Short format name used in diagnostics (e.g. "csv")
    fn name(&self) -> &str;

    /// Lowercase file extensions this loader handles, without the dot
    fn extensions(&self) -> &[&str];

    /// Read a spreadsheet. `source_name` identifies the input in error messages.
    fn load(&self, reader: &mut dyn Read, source_name: &str) -> Result<Spreadsheet>;
}

/// Set of loaders, dispatched by file extension
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn SpreadsheetLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader. Later registrations win for a shared extension.
    pub fn register<L: SpreadsheetLoader + 'static>(&mut self, loader: L) -> &mut Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Find the loader for an extension (case-insensitive)
    pub fn for_extension(&self, extension: &str) -> Option<&dyn SpreadsheetLoader> {
        let extension = extension.to_lowercase();
        self.loaders
            .iter()
            .rev()
            .find(|l| l.extensions().iter().any(|e| *e == extension))
            .map(|l| l.as_ref())
    }

    /// Open a file with the loader registered for its extension
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Spreadsheet> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let loader = self
            .for_extension(extension)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;

        let mut reader = BufReader::new(File::open(path)?);
        loader.load(&mut reader, &path.display().to_string())
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.loaders.iter().map(|l| l.name()))
            .finish()
    }
}
