//! Session-lifetime memoization of loaded tables.

use crate::data::loader::load_table;
use crate::error::LoadError;
use crate::models::Table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Tables keyed by the input path as given. Entries live until the cache is dropped.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<PathBuf, Arc<Table>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `path`, loading it on first use.
    ///
    /// Failed loads are not cached.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Table>, LoadError> {
        if let Some(table) = self.tables.get(path) {
            debug!("Table cache hit for {}", path.display());
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(load_table(path)?);
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    /// Number of tables held.
    pub fn len(&self) -> usize {
        self.tables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str =
        r#"[{"EV Vendor":"Acme","address":"1 Main St","reviewsCount":5,"totalScore":4.5}]"#;

    #[test]
    fn test_second_load_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaned_ev_data.json");
        std::fs::write(&path, ROW).unwrap();

        let mut cache = TableCache::new();
        let first = cache.get_or_load(&path).unwrap();

        // The file is gone, but the cached table is still served.
        std::fs::remove_file(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_relative_path_served_after_file_removed() {
        let file = tempfile::Builder::new()
            .prefix("evinsight-cache-")
            .suffix(".json")
            .tempfile_in(".")
            .unwrap();
        std::fs::write(file.path(), ROW).unwrap();
        let relative = PathBuf::from(file.path().file_name().unwrap());

        let mut cache = TableCache::new();
        let first = cache.get_or_load(&relative).unwrap();

        file.close().unwrap();
        let second = cache.get_or_load(&relative).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let mut cache = TableCache::new();
        assert!(cache.get_or_load(&path).is_err());
        assert_eq!(cache.len(), 0);

        std::fs::write(&path, ROW).unwrap();
        assert_eq!(cache.get_or_load(&path).unwrap().len(), 1);
    }
}
