use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

use super::catalog::ModeCatalog;
use super::scanner::ConfigDirectoryScanner;

/// Holder of the active mode catalog
///
/// Uses `ArcSwap` so readers never block. A reload builds a brand-new
/// catalog and swaps it in; the previous one is released as a unit once
/// the last reader drops its `Arc`.
pub struct ModeCatalogStore {
    scanner: ConfigDirectoryScanner,
    current: ArcSwap<ModeCatalog>,
}

impl ModeCatalogStore {
    /// Create a store with an empty catalog
    pub fn new(scanner: ConfigDirectoryScanner) -> Self {
        Self {
            scanner,
            current: ArcSwap::from_pointee(ModeCatalog::default()),
        }
    }

    /// Create a store and load the selected root
    pub fn load(scanner: ConfigDirectoryScanner, diagnostic: bool) -> Self {
        let store = Self::new(scanner);
        store.reload(diagnostic);
        store
    }

    pub fn scanner(&self) -> &ConfigDirectoryScanner {
        &self.scanner
    }

    /// Get the active catalog
    pub fn current(&self) -> Arc<ModeCatalog> {
        self.current.load_full()
    }

    /// Rebuild from disk and replace the active catalog wholesale
    pub fn reload(&self, diagnostic: bool) -> Arc<ModeCatalog> {
        let catalog = Arc::new(ModeCatalog::build(&self.scanner, diagnostic));
        let previous = self.current.swap(catalog.clone());
        info!(
            previous = previous.len(),
            current = catalog.len(),
            "Mode catalog replaced"
        );
        catalog
    }

    /// Drop the active catalog, leaving an empty one
    pub fn release(&self) {
        self.current.store(Arc::new(ModeCatalog::default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::parser::ParseOptions;
    use crate::modes::scanner::ModeDirs;
    use tempfile::TempDir;

    #[test]
    fn test_reload_replaces_catalog() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ini"), "[mode]\nname=A\nmodule=m\n").unwrap();

        let scanner = ConfigDirectoryScanner::new(
            ModeDirs {
                dir: dir.path().to_path_buf(),
                diag_dir: dir.path().join("diag"),
            },
            ParseOptions::default(),
        );
        let store = ModeCatalogStore::load(scanner, false);

        let old = store.current();
        assert_eq!(old.names().collect::<Vec<_>>(), vec!["A"]);

        std::fs::write(dir.path().join("b.ini"), "[mode]\nname=B\nmodule=m\n").unwrap();
        store.reload(false);

        // The old snapshot is untouched, the new one sees both files
        assert_eq!(old.len(), 1);
        assert_eq!(store.current().names().collect::<Vec<_>>(), vec!["A", "B"]);

        store.release();
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_old_catalog_released_with_last_reader() {
        let store = ModeCatalogStore::new(ConfigDirectoryScanner::default());
        let snapshot = store.current();
        assert_eq!(Arc::strong_count(&snapshot), 2);

        store.release();
        assert_eq!(Arc::strong_count(&snapshot), 1);
    }
}
