//! Dynamic USB mode configuration
//!
//! Mode descriptions are read from one of two directories (normal or
//! diagnostic) into a sorted, owned catalog:
//!
//! ```text
//! ModeCatalogStore (active catalog, reload = full replace)
//!     └── ModeCatalog (sorted by name)
//!             └── ConfigDirectoryScanner (one root per scan)
//!                     └── parse_mode_file (key file -> validated ModeRecord)
//! ```

pub mod catalog;
pub mod parser;
pub mod record;
pub mod scanner;
pub mod store;

pub use catalog::ModeCatalog;
pub use parser::{parse_mode_file, try_parse_mode_file, ParseOptions};
pub use record::{ExtraSysfs, ModeFields, ModeRecord, ModeRejection, NetworkCache};
pub use scanner::{ConfigDirectoryScanner, ModeDirs, DEFAULT_DIAG_MODE_DIR, DEFAULT_MODE_DIR};
pub use store::ModeCatalogStore;

/// Build a catalog from the default roots
pub fn load_catalog(diagnostic: bool) -> ModeCatalog {
    ModeCatalog::build(&ConfigDirectoryScanner::default(), diagnostic)
}

/// Release a catalog and every record it owns
pub fn release_catalog(catalog: ModeCatalog) {
    catalog.release();
}
