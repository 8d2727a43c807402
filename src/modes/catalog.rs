//! Sorted, owned collection of loaded modes

use tracing::{debug, info};

use super::record::ModeRecord;
use super::scanner::ConfigDirectoryScanner;

/// All modes loaded from one scan of one root
///
/// Records are sorted by name (byte-wise). Duplicate names are kept; the
/// sort is stable so duplicates keep their scan order.
#[derive(Debug, Clone, Default)]
pub struct ModeCatalog {
    modes: Vec<ModeRecord>,
    diagnostic: bool,
}

impl ModeCatalog {
    /// Scan the selected root and build a catalog from the accepted records
    pub fn build(scanner: &ConfigDirectoryScanner, diagnostic: bool) -> Self {
        let catalog = Self::from_records(scanner.scan(diagnostic), diagnostic);
        info!(
            diagnostic,
            modes = catalog.len(),
            "Mode catalog built"
        );
        catalog
    }

    /// Build a catalog from already validated records
    pub fn from_records(mut modes: Vec<ModeRecord>, diagnostic: bool) -> Self {
        modes.sort_by(|a, b| a.name().as_bytes().cmp(b.name().as_bytes()));
        Self { modes, diagnostic }
    }

    /// Whether this catalog was loaded from the diagnostic root
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModeRecord> {
        self.modes.iter()
    }

    /// Mode names in catalog order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(ModeRecord::name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Find a mode by exact name
    ///
    /// With duplicate names the first one in sorted order is returned.
    pub fn lookup(&self, name: &str) -> Option<&ModeRecord> {
        let start = self
            .modes
            .partition_point(|m| m.name().as_bytes() < name.as_bytes());
        self.modes.get(start).filter(|m| m.name() == name)
    }

    /// Owned copy of a mode, for callers that need a private instance
    pub fn duplicate(&self, name: &str) -> Option<ModeRecord> {
        self.lookup(name).cloned()
    }

    /// Release every record at once
    pub fn release(self) {
        debug!(modes = self.modes.len(), "Releasing mode catalog");
    }
}

impl<'a> IntoIterator for &'a ModeCatalog {
    type Item = &'a ModeRecord;
    type IntoIter = std::slice::Iter<'a, ModeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.modes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::parser::ParseOptions;
    use crate::modes::record::ModeFields;
    use crate::modes::scanner::ModeDirs;
    use tempfile::TempDir;

    fn record(name: &str, source: &str) -> ModeRecord {
        ModeRecord::from_fields(
            source,
            ModeFields {
                name: Some(name.to_string()),
                module: Some("g_test".to_string()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn scanner_for(dir: &TempDir) -> ConfigDirectoryScanner {
        ConfigDirectoryScanner::new(
            ModeDirs {
                dir: dir.path().to_path_buf(),
                diag_dir: dir.path().join("diag"),
            },
            ParseOptions::default(),
        )
    }

    #[test]
    fn test_sorted_bytewise() {
        let catalog = ModeCatalog::from_records(
            vec![
                record("mtp_mode", "a"),
                record("MTP", "b"),
                record("charging_only", "c"),
                record("Zeta", "d"),
            ],
            false,
        );
        let names: Vec<_> = catalog.names().collect();
        // Upper case sorts before lower case byte-wise
        assert_eq!(names, vec!["MTP", "Zeta", "charging_only", "mtp_mode"]);
    }

    #[test]
    fn test_lookup_and_duplicate() {
        let catalog =
            ModeCatalog::from_records(vec![record("b", "b.ini"), record("a", "a.ini")], false);

        assert_eq!(catalog.lookup("a").unwrap().name(), "a");
        assert!(catalog.lookup("c").is_none());
        assert!(catalog.lookup("").is_none());
        assert!(catalog.contains("b"));

        let copy = catalog.duplicate("b").unwrap();
        copy.update_cache(|c| c.interface = Some("usb0".to_string()));
        assert!(catalog.lookup("b").unwrap().cache().is_empty());
    }

    #[test]
    fn test_duplicate_names_first_in_scan_order_wins() {
        let catalog = ModeCatalog::from_records(
            vec![record("x", "first.ini"), record("a", "a.ini"), record("x", "second.ini")],
            false,
        );
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.lookup("x").unwrap().source(),
            std::path::Path::new("first.ini")
        );
    }

    #[test]
    fn test_build_scenario_mtp_and_bad() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mtp.ini"), "[mode]\nname=MTP\nmodule=g_mtp\n").unwrap();
        std::fs::write(dir.path().join("bad.ini"), "[mode]\nname=Bad\n").unwrap();

        let catalog = ModeCatalog::build(&scanner_for(&dir), false);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.iter().next().unwrap().name(), "MTP");
        assert!(!catalog.is_diagnostic());
    }

    #[test]
    fn test_build_rejects_network_without_interface() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("tether.ini"),
            "[mode]\nname=Tether\nmodule=g_ether\nnetwork=1\n",
        )
        .unwrap();

        let catalog = ModeCatalog::build(&scanner_for(&dir), false);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_build_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        // diag_dir does not exist
        let catalog = ModeCatalog::build(&scanner_for(&dir), true);
        assert!(catalog.is_empty());
        assert!(catalog.is_diagnostic());
    }

    #[test]
    fn test_build_sysfs_invariants() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("novalue.ini"),
            "[mode]\nname=NoValue\nmodule=m\n[options]\nsysfs_path=/sys/x\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("nopath.ini"),
            "[mode]\nname=NoPath\nmodule=m\n[options]\nsysfs_reset_value=0\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("ok.ini"),
            "[mode]\nname=Ok\nmodule=m\n[options]\nsysfs_path=/sys/x\nsysfs_value=1\nsysfs_reset_value=0\n",
        )
        .unwrap();

        let catalog = ModeCatalog::build(&scanner_for(&dir), false);
        let names: Vec<_> = catalog.names().collect();
        assert_eq!(names, vec!["Ok"]);
    }
}
