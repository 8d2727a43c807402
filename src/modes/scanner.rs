//! Mode configuration directory scanning

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::parser::{parse_mode_file, ParseOptions};
use super::record::ModeRecord;

/// Default directory holding normal mode files
pub const DEFAULT_MODE_DIR: &str = "/etc/usb-moded/dyn-modes";

/// Default directory holding diagnostic mode files
pub const DEFAULT_DIAG_MODE_DIR: &str = "/etc/usb-moded/diag";

/// The two mode configuration roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDirs {
    /// Normal mode directory
    pub dir: PathBuf,
    /// Diagnostic mode directory
    pub diag_dir: PathBuf,
}

impl Default for ModeDirs {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_MODE_DIR),
            diag_dir: PathBuf::from(DEFAULT_DIAG_MODE_DIR),
        }
    }
}

impl ModeDirs {
    /// Pick exactly one root
    pub fn select(&self, diagnostic: bool) -> &Path {
        if diagnostic {
            &self.diag_dir
        } else {
            &self.dir
        }
    }
}

/// Feeds every file of one mode root to the parser
#[derive(Debug, Clone, Default)]
pub struct ConfigDirectoryScanner {
    dirs: ModeDirs,
    options: ParseOptions,
}

impl ConfigDirectoryScanner {
    pub fn new(dirs: ModeDirs, options: ParseOptions) -> Self {
        Self { dirs, options }
    }

    pub fn dirs(&self) -> &ModeDirs {
        &self.dirs
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Scan the normal or diagnostic root
    pub fn scan(&self, diagnostic: bool) -> Vec<ModeRecord> {
        self.scan_dir(self.dirs.select(diagnostic))
    }

    /// Scan one directory, non-recursively
    ///
    /// An unreadable directory is not an error: it yields no records.
    /// Order follows the filesystem.
    pub fn scan_dir(&self, dir: &Path) -> Vec<ModeRecord> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), "Cannot open mode directory: {}", e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), "Failed to read directory entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            // file_type() does not follow symlinks, metadata() does
            let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                debug!(path = %path.display(), "Skipping non-file entry");
                continue;
            }

            if let Some(record) = parse_mode_file(&path, &self.options) {
                records.push(record);
            }
        }

        info!(
            dir = %dir.display(),
            count = records.len(),
            "Scanned mode directory"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_select_root() {
        let dirs = ModeDirs::default();
        assert_eq!(dirs.select(false), Path::new(DEFAULT_MODE_DIR));
        assert_eq!(dirs.select(true), Path::new(DEFAULT_DIAG_MODE_DIR));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let scanner = ConfigDirectoryScanner::default();
        assert!(scanner.scan_dir(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_scan_skips_subdirectories_and_rejects() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("nested").join("inner.ini"),
            "[mode]\nname=Inner\nmodule=g_inner\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("mtp.ini"), "[mode]\nname=MTP\nmodule=g_mtp\n").unwrap();
        std::fs::write(dir.path().join("bad.ini"), "[mode]\nname=Bad\n").unwrap();

        let scanner = ConfigDirectoryScanner::default();
        let records = scanner.scan_dir(dir.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "MTP");
    }

    #[test]
    fn test_scan_uses_selected_root() {
        let normal = TempDir::new().unwrap();
        let diag = TempDir::new().unwrap();
        std::fs::write(normal.path().join("a.ini"), "[mode]\nname=A\nmodule=m\n").unwrap();
        std::fs::write(diag.path().join("d.ini"), "[mode]\nname=Diag\nmodule=m\n").unwrap();

        let scanner = ConfigDirectoryScanner::new(
            ModeDirs {
                dir: normal.path().to_path_buf(),
                diag_dir: diag.path().to_path_buf(),
            },
            ParseOptions::default(),
        );

        let names: Vec<_> = scanner.scan(true).iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["Diag"]);
        let names: Vec<_> = scanner.scan(false).iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["A"]);
    }
}
