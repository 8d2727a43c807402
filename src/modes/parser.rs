//! Mode description file parser
//!
//! Mode files are INI-style key files with two sections:
//!
//! ```ini
//! [mode]
//! name = rndis_mode
//! module = g_ether
//! network = 1
//! network_interface = usb0
//!
//! [options]
//! sysfs_path = /sys/class/android_usb/android0/functions
//! sysfs_value = rndis
//! sysfs_reset_value = none
//! ```

use std::path::Path;

use ini::{Ini, ParseOption};
use tracing::{debug, info, warn};

use super::record::{ExtraSysfs, ModeFields, ModeRecord, ModeRejection, EXTRA_SYSFS_SLOTS};

pub const SECTION_MODE: &str = "mode";
pub const SECTION_OPTIONS: &str = "options";

pub const KEY_NAME: &str = "name";
pub const KEY_MODULE: &str = "module";
pub const KEY_APPSYNC: &str = "appsync";
pub const KEY_MASS_STORAGE: &str = "mass_storage";
pub const KEY_NETWORK: &str = "network";
pub const KEY_NETWORK_INTERFACE: &str = "network_interface";

pub const KEY_SYSFS_PATH: &str = "sysfs_path";
pub const KEY_SYSFS_VALUE: &str = "sysfs_value";
pub const KEY_SYSFS_RESET_VALUE: &str = "sysfs_reset_value";
pub const KEY_EXTRA_SYSFS_PATH: &str = "android_extra_sysfs_path";
pub const KEY_EXTRA_SYSFS_VALUE: &str = "android_extra_sysfs_value";
pub const KEY_ID_PRODUCT: &str = "idProduct";
pub const KEY_ID_VENDOR_OVERRIDE: &str = "idVendorOverride";
pub const KEY_NAT: &str = "nat";
pub const KEY_DHCP_SERVER: &str = "dhcp_server";
pub const KEY_TETHERING: &str = "connman_tethering";

/// Parser behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Read `connman_tethering` into the record
    pub tethering: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            tethering: cfg!(feature = "tethering"),
        }
    }
}

/// Typed accessors over a loaded key file
struct KeyFile<'a> {
    ini: &'a Ini,
}

impl<'a> KeyFile<'a> {
    /// Raw value; a repeated key yields its last occurrence
    fn raw(&self, section: &str, key: &str) -> Option<&'a str> {
        self.ini
            .section(Some(section))
            .and_then(|props| props.get_all(key).last())
    }

    /// String value, trimmed; empty counts as absent
    fn string(&self, section: &str, key: &str) -> Option<String> {
        self.raw(section, key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    /// Integer flag; absent or non-numeric reads as 0
    fn flag(&self, section: &str, key: &str) -> bool {
        self.raw(section, key)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .is_some_and(|v| v != 0)
    }

    fn extra_sysfs(&self) -> [ExtraSysfs; EXTRA_SYSFS_SLOTS] {
        std::array::from_fn(|i| {
            let suffix = if i == 0 {
                String::new()
            } else {
                (i + 1).to_string()
            };
            ExtraSysfs {
                path: self.string(SECTION_OPTIONS, &format!("{KEY_EXTRA_SYSFS_PATH}{suffix}")),
                value: self.string(SECTION_OPTIONS, &format!("{KEY_EXTRA_SYSFS_VALUE}{suffix}")),
            }
        })
    }

    fn fields(&self, options: &ParseOptions) -> ModeFields {
        ModeFields {
            name: self.string(SECTION_MODE, KEY_NAME),
            module: self.string(SECTION_MODE, KEY_MODULE),
            appsync: self.flag(SECTION_MODE, KEY_APPSYNC),
            mass_storage: self.flag(SECTION_MODE, KEY_MASS_STORAGE),
            network: self.flag(SECTION_MODE, KEY_NETWORK),
            network_interface: self.string(SECTION_MODE, KEY_NETWORK_INTERFACE),
            sysfs_path: self.string(SECTION_OPTIONS, KEY_SYSFS_PATH),
            sysfs_value: self.string(SECTION_OPTIONS, KEY_SYSFS_VALUE),
            sysfs_reset_value: self.string(SECTION_OPTIONS, KEY_SYSFS_RESET_VALUE),
            extra_sysfs: self.extra_sysfs(),
            id_product: self.string(SECTION_OPTIONS, KEY_ID_PRODUCT),
            id_vendor_override: self.string(SECTION_OPTIONS, KEY_ID_VENDOR_OVERRIDE),
            nat: self.flag(SECTION_OPTIONS, KEY_NAT),
            dhcp_server: self.flag(SECTION_OPTIONS, KEY_DHCP_SERVER),
            tethering_technology: if options.tethering {
                self.string(SECTION_OPTIONS, KEY_TETHERING)
            } else {
                None
            },
        }
    }
}

/// Values are taken literally: no quote stripping, no escape sequences
fn key_file_options() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

/// Parse key-file text into a validated record
pub fn parse_mode_str(
    source: &Path,
    content: &str,
    options: &ParseOptions,
) -> Result<ModeRecord, ModeRejection> {
    let ini = Ini::load_from_str_opt(content, key_file_options())
        .map_err(|e| ModeRejection::Unreadable(e.to_string()))?;
    let fields = KeyFile { ini: &ini }.fields(options);
    ModeRecord::from_fields(source, fields)
}

/// Parse a mode file, reporting why it was rejected
pub fn try_parse_mode_file(
    path: &Path,
    options: &ParseOptions,
) -> Result<ModeRecord, ModeRejection> {
    let ini = Ini::load_from_file_opt(path, key_file_options())
        .map_err(|e| ModeRejection::Unreadable(e.to_string()))?;
    let fields = KeyFile { ini: &ini }.fields(options);
    ModeRecord::from_fields(path, fields)
}

/// Parse a mode file
///
/// Never fails outward: a rejected file is logged with the offending key
/// and yields `None`.
pub fn parse_mode_file(path: &Path, options: &ParseOptions) -> Option<ModeRecord> {
    debug!(path = %path.display(), "Reading mode file");

    match try_parse_mode_file(path, options) {
        Ok(record) => {
            info!(
                path = %path.display(),
                mode = record.name(),
                module = record.module(),
                "Loaded mode"
            );
            Some(record)
        }
        Err(ModeRejection::Unreadable(reason)) => {
            warn!(path = %path.display(), "Failed to read mode file: {}", reason);
            None
        }
        Err(rejection) => {
            warn!(
                path = %path.display(),
                field = rejection.field(),
                "Rejected mode file: {}",
                rejection
            );
            None
        }
    }
}
