//! Mode record data model and construction-time validation

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

/// Number of auxiliary static sysfs path/value slots
pub const EXTRA_SYSFS_SLOTS: usize = 4;

/// Reason a mode description was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeRejection {
    #[error("cannot load key file: {0}")]
    Unreadable(String),

    #[error("mandatory key [{section}] {key} is missing or empty")]
    MissingField {
        section: &'static str,
        key: &'static str,
    },

    #[error("network is enabled but network_interface is not set")]
    NetworkWithoutInterface,

    #[error("sysfs_path is set but sysfs_value is not")]
    SysfsValueMissing,

    #[error("sysfs_reset_value is set but sysfs_path is not")]
    SysfsResetWithoutPath,
}

impl ModeRejection {
    /// Name of the key that caused the rejection
    pub fn field(&self) -> &'static str {
        match self {
            Self::Unreadable(_) => "<file>",
            Self::MissingField { key, .. } => key,
            Self::NetworkWithoutInterface => "network_interface",
            Self::SysfsValueMissing => "sysfs_value",
            Self::SysfsResetWithoutPath => "sysfs_path",
        }
    }
}

/// One auxiliary sysfs write (`android_extra_sysfs_path*` / `android_extra_sysfs_value*`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraSysfs {
    pub path: Option<String>,
    pub value: Option<String>,
}

/// Raw key values read from a mode file, before validation
///
/// Every key is a typed optional field; absence is `None` (or `false` for
/// flags), never a sentinel value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeFields {
    pub name: Option<String>,
    pub module: Option<String>,
    pub appsync: bool,
    pub mass_storage: bool,
    pub network: bool,
    pub network_interface: Option<String>,
    pub sysfs_path: Option<String>,
    pub sysfs_value: Option<String>,
    pub sysfs_reset_value: Option<String>,
    pub extra_sysfs: [ExtraSysfs; EXTRA_SYSFS_SLOTS],
    pub id_product: Option<String>,
    pub id_vendor_override: Option<String>,
    pub nat: bool,
    pub dhcp_server: bool,
    pub tethering_technology: Option<String>,
}

type InvariantCheck = fn(&ModeFields) -> Result<(), ModeRejection>;

/// Invariants applied in order; the first failure rejects the record.
const INVARIANTS: [(&str, InvariantCheck); 4] = [
    ("identity", check_identity),
    ("network_interface", check_network_interface),
    ("sysfs_value", check_sysfs_value),
    ("sysfs_reset_value", check_sysfs_reset),
];

fn check_identity(fields: &ModeFields) -> Result<(), ModeRejection> {
    if fields.name.as_deref().map_or(true, str::is_empty) {
        return Err(ModeRejection::MissingField {
            section: "mode",
            key: "name",
        });
    }
    if fields.module.as_deref().map_or(true, str::is_empty) {
        return Err(ModeRejection::MissingField {
            section: "mode",
            key: "module",
        });
    }
    Ok(())
}

fn check_network_interface(fields: &ModeFields) -> Result<(), ModeRejection> {
    if fields.network && fields.network_interface.is_none() {
        return Err(ModeRejection::NetworkWithoutInterface);
    }
    Ok(())
}

fn check_sysfs_value(fields: &ModeFields) -> Result<(), ModeRejection> {
    if fields.sysfs_path.is_some() && fields.sysfs_value.is_none() {
        return Err(ModeRejection::SysfsValueMissing);
    }
    Ok(())
}

fn check_sysfs_reset(fields: &ModeFields) -> Result<(), ModeRejection> {
    if fields.sysfs_reset_value.is_some() && fields.sysfs_path.is_none() {
        return Err(ModeRejection::SysfsResetWithoutPath);
    }
    Ok(())
}

impl ModeFields {
    /// Run all invariants in order
    pub fn validate(&self) -> Result<(), ModeRejection> {
        for (name, check) in INVARIANTS {
            check(self)
                .inspect_err(|_| tracing::trace!(invariant = name, "Invariant violated"))?;
        }
        Ok(())
    }
}

/// Network configuration actually applied for a mode
///
/// Empty when the record is built; filled in by the network setup code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCache {
    pub ip: Option<String>,
    pub interface: Option<String>,
    pub gateway: Option<String>,
    pub nat_interface: Option<String>,
    pub netmask: Option<String>,
}

impl NetworkCache {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A validated USB gadget mode definition
///
/// All fields except the network cache are fixed once the record is built.
/// The record owns all of its storage; dropping it releases everything.
#[derive(Debug)]
pub struct ModeRecord {
    source: PathBuf,
    name: String,
    module: String,
    appsync: bool,
    mass_storage: bool,
    network: bool,
    network_interface: Option<String>,
    sysfs_path: Option<String>,
    sysfs_value: Option<String>,
    sysfs_reset_value: Option<String>,
    extra_sysfs: [ExtraSysfs; EXTRA_SYSFS_SLOTS],
    id_product: Option<String>,
    id_vendor_override: Option<String>,
    nat: bool,
    dhcp_server: bool,
    tethering_technology: Option<String>,
    cache: Mutex<NetworkCache>,
}

impl ModeRecord {
    /// Validate raw fields and build a record
    ///
    /// Either every invariant holds and a complete record is returned, or
    /// nothing is built.
    pub fn from_fields(
        source: impl Into<PathBuf>,
        fields: ModeFields,
    ) -> Result<Self, ModeRejection> {
        fields.validate()?;

        let ModeFields {
            name,
            module,
            appsync,
            mass_storage,
            network,
            network_interface,
            sysfs_path,
            sysfs_value,
            sysfs_reset_value,
            extra_sysfs,
            id_product,
            id_vendor_override,
            nat,
            dhcp_server,
            tethering_technology,
        } = fields;

        Ok(Self {
            source: source.into(),
            name: name.unwrap_or_default(),
            module: module.unwrap_or_default(),
            appsync,
            mass_storage,
            network,
            network_interface,
            sysfs_path,
            sysfs_value,
            sysfs_reset_value,
            extra_sysfs,
            id_product,
            id_vendor_override,
            nat,
            dhcp_server,
            tethering_technology,
            cache: Mutex::new(NetworkCache::default()),
        })
    }

    /// File the record was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kernel module (or gadget function set) backing this mode
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn appsync(&self) -> bool {
        self.appsync
    }

    pub fn mass_storage(&self) -> bool {
        self.mass_storage
    }

    pub fn network(&self) -> bool {
        self.network
    }

    pub fn network_interface(&self) -> Option<&str> {
        self.network_interface.as_deref()
    }

    pub fn sysfs_path(&self) -> Option<&str> {
        self.sysfs_path.as_deref()
    }

    pub fn sysfs_value(&self) -> Option<&str> {
        self.sysfs_value.as_deref()
    }

    pub fn sysfs_reset_value(&self) -> Option<&str> {
        self.sysfs_reset_value.as_deref()
    }

    /// Present extra sysfs slots as `(slot, path, value)`, slots numbered 1-4
    pub fn extra_sysfs(&self) -> impl Iterator<Item = (usize, &str, Option<&str>)> {
        self.extra_sysfs
            .iter()
            .enumerate()
            .filter_map(|(i, extra)| {
                extra
                    .path
                    .as_deref()
                    .map(|path| (i + 1, path, extra.value.as_deref()))
            })
    }

    /// USB idProduct override
    pub fn id_product(&self) -> Option<&str> {
        self.id_product.as_deref()
    }

    /// USB idVendor override
    pub fn id_vendor_override(&self) -> Option<&str> {
        self.id_vendor_override.as_deref()
    }

    pub fn nat(&self) -> bool {
        self.nat
    }

    pub fn dhcp_server(&self) -> bool {
        self.dhcp_server
    }

    pub fn tethering_technology(&self) -> Option<&str> {
        self.tethering_technology.as_deref()
    }

    /// Snapshot of the applied network configuration
    pub fn cache(&self) -> NetworkCache {
        self.cache.lock().clone()
    }

    /// Update the applied network configuration in place
    pub fn update_cache<R>(&self, f: impl FnOnce(&mut NetworkCache) -> R) -> R {
        f(&mut self.cache.lock())
    }

    pub fn clear_cache(&self) {
        *self.cache.lock() = NetworkCache::default();
    }
}

impl Clone for ModeRecord {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            name: self.name.clone(),
            module: self.module.clone(),
            appsync: self.appsync,
            mass_storage: self.mass_storage,
            network: self.network,
            network_interface: self.network_interface.clone(),
            sysfs_path: self.sysfs_path.clone(),
            sysfs_value: self.sysfs_value.clone(),
            sysfs_reset_value: self.sysfs_reset_value.clone(),
            extra_sysfs: self.extra_sysfs.clone(),
            id_product: self.id_product.clone(),
            id_vendor_override: self.id_vendor_override.clone(),
            nat: self.nat,
            dhcp_server: self.dhcp_server,
            tethering_technology: self.tethering_technology.clone(),
            cache: Mutex::new(self.cache()),
        }
    }
}
