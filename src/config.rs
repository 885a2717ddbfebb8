use anyhow::{Context, Result, bail};
use rclonekit::RcloneOptions;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mapping::{MappingRule, MappingTable, strip_drive_prefix};
use crate::paths;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// GiB of daily upload quota granted per drive when none is configured
pub const DEFAULT_GB_PER_DRIVE: f64 = 1024.0;

// ============================================================================
// On-disk Schema
// ============================================================================

/// The config file as written by the user (TOML or JSON)
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    /// Local root -> remote suffix, in declaration order
    pub mapping_rules: RuleList,

    /// rclone remotes, most preferred first
    pub rclone_drives: Vec<String>,

    /// Daily budget in GiB. 0 or absent means 1024 GiB per drive.
    #[serde(default)]
    pub upload_size_gb: Option<f64>,

    /// Days an upload waits before its local copy may be deleted
    #[serde(default = "default_cleanup_offset_days")]
    pub cleanup_offset_days: u32,

    /// Where the pending-cleanup ledger lives
    #[serde(default)]
    pub ledger_path: Option<String>,

    /// Give up waiting for the ledger lock after this many seconds
    #[serde(default)]
    pub lock_timeout_secs: Option<u64>,

    /// rclone invocation settings
    #[serde(default)]
    pub rclone: RcloneSection,
}

fn default_cleanup_offset_days() -> u32 {
    7
}

/// `[rclone]` table
#[derive(Debug, Deserialize)]
pub struct RcloneSection {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "rclonekit::default_copy_flags")]
    pub copy_flags: Vec<String>,
    #[serde(default)]
    pub check_flags: Vec<String>,
}

fn default_binary() -> String {
    "rclone".to_string()
}

impl Default for RcloneSection {
    fn default() -> Self {
        let options = RcloneOptions::default();
        Self {
            binary: options.binary,
            copy_flags: options.copy_flags,
            check_flags: options.check_flags,
        }
    }
}

/// Key/value pairs of a map, kept in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleList(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for RuleList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RuleListVisitor;

        impl<'de> Visitor<'de> for RuleListVisitor {
            type Value = RuleList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of local root -> remote path")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut rules = Vec::new();
                while let Some((local, remote)) = map.next_entry::<String, String>()? {
                    rules.push((local, remote));
                }
                Ok(RuleList(rules))
            }
        }

        deserializer.deserialize_map(RuleListVisitor)
    }
}

// ============================================================================
// Resolved Config
// ============================================================================

/// Validated configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub mapping: MappingTable,
    pub drives: Vec<String>,
    pub daily_budget_bytes: u64,
    pub cleanup_grace: Duration,
    pub ledger_path: PathBuf,
    pub lock_timeout: Option<Duration>,
    pub rclone: RcloneOptions,
}

impl Config {
    /// Load from an explicit path or the default location
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => paths::default_config_file()?,
        };
        let file = ConfigFile::read(&path)?;
        Self::from_file(file).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Validate and resolve a parsed config file
    pub fn from_file(file: ConfigFile) -> Result<Self> {
        let ledger_path = match file.ledger_path.as_deref() {
            Some(p) => paths::expand(p),
            None => paths::default_ledger_file()?,
        };
        Self::resolve(file, ledger_path)
    }

    fn resolve(file: ConfigFile, ledger_path: PathBuf) -> Result<Self> {
        if file.mapping_rules.0.is_empty() {
            bail!("mapping_rules must contain at least one entry");
        }
        if file.rclone_drives.is_empty() {
            bail!("rclone_drives must contain at least one drive");
        }

        let mut drives = Vec::with_capacity(file.rclone_drives.len());
        for drive in &file.rclone_drives {
            let drive = drive.trim().trim_end_matches(':');
            if drive.is_empty() {
                bail!("rclone_drives contains an empty drive name");
            }
            drives.push(drive.to_string());
        }

        let mut rules = Vec::with_capacity(file.mapping_rules.0.len());
        for (local, remote) in &file.mapping_rules.0 {
            let local_root = paths::expand(local);
            if !local_root.is_absolute() {
                bail!("mapping root must be an absolute path: {}", local);
            }
            let suffix = strip_drive_prefix(remote);
            if suffix != remote {
                log::debug!("Ignoring drive name in remote '{}'", remote);
            }
            rules.push(MappingRule::new(local_root, suffix));
        }
        let mapping = MappingTable::new(rules);
        if let Some((a, b)) = mapping.find_overlap() {
            bail!(
                "mapping roots overlap: {} and {}",
                a.local_root.display(),
                b.local_root.display()
            );
        }

        let daily_budget_bytes = budget_bytes(file.upload_size_gb, drives.len())?;

        if !ledger_path.is_absolute() {
            bail!("ledger_path must be absolute: {}", ledger_path.display());
        }

        Ok(Self {
            mapping,
            drives,
            daily_budget_bytes,
            cleanup_grace: Duration::from_secs(u64::from(file.cleanup_offset_days) * 24 * 60 * 60),
            ledger_path,
            lock_timeout: file.lock_timeout_secs.map(Duration::from_secs),
            rclone: RcloneOptions {
                binary: file.rclone.binary,
                copy_flags: file.rclone.copy_flags,
                check_flags: file.rclone.check_flags,
            },
        })
    }

    /// Ledger handle configured with this run's lock policy
    pub fn ledger(&self) -> ledger::Ledger {
        let options = ledger::LockOptions::default().with_timeout(self.lock_timeout);
        ledger::Ledger::open(&self.ledger_path).with_lock_options(options)
    }

    /// The drive the sweeper verifies against
    pub fn primary_drive(&self) -> &str {
        &self.drives[0]
    }
}

/// Budget in bytes; unset or zero means 1024 GiB per drive
fn budget_bytes(upload_size_gb: Option<f64>, drive_count: usize) -> Result<u64> {
    let gb = match upload_size_gb {
        Some(gb) if !gb.is_finite() || gb < 0.0 => {
            bail!("upload_size_gb must be a non-negative number, got {}", gb)
        }
        Some(gb) if gb > 0.0 => gb,
        _ => drive_count as f64 * DEFAULT_GB_PER_DRIVE,
    };
    Ok((gb * GIB) as u64)
}

impl ConfigFile {
    /// Read a TOML config, or JSON if the file name ends in `.json`
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in config file: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
