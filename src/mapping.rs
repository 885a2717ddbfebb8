//! Mapping of local media roots to remote path suffixes

use rclonekit::Remote;
use std::path::{Path, PathBuf};

use crate::paths;

/// One local root and where its folders go on every drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Absolute local directory whose immediate subfolders are uploaded
    pub local_root: PathBuf,
    /// Remote path (without drive) that replaces `local_root`
    pub remote_suffix: String,
}

impl MappingRule {
    pub fn new(local_root: impl Into<PathBuf>, remote_suffix: impl Into<String>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_suffix: remote_suffix.into(),
        }
    }

    /// Whether `path` lies under this rule's root
    pub fn matches(&self, path: &Path) -> bool {
        paths::is_within(path, &self.local_root)
    }

    /// Replace `local_root` in `path` with `drive:remote_suffix`.
    ///
    /// Returns `None` if `path` is not under this rule's root.
    pub fn destination_for(&self, path: &Path, drive: &str) -> Option<Remote> {
        let rel = path.strip_prefix(&self.local_root).ok()?;
        let suffix = self.remote_suffix.trim_end_matches('/');

        let mut remote_path = suffix.to_string();
        for component in rel.components() {
            remote_path.push('/');
            remote_path.push_str(component.as_os_str().to_str()?);
        }
        if remote_path.is_empty() {
            remote_path.push('/');
        }

        Some(Remote::new(drive, remote_path))
    }
}

/// Ordered, non-overlapping set of mapping rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    /// Build a table. Callers validate overlap beforehand (see `config`).
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// The rule whose root contains `path`
    pub fn resolve(&self, path: &Path) -> Option<&MappingRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    /// Remote location of `path` on `drive`, if any rule covers it
    pub fn destination_for(&self, path: &Path, drive: &str) -> Option<Remote> {
        self.resolve(path)?.destination_for(path, drive)
    }

    /// First pair of rules where one root contains the other
    pub fn find_overlap(&self) -> Option<(&MappingRule, &MappingRule)> {
        self.rules.iter().enumerate().find_map(|(i, a)| {
            self.rules[i + 1..]
                .iter()
                .find(|b| a.matches(&b.local_root) || b.matches(&a.local_root))
                .map(|b| (a, b))
        })
    }
}

/// Split `paula:/shows/anime` into the suffix `/shows/anime`.
///
/// Remote values in older configs carry a drive name; the drive now comes
/// from the drive list, so only the path part is kept.
pub fn strip_drive_prefix(remote: &str) -> &str {
    match remote.split_once(':') {
        Some((drive, rest)) if !drive.is_empty() && !drive.contains('/') => rest,
        _ => remote,
    }
}
