use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use prometheus::GaugeVec;
use tracing::{debug, warn};

use super::run_command;
use crate::error::Result;

/// Supported package managers, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Rpm,
    Dpkg,
}

impl PackageManager {
    /// Probe order: the first manager found on the host wins.
    pub const ALL: [PackageManager; 2] = [PackageManager::Rpm, PackageManager::Dpkg];

    pub fn program(self) -> &'static str {
        match self {
            PackageManager::Rpm => "rpm",
            PackageManager::Dpkg => "dpkg-query",
        }
    }

    /// Arguments making the tool print one `name|version` line per package.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            PackageManager::Rpm => &["-qa", "--queryformat", "%{NAME}|%{VERSION}\n"],
            PackageManager::Dpkg => &["-W", "-f=${Package}|${Version}\n"],
        }
    }
}

/// Host interaction needed by the package collector.
pub trait PackageSource: Send {
    /// The package manager available on this host, if any.
    fn detect(&self) -> Option<PackageManager>;

    /// Raw `name|version` listing produced by `manager`.
    fn query(&self, manager: PackageManager) -> Result<String>;
}

/// Finds package managers on `PATH` and runs them as subprocesses.
#[derive(Debug, Default)]
pub struct SystemPackages;

impl PackageSource for SystemPackages {
    fn detect(&self) -> Option<PackageManager> {
        PackageManager::ALL
            .into_iter()
            .find(|manager| on_path(manager.program()))
    }

    fn query(&self, manager: PackageManager) -> Result<String> {
        run_command(manager.program(), manager.args())
    }
}

/// Whether an executable named `program` exists in one of the `PATH` entries.
fn on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program)))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Iterate over the well-formed `name|version` records of a listing.
///
/// Lines without exactly two fields, blank ones included, are dropped.
pub fn parse_inventory(listing: &str) -> impl Iterator<Item = (&str, &str)> {
    listing.lines().filter_map(|line| {
        let parts: Vec<&str> = line.split('|').collect();
        match parts[..] {
            [name, version] => Some((name, version)),
            _ => None,
        }
    })
}

/// Publishes installed packages as `package_installed_info{name, version}`.
pub struct PackageCollector {
    source: Box<dyn PackageSource>,
    exclude: Arc<HashSet<String>>,
    gauge: GaugeVec,
}

impl PackageCollector {
    pub fn new(
        source: Box<dyn PackageSource>,
        exclude: Arc<HashSet<String>>,
        gauge: GaugeVec,
    ) -> Self {
        Self {
            source,
            exclude,
            gauge,
        }
    }

    pub fn reset(&self) {
        self.gauge.reset();
    }

    /// Populate the gauge from the detected package manager.
    ///
    /// Returns the number of packages published. No package manager on the
    /// host is not an error.
    pub fn collect(&self) -> Result<usize> {
        let Some(manager) = self.source.detect() else {
            warn!("Neither rpm nor dpkg-query is available on this host");
            return Ok(0);
        };

        let listing = self.source.query(manager)?;
        let mut published = 0;
        for (name, version) in parse_inventory(&listing) {
            if self.exclude.contains(name) {
                continue;
            }
            self.gauge.with_label_values(&[name, version]).set(1.0);
            published += 1;
        }

        debug!(manager = manager.program(), published, "Packages collected");
        Ok(published)
    }
}
