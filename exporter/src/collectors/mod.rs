//! The collection engine and its two collectors.
//!
//! A pass resets every gauge and repopulates it from the host. Passes are
//! serialized by a single mutex that is also taken when the registry is
//! gathered, so a scrape sees either the previous or the new inventory.

pub mod connections;
pub mod firewall;
pub mod packages;
pub mod ports;

use std::collections::HashSet;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use prometheus::proto::MetricFamily;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ExporterConfig;
use crate::error::{CollectError, Result};
use crate::metrics::{self, Metrics};
use firewall::FirewallD;
use packages::{PackageCollector, SystemPackages};
use ports::PortCollector;

struct Sources {
    packages: PackageCollector,
    ports: PortCollector,
}

/// Owns the collectors and the registry their gauges live in.
pub struct Collector {
    metrics: Metrics,
    sources: Mutex<Sources>,
}

impl Collector {
    /// Assemble an engine from collectors whose gauges belong to `metrics`.
    pub fn new(metrics: Metrics, packages: PackageCollector, ports: PortCollector) -> Self {
        Self {
            metrics,
            sources: Mutex::new(Sources { packages, ports }),
        }
    }

    /// Engine backed by the real host: package managers on `PATH`, the
    /// configured connection table and firewalld.
    pub fn from_config(config: &ExporterConfig, exclude: HashSet<String>) -> Result<Self> {
        let metrics = Metrics::new()?;
        let packages = PackageCollector::new(
            Box::new(SystemPackages),
            Arc::new(exclude),
            metrics.package_installed.clone(),
        );
        let ports = PortCollector::new(
            config.connection_source.build(),
            Box::new(FirewallD::default()),
            config.resolve_interfaces,
            metrics.ports_open.clone(),
            metrics.ports_authorized.clone(),
        );
        Ok(Self::new(metrics, packages, ports))
    }

    fn lock(&self) -> MutexGuard<'_, Sources> {
        // A panicking pass leaves gauges that the next reset clears anyway.
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one blocking collection pass: packages, then ports.
    ///
    /// A package failure ends the pass early and is returned. Port failures
    /// are logged by the port collector and never returned.
    pub fn run_pass(&self) -> Result<()> {
        let mut sources = self.lock();
        let started = Instant::now();
        info!("Starting collection pass");

        sources.packages.reset();
        sources.ports.reset();

        match sources.packages.collect() {
            Ok(count) => info!(count, "Installed packages collected"),
            Err(e) => {
                error!("Failed to collect installed packages: {e}");
                return Err(e);
            }
        }
        sources.ports.collect();

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection pass finished"
        );
        Ok(())
    }

    /// Run a pass on the blocking pool and wait for it.
    pub async fn refresh(self: &Arc<Self>) -> Result<()> {
        let collector = Arc::clone(self);
        tokio::task::spawn_blocking(move || collector.run_pass()).await?
    }

    /// Snapshot the registry between passes.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let _sources = self.lock();
        self.metrics.registry.gather()
    }

    /// Snapshot the registry in the Prometheus text format.
    pub fn encode(&self) -> Result<String> {
        Ok(metrics::encode_text(&self.gather())?)
    }

    /// Run a pass every `every` until `cancel` fires.
    ///
    /// The first pass happens one interval after the call. A pass that is
    /// already running when `cancel` fires completes before the task exits;
    /// ticks missed while a pass runs are skipped. A zero interval is
    /// rejected.
    pub fn start(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if every.is_zero() {
            return Err(CollectError::ZeroInterval);
        }
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // completes immediately

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Periodic collection stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            error!("Periodic collection failed: {e}");
                        }
                    }
                }
            }
        }))
    }
}

/// Run `program` to completion and return its stdout.
///
/// Failing to start it and a non-zero exit are both errors.
pub(crate) fn run_command(program: &'static str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| CollectError::Spawn { program, source })?;

    if !output.status.success() {
        return Err(CollectError::Exit {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
