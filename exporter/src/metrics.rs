//! Gauge vectors exported by the collectors.
//!
//! Each gauge is a presence indicator: a label set is set to 1 when the
//! record was observed in the latest pass and is absent otherwise.

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

pub const PACKAGE_INSTALLED: &str = "package_installed_info";
pub const PORTS_OPEN: &str = "ports_open_info";
pub const PORTS_AUTHORIZED: &str = "ports_authorized_info";

/// Registry plus the three inventory gauges, owned by the collection engine.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    /// labels: name, version
    pub package_installed: GaugeVec,
    /// labels: protocol, port, address, pid, process, interface
    pub ports_open: GaugeVec,
    /// labels: port, protocol, zone
    pub ports_authorized: GaugeVec,
}

impl Metrics {
    /// Create the gauges and register them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create the gauges and register them in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let package_installed = GaugeVec::new(
            Opts::new(PACKAGE_INSTALLED, "Information about installed packages"),
            &["name", "version"],
        )?;
        registry.register(Box::new(package_installed.clone()))?;

        let ports_open = GaugeVec::new(
            Opts::new(PORTS_OPEN, "Information about open ports"),
            &["protocol", "port", "address", "pid", "process", "interface"],
        )?;
        registry.register(Box::new(ports_open.clone()))?;

        let ports_authorized = GaugeVec::new(
            Opts::new(
                PORTS_AUTHORIZED,
                "Information about authorized ports (e.g., firewalld)",
            ),
            &["port", "protocol", "zone"],
        )?;
        registry.register(Box::new(ports_authorized.clone()))?;

        Ok(Self {
            registry,
            package_installed,
            ports_open,
            ports_authorized,
        })
    }

    /// Label sets currently present in the gauge `name`, in gather order.
    #[cfg(test)]
    pub(crate) fn series(&self, name: &str) -> Vec<Vec<(String, String)>> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .map(|metric| {
                metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                    .collect()
            })
            .collect()
    }
}

/// Render gathered families in the Prometheus text exposition format.
pub fn encode_text(families: &[MetricFamily]) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
