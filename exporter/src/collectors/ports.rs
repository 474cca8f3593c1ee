use prometheus::GaugeVec;
use tracing::{debug, error, warn};

use super::connections::ConnectionTable;
use super::firewall::Firewall;
use crate::error::Result;
use crate::parse::{interface_for_address, protocol_label, split_port_protocol};

/// Publishes `ports_open_info` from the connection table and
/// `ports_authorized_info` from the firewall.
pub struct PortCollector {
    table: Box<dyn ConnectionTable>,
    firewall: Box<dyn Firewall>,
    resolve_interfaces: bool,
    open: GaugeVec,
    authorized: GaugeVec,
}

impl PortCollector {
    pub fn new(
        table: Box<dyn ConnectionTable>,
        firewall: Box<dyn Firewall>,
        resolve_interfaces: bool,
        open: GaugeVec,
        authorized: GaugeVec,
    ) -> Self {
        Self {
            table,
            firewall,
            resolve_interfaces,
            open,
            authorized,
        }
    }

    pub fn reset(&self) {
        self.open.reset();
        self.authorized.reset();
    }

    /// Collect open then authorized ports. A failing side is logged and
    /// leaves its gauge empty; it never stops the other side.
    pub fn collect(&mut self) {
        if let Err(e) = self.collect_open() {
            error!("Failed to collect open ports: {e}");
        }
        if let Err(e) = self.collect_authorized() {
            error!("Failed to collect authorized ports: {e}");
        }
    }

    fn collect_open(&mut self) -> Result<()> {
        let connections = self.table.connections()?;

        for conn in &connections {
            let process = self.table.process_name(conn.pid);
            let interface = if self.resolve_interfaces {
                interface_for_address(&conn.address)
            } else {
                String::new()
            };
            self.open
                .with_label_values(&[
                    protocol_label(conn.socket_type),
                    &conn.port.to_string(),
                    &conn.address,
                    &conn.pid.to_string(),
                    &process,
                    &interface,
                ])
                .set(1.0);
        }

        debug!(count = connections.len(), "Open ports collected");
        Ok(())
    }

    fn collect_authorized(&mut self) -> Result<()> {
        let zones = self.firewall.zones()?;

        for zone in &zones {
            let entries = match self.firewall.ports(zone) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(zone = %zone, "Failed to list ports for zone: {e}");
                    continue;
                }
            };

            for entry in &entries {
                let Some((port, protocol)) = split_port_protocol(entry) else {
                    warn!(zone = %zone, entry = %entry, "Invalid port format");
                    continue;
                };
                self.authorized
                    .with_label_values(&[port, protocol, zone])
                    .set(1.0);
            }
        }

        debug!(zones = zones.len(), "Authorized ports collected");
        Ok(())
    }
}
