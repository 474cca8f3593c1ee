//! firewalld queries over the D-Bus system bus.

use zbus::blocking::Connection;

use crate::error::Result;

const DESTINATION: &str = "org.fedoraproject.FirewallD1";
const OBJECT_PATH: &str = "/org/fedoraproject/FirewallD1";
const ZONE_INTERFACE: &str = "org.fedoraproject.FirewallD1.zone";

/// A firewall service reporting authorized ports per zone.
pub trait Firewall: Send {
    fn zones(&mut self) -> Result<Vec<String>>;

    /// Authorized entries of `zone`, each in `port/protocol` form.
    fn ports(&mut self, zone: &str) -> Result<Vec<String>>;
}

/// firewalld reached through blocking `zbus` calls.
///
/// The bus connection is opened lazily and dropped after a zone-list
/// failure so the next pass reconnects.
#[derive(Default)]
pub struct FirewallD {
    bus: Option<Connection>,
}

impl FirewallD {
    fn bus(&mut self) -> Result<&Connection> {
        let bus = match self.bus.take() {
            Some(bus) => bus,
            None => Connection::system()?,
        };
        Ok(self.bus.insert(bus))
    }
}

impl Firewall for FirewallD {
    fn zones(&mut self) -> Result<Vec<String>> {
        let reply = self.bus()?.call_method(
            Some(DESTINATION),
            OBJECT_PATH,
            Some(ZONE_INTERFACE),
            "getZones",
            &(),
        );
        match reply {
            Ok(message) => Ok(message.body().deserialize::<Vec<String>>()?),
            Err(e) => {
                self.bus = None;
                Err(e.into())
            }
        }
    }

    fn ports(&mut self, zone: &str) -> Result<Vec<String>> {
        let message = self.bus()?.call_method(
            Some(DESTINATION),
            OBJECT_PATH,
            Some(ZONE_INTERFACE),
            "getPorts",
            &(zone,),
        )?;
        let entries: Vec<Vec<String>> = message.body().deserialize()?;
        Ok(entries.into_iter().map(|entry| entry.join("/")).collect())
    }
}
