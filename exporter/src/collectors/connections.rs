//! Live socket enumeration for the open-ports gauge.
//!
//! Two backends: `/proc/net/*` through `procfs` (the default) and the output
//! of `ss -tunap`. Process names are resolved with `sysinfo` in both cases.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;

use serde::Deserialize;
use sysinfo::{Pid, System};
use tracing::debug;

use super::run_command;
use crate::error::{CollectError, Result};
use crate::parse::{split_address_port, split_pid_process, SOCK_DGRAM, SOCK_STREAM};

/// One socket seen in the connection table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub socket_type: u32,
    pub address: String,
    pub port: u16,
    /// Owning process, 0 when unknown (kernel sockets, other users' sockets).
    pub pid: u32,
}

/// Source of live TCP/UDP sockets and of process names.
pub trait ConnectionTable: Send {
    fn connections(&mut self) -> Result<Vec<Connection>>;

    /// Name of process `pid`, empty when it cannot be resolved.
    fn process_name(&mut self, pid: u32) -> String;
}

/// Which [`ConnectionTable`] implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionSource {
    #[default]
    Procfs,
    Ss,
}

impl ConnectionSource {
    pub fn build(self) -> Box<dyn ConnectionTable> {
        Box::new(SystemTable::new(self))
    }
}

/// PID to process-name resolution backed by `sysinfo`.
pub struct ProcessNames {
    system: System,
}

impl Default for ProcessNames {
    fn default() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl ProcessNames {
    pub fn lookup(&mut self, pid: u32) -> String {
        if pid == 0 {
            return String::new();
        }
        let pid = Pid::from_u32(pid);
        if !self.system.refresh_process(pid) {
            return String::new();
        }
        self.system
            .process(pid)
            .map(|process| process.name().to_string())
            .unwrap_or_default()
    }
}

/// The host's connection table, read from `source`.
pub struct SystemTable {
    source: ConnectionSource,
    names: ProcessNames,
}

impl SystemTable {
    pub fn new(source: ConnectionSource) -> Self {
        Self {
            source,
            names: ProcessNames::default(),
        }
    }
}

impl ConnectionTable for SystemTable {
    fn connections(&mut self) -> Result<Vec<Connection>> {
        match self.source {
            ConnectionSource::Procfs => read_proc_net(),
            ConnectionSource::Ss => Ok(parse_ss(&run_command("ss", &["-tunap"])?)),
        }
    }

    fn process_name(&mut self, pid: u32) -> String {
        self.names.lookup(pid)
    }
}

/// Read `/proc/net/{tcp,tcp6,udp,udp6}` and map socket inodes to PIDs.
fn read_proc_net() -> Result<Vec<Connection>> {
    let owners = socket_owners();
    let mut out = Vec::new();

    let tcp = procfs::net::tcp().map_err(|e| CollectError::Connections(e.to_string()))?;
    push_entries(&mut out, &owners, SOCK_STREAM, tcp.iter().map(|e| (e.local_address, e.inode)));

    let udp = procfs::net::udp().map_err(|e| CollectError::Connections(e.to_string()))?;
    push_entries(&mut out, &owners, SOCK_DGRAM, udp.iter().map(|e| (e.local_address, e.inode)));

    // The v6 tables are missing when IPv6 is disabled.
    match procfs::net::tcp6() {
        Ok(tcp6) => push_entries(
            &mut out,
            &owners,
            SOCK_STREAM,
            tcp6.iter().map(|e| (e.local_address, e.inode)),
        ),
        Err(e) => debug!("/proc/net/tcp6 not available: {e}"),
    }
    match procfs::net::udp6() {
        Ok(udp6) => push_entries(
            &mut out,
            &owners,
            SOCK_DGRAM,
            udp6.iter().map(|e| (e.local_address, e.inode)),
        ),
        Err(e) => debug!("/proc/net/udp6 not available: {e}"),
    }

    Ok(out)
}

fn push_entries(
    out: &mut Vec<Connection>,
    owners: &HashMap<u64, u32>,
    socket_type: u32,
    entries: impl Iterator<Item = (SocketAddr, u64)>,
) {
    out.extend(entries.map(|(local, inode)| Connection {
        socket_type,
        address: local.ip().to_string(),
        port: local.port(),
        pid: owners.get(&inode).copied().unwrap_or(0),
    }));
}

/// Socket inode to owning PID, for every process whose fds we can read.
fn socket_owners() -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    let processes = match procfs::process::all_processes() {
        Ok(processes) => processes,
        Err(e) => {
            debug!("Cannot list processes: {e}");
            return owners;
        }
    };

    for process in processes.flatten() {
        let Ok(fds) = process.fd() else {
            continue;
        };
        for fd in fds.flatten() {
            if let procfs::process::FDTarget::Socket(inode) = fd.target {
                owners.entry(inode).or_insert(process.pid as u32);
            }
        }
    }
    owners
}

/// Decode `ss -tunap` output.
///
/// ```text
/// Netid State  Recv-Q Send-Q Local Address:Port Peer Address:Port Process
/// tcp   LISTEN 0      128          0.0.0.0:22        0.0.0.0:*     users:(("sshd",pid=812,fd=3))
/// ```
///
/// Interface zones (`127.0.0.53%lo:53`, `[fe80::1]%eth0:546`) are dropped
/// from the local address. Rows whose local address still does not split
/// into address and numeric port are skipped.
pub fn parse_ss(output: &str) -> Vec<Connection> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 || fields[0] == "Netid" {
                return None;
            }
            let socket_type = match fields[0] {
                "tcp" => SOCK_STREAM,
                "udp" => SOCK_DGRAM,
                _ => 0,
            };
            let local = strip_zone(fields[4]);
            let (address, port) = split_address_port(&local);
            let port = port.parse::<u16>().ok()?;
            let (pid, _) = split_pid_process(fields.get(6).copied().unwrap_or("-"));
            Some(Connection {
                socket_type,
                address: address.to_string(),
                port,
                pid: pid.parse().unwrap_or(0),
            })
        })
        .collect()
}

/// Remove a `%zone` suffix from the address part of `addr:port`, whether
/// it sits inside or after the IPv6 brackets.
fn strip_zone(local: &str) -> Cow<'_, str> {
    let Some(percent) = local.find('%') else {
        return Cow::Borrowed(local);
    };
    match local[percent..].find([']', ':']) {
        Some(end) => Cow::Owned(format!("{}{}", &local[..percent], &local[percent + end..])),
        None => Cow::Borrowed(&local[..percent]),
    }
}
