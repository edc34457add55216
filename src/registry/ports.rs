//! Port scanning for generated services
//!
//! A port counts as free when it is outside the exclusion set and a loopback
//! listener can be bound on it. The probe only says "probably free": another
//! process may take the port between the probe and its use. Callers reserve
//! the result in the registry immediately.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use tracing::warn;

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// Bind a loopback listener on `port`, returning it while it is held.
pub fn probe_port(port: u16) -> Option<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).ok()
}

pub fn is_port_free(port: u16) -> bool {
    probe_port(port).is_some()
}

/// First port in `range` that is not excluded and passes the bind probe.
///
/// Falls back to `range.start` when nothing qualifies, even if that port is
/// excluded or taken.
pub fn find_available_port(range: PortRange, excluded: &HashSet<u16>) -> u16 {
    claim_available_port(range, excluded).0
}

/// Like [`find_available_port`] but keeps the probe listener open so the
/// caller can record the port before anyone else can bind it.
pub(crate) fn claim_available_port(
    range: PortRange,
    excluded: &HashSet<u16>,
) -> (u16, Option<TcpListener>) {
    for port in range.iter().filter(|p| !excluded.contains(p)) {
        if let Some(listener) = probe_port(port) {
            return (port, Some(listener));
        }
    }

    warn!(
        start = range.start,
        end = range.end,
        "No free port in range, falling back to range start"
    );
    (range.start, None)
}
