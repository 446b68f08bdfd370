use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::types::{Cost, NodeId};

/// Forwarding table the host keeps for one node. The protocol core writes
/// every committed best route through [`RoutingTable::set_route`];
/// destinations it reports unreachable are dropped rather than stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    entries: BTreeMap<NodeId, RouteEntry>,
}

/// One installed route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub cost: Cost,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write-through endpoint for the protocol core. A finite cost with a
    /// known next hop installs or replaces the entry; anything else removes
    /// it.
    pub fn set_route(&mut self, destination: NodeId, next_hop: Option<NodeId>, cost: Cost) {
        match next_hop {
            Some(next_hop) if cost.is_finite() => {
                self.entries.insert(
                    destination,
                    RouteEntry {
                        destination,
                        next_hop,
                        cost,
                    },
                );
            }
            _ => {
                self.entries.remove(&destination);
            }
        }
    }

    pub fn get_route(&self, destination: NodeId) -> Option<&RouteEntry> {
        self.entries.get(&destination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installed routes in ascending destination order.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:<10} {:<8}", "Destination", "Next Hop", "Cost")?;
        writeln!(f, "{}", "-".repeat(34))?;
        if self.entries.is_empty() {
            writeln!(f, "(no routes installed)")?;
        } else {
            for entry in self.entries.values() {
                writeln!(
                    f,
                    "{:<14} {:<10} {:<8}",
                    entry.destination.to_string(),
                    entry.next_hop.to_string(),
                    entry.cost.to_string()
                )?;
            }
        }
        Ok(())
    }
}
