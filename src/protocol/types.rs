use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Link or path cost. `INFINITY` marks an unreachable destination and is
/// absorbing under addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost(u32);

impl Cost {
    pub const ZERO: Cost = Cost(0);
    pub const INFINITY: Cost = Cost(u32::MAX);

    pub const fn new(value: u32) -> Cost {
        Cost(value)
    }

    pub fn is_finite(self) -> bool {
        self != Cost::INFINITY
    }

    pub fn is_infinite(self) -> bool {
        self == Cost::INFINITY
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        // Saturates at the sentinel, so inf + x == inf and finite overflow
        // cannot wrap past it.
        Cost(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for Cost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_infinite() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_u32(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Cost {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CostVisitor;

        impl<'de> Visitor<'de> for CostVisitor {
            type Value = Cost;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a link cost or \"inf\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Cost, E> {
                if value >= u32::MAX as u64 {
                    Err(E::custom("cost out of range, use \"inf\" for unreachable"))
                } else {
                    Ok(Cost(value as u32))
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Cost, E> {
                if value < 0 {
                    Err(E::custom("cost cannot be negative"))
                } else {
                    self.visit_u64(value as u64)
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Cost, E> {
                if value == "inf" {
                    Ok(Cost::INFINITY)
                } else {
                    Err(E::custom(format!("unknown cost value \"{}\"", value)))
                }
            }
        }

        deserializer.deserialize_any(CostVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfo {
    pub cost: Cost,
    pub next_hop: Option<NodeId>,
}

impl Default for RouteInfo {
    fn default() -> Self {
        RouteInfo {
            cost: Cost::INFINITY,
            next_hop: None,
        }
    }
}

impl fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.next_hop {
            Some(hop) => write!(f, "{} via {}", self.cost, hop),
            None => write!(f, "unreachable"),
        }
    }
}

/// One node's full row: best known cost and next hop towards every node.
/// This is also the unit exchanged between neighbors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceVector {
    entries: BTreeMap<NodeId, RouteInfo>,
}

impl DistanceVector {
    /// Fresh row for `owner`: zero cost to itself, everything else unreachable.
    pub fn initial(owner: NodeId, nodes: &[NodeId]) -> DistanceVector {
        let mut entries = BTreeMap::new();
        for &node in nodes {
            let info = if node == owner {
                RouteInfo {
                    cost: Cost::ZERO,
                    next_hop: Some(owner),
                }
            } else {
                RouteInfo::default()
            };
            entries.insert(node, info);
        }
        DistanceVector { entries }
    }

    pub fn get(&self, destination: NodeId) -> RouteInfo {
        self.entries
            .get(&destination)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, destination: NodeId, info: RouteInfo) {
        self.entries.insert(destination, info);
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, RouteInfo)> + '_ {
        self.entries.iter().map(|(&node, &info)| (node, info))
    }
}

/// Everything a node knows: its own row plus the last row heard from each
/// other node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceTable {
    rows: BTreeMap<NodeId, DistanceVector>,
}

impl DistanceTable {
    pub fn route(&self, via: NodeId, destination: NodeId) -> RouteInfo {
        self.rows
            .get(&via)
            .map(|row| row.get(destination))
            .unwrap_or_default()
    }

    pub fn set(&mut self, owner: NodeId, destination: NodeId, info: RouteInfo) {
        self.rows.entry(owner).or_default().set(destination, info);
    }

    pub fn row(&self, node: NodeId) -> DistanceVector {
        self.rows.get(&node).cloned().unwrap_or_default()
    }

    pub fn replace_row(&mut self, node: NodeId, row: DistanceVector) {
        self.rows.insert(node, row);
    }
}

/// Per-node protocol state. `changed` is set by the relaxation pass whenever
/// it commits a new best route and drives dissemination after a received
/// vector. Equality covers the flag as well, so diffing a state against a
/// snapshot compares everything the handlers mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub table: DistanceTable,
    pub changed: bool,
}
