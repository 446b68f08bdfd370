use super::types::{Cost, DistanceVector, NodeId};

/// Environment a node runs in. The simulator implements this for real runs
/// and tests implement it with a recording stub.
///
/// Implementations must report `Cost::ZERO` for the node's own link: the
/// relaxation pass resolves the self destination through that link, and its
/// zero-cost guard is what keeps the self entry pinned.
pub trait NodeHost {
    /// All node ids, in ascending order. Candidate and destination
    /// enumeration follows this order, which makes tie-breaking
    /// deterministic.
    fn node_ids(&self) -> &[NodeId];

    fn current_node(&self) -> NodeId;

    /// Current cost of the direct link to `node`, `Cost::INFINITY` when
    /// there is none.
    fn link_cost(&self, node: NodeId) -> Cost;

    /// Write-through of a committed best route to the forwarding plane.
    fn set_route(&mut self, destination: NodeId, next_hop: Option<NodeId>, cost: Cost);

    /// Queue the node's own row for delivery to a neighbor. Delivery is
    /// asynchronous and never fails from the caller's point of view.
    fn send_vector(&mut self, destination: NodeId, vector: DistanceVector);
}
