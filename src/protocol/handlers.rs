use log::{debug, info};

use super::host::NodeHost;
use super::types::{Cost, DistanceTable, DistanceVector, NodeId, NodeState, RouteInfo};
use crate::algorithms::bellman_ford::run_relaxation;

/// Fresh state for the host's current node: every row starts with the
/// identity entry for its owner and unreachable everywhere else.
pub fn init_state(host: &dyn NodeHost) -> NodeState {
    let nodes = host.node_ids();
    let mut table = DistanceTable::default();
    for &node in nodes {
        table.replace_row(node, DistanceVector::initial(node, nodes));
    }
    NodeState {
        table,
        changed: false,
    }
}

/// Fold a direct-link cost change into the table and re-relax. The fresh
/// measurement overwrites the own-row entry for `neighbor` outright; if the
/// state as a whole differs afterwards, the own row goes out to every
/// finite-cost neighbor.
pub fn notify_link_change(
    state: &mut NodeState,
    host: &mut dyn NodeHost,
    neighbor: NodeId,
    new_cost: Cost,
) {
    let me = host.current_node();
    info!("{}: direct link to {} now costs {}", me, neighbor, new_cost);

    let snapshot = state.clone();

    let direct = RouteInfo {
        cost: new_cost,
        next_hop: Some(neighbor),
    };
    state.table.set(me, neighbor, direct);
    host.set_route(neighbor, Some(neighbor), new_cost);

    run_relaxation(state, host);

    if *state != snapshot {
        send_own_row(state, host);
    }
}

/// Fold a neighbor's advertised row into the table and re-relax. Gated on
/// the `changed` flag, not a snapshot diff: the fold only rewrites the
/// sender's row, so the flag sees every own-row move. Re-delivering a row
/// the table already holds stays silent.
pub fn notify_receive_message(
    state: &mut NodeState,
    host: &mut dyn NodeHost,
    sender: NodeId,
    vector: DistanceVector,
) {
    let me = host.current_node();
    debug!("{}: received distance vector from {}", me, sender);

    state.table.replace_row(sender, vector);
    state.changed = false;

    run_relaxation(state, host);

    if state.changed {
        state.changed = false;
        send_own_row(state, host);
    }
}

/// Push the node's own row to every node reachable over a finite-cost
/// direct link, self excluded.
fn send_own_row(state: &NodeState, host: &mut dyn NodeHost) {
    let me = host.current_node();
    let row = state.table.row(me);
    let nodes = host.node_ids().to_vec();

    for &node in &nodes {
        if node == me || host.link_cost(node).is_infinite() {
            continue;
        }
        debug!("{}: advertising own row to {}", me, node);
        host.send_vector(node, row.clone());
    }
}
