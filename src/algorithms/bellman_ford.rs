use log::debug;

use crate::protocol::host::NodeHost;
use crate::protocol::types::{Cost, NodeState, RouteInfo};

/// One relaxation pass over the node's own row: for every destination keep
/// the cheapest finite-linked neighbor path, ties to the lowest id. Commits
/// update the row, set `state.changed`, and write through to the host.
/// Re-running without new information commits nothing.
pub fn run_relaxation(state: &mut NodeState, host: &mut dyn NodeHost) {
    let me = host.current_node();
    let nodes = host.node_ids().to_vec();

    for &destination in &nodes {
        let mut best = RouteInfo::default();

        for &via in &nodes {
            let link = host.link_cost(via);
            if link.is_infinite() {
                continue;
            }
            // The own row is not an advertisement: for any destination but
            // ourselves it holds whatever this pass is in the middle of
            // computing, not a price a packet could actually be sent at.
            if via == me && destination != me {
                continue;
            }

            let candidate = link + state.table.route(via, destination).cost;
            if candidate < best.cost {
                best = RouteInfo {
                    cost: candidate,
                    next_hop: Some(via),
                };
            }
        }

        // A zero-cost winner can only tie the identity entry; committing it
        // could swap the self route onto a zero-cost link.
        let current = state.table.route(me, destination);
        if best != current && best.cost != Cost::ZERO {
            debug!("{}: route to {} is now {}", me, destination, best);
            state.table.set(me, destination, best);
            state.changed = true;
            host.set_route(destination, best.next_hop, best.cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handlers::init_state;
    use crate::protocol::host::testing::TestHost;
    use crate::protocol::types::{DistanceVector, NodeId};

    fn advertised_row(owner: u32, nodes: u32, entries: &[(u32, u32)]) -> DistanceVector {
        let ids: Vec<NodeId> = (0..nodes).map(NodeId).collect();
        let mut row = DistanceVector::initial(NodeId(owner), &ids);
        for &(destination, cost) in entries {
            row.set(
                NodeId(destination),
                RouteInfo {
                    cost: Cost::new(cost),
                    next_hop: Some(NodeId(destination)),
                },
            );
        }
        row
    }

    #[test]
    fn picks_cheapest_neighbor_path() {
        let mut host = TestHost::new(3, 0);
        host.set_link(NodeId(1), Cost::new(1));
        host.set_link(NodeId(2), Cost::new(5));

        let mut state = init_state(&host);
        state.table.replace_row(NodeId(1), advertised_row(1, 3, &[(2, 1)]));
        state.table.replace_row(NodeId(2), advertised_row(2, 3, &[]));

        run_relaxation(&mut state, &mut host);

        let route = state.table.route(NodeId(0), NodeId(2));
        assert_eq!(route.cost, Cost::new(2));
        assert_eq!(route.next_hop, Some(NodeId(1)));
        assert!(state.changed);
        assert!(host
            .routes
            .contains(&(NodeId(2), Some(NodeId(1)), Cost::new(2))));
    }

    #[test]
    fn second_pass_commits_nothing() {
        let mut host = TestHost::new(3, 0);
        host.set_link(NodeId(1), Cost::new(1));
        host.set_link(NodeId(2), Cost::new(5));

        let mut state = init_state(&host);
        state.table.replace_row(NodeId(1), advertised_row(1, 3, &[(2, 1)]));

        run_relaxation(&mut state, &mut host);
        let settled = state.table.clone();

        host.clear_recordings();
        state.changed = false;
        run_relaxation(&mut state, &mut host);

        assert!(!state.changed);
        assert!(host.routes.is_empty());
        assert_eq!(state.table, settled);
    }

    #[test]
    fn tie_goes_to_lower_id_neighbor() {
        let mut host = TestHost::new(4, 0);
        host.set_link(NodeId(1), Cost::new(1));
        host.set_link(NodeId(2), Cost::new(1));

        let mut state = init_state(&host);
        state.table.replace_row(NodeId(1), advertised_row(1, 4, &[(3, 1)]));
        state.table.replace_row(NodeId(2), advertised_row(2, 4, &[(3, 1)]));

        run_relaxation(&mut state, &mut host);

        let route = state.table.route(NodeId(0), NodeId(3));
        assert_eq!(route.cost, Cost::new(2));
        assert_eq!(route.next_hop, Some(NodeId(1)));

        // Relaxing again must not flip the tie to the other neighbor.
        state.changed = false;
        run_relaxation(&mut state, &mut host);
        assert!(!state.changed);
        assert_eq!(
            state.table.route(NodeId(0), NodeId(3)).next_hop,
            Some(NodeId(1))
        );
    }

    #[test]
    fn huge_advertised_distance_saturates_instead_of_wrapping() {
        let mut host = TestHost::new(3, 0);
        host.set_link(NodeId(1), Cost::new(5));

        let mut state = init_state(&host);
        state.table.replace_row(
            NodeId(1),
            advertised_row(1, 3, &[(2, u32::MAX - 2)]),
        );

        run_relaxation(&mut state, &mut host);

        // 5 + (MAX - 2) saturates to infinity, which is no better than the
        // unreachable default, so nothing may be committed.
        let route = state.table.route(NodeId(0), NodeId(2));
        assert!(route.cost.is_infinite());
        assert_eq!(route.next_hop, None);
    }

    #[test]
    fn zero_cost_candidate_never_displaces_the_self_entry() {
        let mut host = TestHost::new(3, 2);
        host.set_link(NodeId(0), Cost::ZERO);

        let mut state = init_state(&host);
        // An adversarial advertisement claiming to reach us for free.
        state.table.replace_row(NodeId(0), advertised_row(0, 3, &[(2, 0)]));

        run_relaxation(&mut state, &mut host);

        let own = state.table.route(NodeId(2), NodeId(2));
        assert_eq!(own.cost, Cost::ZERO);
        assert_eq!(own.next_hop, Some(NodeId(2)));
    }

    #[test]
    fn losing_every_neighbor_resets_entries_to_unreachable() {
        let mut host = TestHost::new(3, 0);
        host.set_link(NodeId(1), Cost::new(1));

        let mut state = init_state(&host);
        state.table.replace_row(NodeId(1), advertised_row(1, 3, &[(2, 1)]));
        run_relaxation(&mut state, &mut host);
        assert_eq!(state.table.route(NodeId(0), NodeId(2)).cost, Cost::new(2));

        host.set_link(NodeId(1), Cost::INFINITY);
        state.changed = false;
        run_relaxation(&mut state, &mut host);

        assert!(state.changed);
        let route = state.table.route(NodeId(0), NodeId(2));
        assert!(route.cost.is_infinite());
        assert_eq!(route.next_hop, None);
        // The identity entry survives even with no links left.
        assert_eq!(state.table.route(NodeId(0), NodeId(0)).cost, Cost::ZERO);
    }
}
