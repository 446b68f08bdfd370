use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use super::topology::Topology;
use crate::protocol::handlers;
use crate::protocol::host::NodeHost;
use crate::protocol::routing_table::RoutingTable;
use crate::protocol::types::{Cost, DistanceVector, NodeId, NodeState};

/// Events delivered to a node task's inbox.
#[derive(Debug)]
pub enum NodeEvent {
    /// The direct link to `neighbor` changed cost; `Cost::INFINITY` takes
    /// it down.
    LinkChange { neighbor: NodeId, cost: Cost },
    /// A row advertised by another node.
    Vector { from: NodeId, vector: DistanceVector },
    /// Reply with a copy of the node's current view.
    Snapshot { reply: oneshot::Sender<NodeReport> },
    /// Stop the task; its final report comes back through the join handle.
    Shutdown,
}

/// One node's protocol state and installed routes, as captured by a
/// snapshot or collected at shutdown.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub node: NodeId,
    pub state: NodeState,
    pub routes: RoutingTable,
}

/// Protocol work that is queued or still inside a handler. Zero means the
/// network is quiescent.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn is_idle(&self) -> bool {
        self.count.load(Ordering::SeqCst) == 0
    }
}

/// Host handed to each node task: its own link map, its forwarding table,
/// and a sender for every peer's inbox.
struct SimulatedHost {
    me: NodeId,
    nodes: Vec<NodeId>,
    links: BTreeMap<NodeId, Cost>,
    routes: RoutingTable,
    peers: BTreeMap<NodeId, UnboundedSender<NodeEvent>>,
    in_flight: Arc<InFlight>,
}

impl SimulatedHost {
    fn apply_link(&mut self, neighbor: NodeId, cost: Cost) {
        if cost.is_infinite() {
            self.links.remove(&neighbor);
        } else {
            self.links.insert(neighbor, cost);
        }
    }
}

impl NodeHost for SimulatedHost {
    fn node_ids(&self) -> &[NodeId] {
        &self.nodes
    }

    fn current_node(&self) -> NodeId {
        self.me
    }

    fn link_cost(&self, node: NodeId) -> Cost {
        if node == self.me {
            return Cost::ZERO;
        }
        self.links.get(&node).copied().unwrap_or(Cost::INFINITY)
    }

    fn set_route(&mut self, destination: NodeId, next_hop: Option<NodeId>, cost: Cost) {
        self.routes.set_route(destination, next_hop, cost);
    }

    fn send_vector(&mut self, destination: NodeId, vector: DistanceVector) {
        // Counted before the send so the tally can never dip to zero while
        // the vector sits unprocessed in the peer's inbox.
        self.in_flight.add();
        if let Some(peer) = self.peers.get(&destination) {
            let event = NodeEvent::Vector {
                from: self.me,
                vector,
            };
            if peer.send(event).is_ok() {
                return;
            }
        }
        debug!("{}: dropping vector for {}, peer is gone", self.me, destination);
        self.in_flight.done();
    }
}

async fn node_task(
    mut host: SimulatedHost,
    mut inbox: UnboundedReceiver<NodeEvent>,
    in_flight: Arc<InFlight>,
) -> NodeReport {
    let me = host.me;
    let mut state = handlers::init_state(&host);
    debug!("{}: node task started", me);

    while let Some(event) = inbox.recv().await {
        match event {
            NodeEvent::LinkChange { neighbor, cost } => {
                // The handler reads link costs while it relaxes, so the
                // local map has to carry the new cost before it runs.
                host.apply_link(neighbor, cost);
                handlers::notify_link_change(&mut state, &mut host, neighbor, cost);
                in_flight.done();
            }
            NodeEvent::Vector { from, vector } => {
                handlers::notify_receive_message(&mut state, &mut host, from, vector);
                in_flight.done();
            }
            NodeEvent::Snapshot { reply } => {
                let report = NodeReport {
                    node: me,
                    state: state.clone(),
                    routes: host.routes.clone(),
                };
                if reply.send(report).is_err() {
                    debug!("{}: snapshot requester went away", me);
                }
            }
            NodeEvent::Shutdown => break,
        }
    }

    debug!("{}: node task stopping", me);
    NodeReport {
        node: me,
        state,
        routes: host.routes,
    }
}

/// A running network: one task per node, each fed through an event inbox.
pub struct Simulation {
    senders: BTreeMap<NodeId, UnboundedSender<NodeEvent>>,
    handles: Vec<JoinHandle<NodeReport>>,
    in_flight: Arc<InFlight>,
}

impl Simulation {
    /// Spawn one task per topology node and bring up the configured links.
    /// Bring-up is delivered as ordinary link-change events, so the network
    /// starts converging immediately; call [`Simulation::wait_quiescent`]
    /// before reading state.
    pub fn start(topology: &Topology) -> Simulation {
        let nodes = topology.node_ids();
        let in_flight = Arc::new(InFlight::default());

        let mut senders = BTreeMap::new();
        let mut inboxes = Vec::new();
        for &node in &nodes {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(node, tx);
            inboxes.push((node, rx));
        }

        let mut handles = Vec::new();
        for (node, inbox) in inboxes {
            let host = SimulatedHost {
                me: node,
                nodes: nodes.clone(),
                links: BTreeMap::new(),
                routes: RoutingTable::new(),
                peers: senders.clone(),
                in_flight: in_flight.clone(),
            };
            handles.push(tokio::spawn(node_task(host, inbox, in_flight.clone())));
        }

        let simulation = Simulation {
            senders,
            handles,
            in_flight,
        };
        for (a, b, cost) in topology.links() {
            simulation.set_link(a, b, cost);
        }

        info!("simulation started with {} nodes", nodes.len());
        simulation
    }

    /// All node ids, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.senders.keys().copied().collect()
    }

    /// Change the cost of the undirected link between `a` and `b`. Both
    /// endpoints observe the change.
    pub fn set_link(&self, a: NodeId, b: NodeId, cost: Cost) {
        if a == b {
            warn!("ignoring link from {} to itself", a);
            return;
        }
        debug!("link {} <-> {} set to {}", a, b, cost);
        self.queue_link_change(a, b, cost);
        self.queue_link_change(b, a, cost);
    }

    fn queue_link_change(&self, node: NodeId, neighbor: NodeId, cost: Cost) {
        self.in_flight.add();
        if let Some(sender) = self.senders.get(&node) {
            if sender.send(NodeEvent::LinkChange { neighbor, cost }).is_ok() {
                return;
            }
        }
        warn!("link change for unknown or stopped node {}", node);
        self.in_flight.done();
    }

    /// Wait until no event is queued and no handler is running. Errors when
    /// the network is still churning after `limit`: without loop prevention
    /// a topology change can legitimately keep counting forever.
    pub async fn wait_quiescent(&self, limit: Duration) -> Result<()> {
        let settled = async {
            loop {
                // Register for the wakeup before checking, otherwise the
                // last decrement could slip between check and wait.
                let idle = self.in_flight.idle.notified();
                if self.in_flight.is_idle() {
                    return;
                }
                idle.await;
            }
        };
        tokio::time::timeout(limit, settled)
            .await
            .map_err(|_| anyhow!("network still has events in flight after {:?}", limit))
    }

    /// Ask one node for a copy of its current state and routes.
    pub async fn snapshot(&self, node: NodeId) -> Result<NodeReport> {
        let sender = self
            .senders
            .get(&node)
            .with_context(|| format!("unknown node {}", node))?;
        let (reply, response) = oneshot::channel();
        sender
            .send(NodeEvent::Snapshot { reply })
            .map_err(|_| anyhow!("node {} has stopped", node))?;
        response
            .await
            .with_context(|| format!("node {} dropped the snapshot request", node))
    }

    /// Stop every node and collect the final reports, ascending by id.
    pub async fn shutdown(self) -> Result<Vec<NodeReport>> {
        for sender in self.senders.values() {
            let _ = sender.send(NodeEvent::Shutdown);
        }
        let mut reports = Vec::new();
        for handle in self.handles {
            reports.push(handle.await.context("node task panicked")?);
        }
        reports.sort_by_key(|report| report.node);
        Ok(reports)
    }
}
