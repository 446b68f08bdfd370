use anyhow::Result;
use clap::Parser;
use log::info;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder;

use custom_dv::config::scenario::ScenarioConfig;
use custom_dv::network::simulator::{NodeReport, Simulation};
use custom_dv::network::topology::Topology;
use custom_dv::protocol::types::{Cost, NodeId};

/// Drive a distance-vector scenario to quiescence, one phase per link
/// event, and print every node's view after each phase.
#[derive(Parser)]
#[command(name = "custom-dv")]
struct Cli {
    /// Scenario file (JSON).
    scenario: PathBuf,

    /// Emit JSON instead of text tables.
    #[arg(long)]
    json: bool,

    /// Give up when a phase has not settled within this many seconds.
    #[arg(long, default_value_t = 10)]
    quiesce_timeout_secs: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = ScenarioConfig::load_from_file(&cli.scenario)?;
    info!(
        "loaded scenario {:?} with {} nodes, {} links, {} events",
        config.name,
        config.nodes.len(),
        config.links.len(),
        config.events.len()
    );

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run_scenario(&cli, &config))
}

async fn run_scenario(cli: &Cli, config: &ScenarioConfig) -> Result<()> {
    let limit = Duration::from_secs(cli.quiesce_timeout_secs);
    let topology = config.topology()?;
    let simulation = Simulation::start(&topology);

    simulation.wait_quiescent(limit).await?;
    report_phase(&simulation, &topology, "initial topology", cli.json).await?;

    for (index, event) in config.events.iter().enumerate() {
        let a = config.node_id(&event.a)?;
        let b = config.node_id(&event.b)?;
        simulation.set_link(a, b, event.cost);
        simulation.wait_quiescent(limit).await?;

        let label = format!(
            "event {}: {} <-> {} cost {}",
            index + 1,
            event.a,
            event.b,
            event.cost
        );
        report_phase(&simulation, &topology, &label, cli.json).await?;
    }

    let reports = simulation.shutdown().await?;
    info!(
        "scenario {:?} finished with {} node reports",
        config.name,
        reports.len()
    );
    Ok(())
}

async fn report_phase(
    simulation: &Simulation,
    topology: &Topology,
    label: &str,
    json: bool,
) -> Result<()> {
    let mut reports = Vec::new();
    for node in simulation.node_ids() {
        reports.push(simulation.snapshot(node).await?);
    }

    if json {
        let view = phase_view(topology, label, &reports);
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render_phase(topology, label, &reports));
    }
    Ok(())
}

fn node_label(topology: &Topology, node: NodeId) -> String {
    match topology.node_name(node) {
        Some(name) => name.to_string(),
        None => node.to_string(),
    }
}

fn render_phase(topology: &Topology, label: &str, reports: &[NodeReport]) -> String {
    let mut out = String::new();
    writeln!(out, "\n=== {} ===", label).unwrap();

    for report in reports {
        writeln!(out, "\nNode {} ({})", node_label(topology, report.node), report.node).unwrap();
        writeln!(out, "{:<14} {:<10} {:<10}", "Destination", "Cost", "Next Hop").unwrap();
        writeln!(out, "{}", "-".repeat(36)).unwrap();
        for (destination, info) in report.state.table.row(report.node).iter() {
            let next_hop = match info.next_hop {
                Some(hop) => node_label(topology, hop),
                None => "-".to_string(),
            };
            writeln!(
                out,
                "{:<14} {:<10} {:<10}",
                node_label(topology, destination),
                info.cost.to_string(),
                next_hop
            )
            .unwrap();
        }

        writeln!(out, "\nForwarding table:").unwrap();
        write!(out, "{}", report.routes).unwrap();
    }

    out
}

#[derive(Serialize)]
struct PhaseView {
    phase: String,
    nodes: Vec<NodeView>,
}

#[derive(Serialize)]
struct NodeView {
    name: String,
    distances: Vec<DistanceView>,
    routes: Vec<RouteView>,
}

#[derive(Serialize)]
struct DistanceView {
    destination: String,
    cost: Cost,
    next_hop: Option<String>,
}

#[derive(Serialize)]
struct RouteView {
    destination: String,
    next_hop: String,
    cost: Cost,
}

fn phase_view(topology: &Topology, label: &str, reports: &[NodeReport]) -> PhaseView {
    let nodes = reports
        .iter()
        .map(|report| NodeView {
            name: node_label(topology, report.node),
            distances: report
                .state
                .table
                .row(report.node)
                .iter()
                .map(|(destination, info)| DistanceView {
                    destination: node_label(topology, destination),
                    cost: info.cost,
                    next_hop: info.next_hop.map(|hop| node_label(topology, hop)),
                })
                .collect(),
            routes: report
                .routes
                .iter()
                .map(|entry| RouteView {
                    destination: node_label(topology, entry.destination),
                    next_hop: node_label(topology, entry.next_hop),
                    cost: entry.cost,
                })
                .collect(),
        })
        .collect();

    PhaseView {
        phase: label.to_string(),
        nodes,
    }
}
