//! Pre-defined simulation scenarios

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use ferry_core::SimulationIdentity;
use ferry_dtn::DtnConfig;

use crate::error::SimResult;
use crate::simulation::{SimConfig, Simulation};
use crate::topology::{MeshBuilder, from_edges};
use crate::types::PeerId;

/// Tick budget for the scripted scenarios to settle
const SCENARIO_TICK_LIMIT: u64 = 100;

/// Multi-hop relay through a line topology
///
/// ```text
/// A - B - C - D - E
/// ```
///
/// The first node sends to the last over always-up links. The delivery is
/// answered, and the reply walks the same nodes back in reverse.
pub fn line_relay(peers: usize, dtn: DtnConfig) -> SimResult<Simulation> {
    info!(peers, "=== Running Line Relay Scenario ===");

    let mesh = MeshBuilder::new(peers.max(2)).line();
    let ids = mesh.peer_ids();
    let (source, destination) = (ids[0], ids[ids.len() - 1]);

    let mut sim = Simulation::new(
        mesh,
        SimConfig {
            seed: Some(0),
            ..Default::default()
        },
        dtn,
    );

    sim.send_message(source, destination, b"Multi-hop test".to_vec())?;
    let returned = sim.run_until(SCENARIO_TICK_LIMIT, |s| s.stats.responses_delivered > 0)?;
    info!(returned, "{}", sim.state_summary());
    Ok(sim)
}

/// A second message follows the relay learned from the first exchange
///
/// ```text
///     B
///    / \
///   A   D
///    \ /
///     C
/// ```
///
/// A knows nothing about D at first and floods. Once D's reply comes back,
/// A has learned which neighbour reaches D and sends the next message there
/// directly.
pub fn learned_route(dtn: DtnConfig) -> SimResult<Simulation> {
    info!("=== Running Learned Route Scenario ===");

    let mesh = from_edges(&[('A', 'B'), ('A', 'C'), ('B', 'D'), ('C', 'D')])?;
    let a = SimulationIdentity('A');
    let d = SimulationIdentity('D');

    let mut sim = Simulation::new(
        mesh,
        SimConfig {
            seed: Some(0),
            ..Default::default()
        },
        dtn,
    );

    sim.send_message(a, d, b"First".to_vec())?;
    sim.run_until(SCENARIO_TICK_LIMIT, |s| s.stats.responses_delivered > 0)?;
    info!("First exchange done: {}", sim.state_summary());

    sim.send_message(a, d, b"Second".to_vec())?;
    sim.run_until(SCENARIO_TICK_LIMIT, |s| s.stats.messages_delivered >= 2)?;
    info!("Second message done: {}", sim.state_summary());
    Ok(sim)
}

/// Knobs for the chaos scenario
#[derive(Debug, Clone)]
pub struct ChaosOptions {
    pub peers: usize,
    pub ticks: u64,
    /// Chance of a potential link being up on any tick
    pub link_probability: f64,
    /// Messages injected over the first half of the run
    pub messages: usize,
    pub seed: u64,
}

impl Default for ChaosOptions {
    fn default() -> Self {
        Self {
            peers: 8,
            ticks: 200,
            link_probability: 0.3,
            messages: 20,
            seed: 42,
        }
    }
}

/// Random mesh with flapping links and random traffic
pub fn chaos(options: &ChaosOptions, dtn: DtnConfig) -> SimResult<Simulation> {
    info!(
        peers = options.peers,
        ticks = options.ticks,
        "=== Running Random Chaos Scenario ==="
    );

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mesh = MeshBuilder::new(options.peers.max(2)).random_with(0.4, &mut rng);
    let ids = mesh.peer_ids();

    let mut schedule: Vec<(u64, PeerId, PeerId)> = (0..options.messages)
        .filter_map(|_| {
            let at = rng.random_range(0..options.ticks.max(2) / 2);
            let from = ids[rng.random_range(0..ids.len())];
            let to = ids[rng.random_range(0..ids.len())];
            (from != to).then_some((at, from, to))
        })
        .collect();
    schedule.sort_by_key(|(at, _, _)| *at);

    let mut sim = Simulation::new(
        mesh,
        SimConfig {
            link_probability: options.link_probability,
            seed: Some(options.seed),
            max_ticks: options.ticks,
            ..Default::default()
        },
        dtn,
    );

    let mut pending = schedule.into_iter().peekable();
    while sim.tick < options.ticks {
        while let Some((_, from, to)) = pending.next_if(|(at, _, _)| *at <= sim.tick) {
            let payload = format!("Message at tick {}", sim.tick).into_bytes();
            sim.send_message(from, to, payload)?;
        }
        sim.step()?;

        if sim.tick.is_multiple_of(20) {
            info!("{}", sim.state_summary());
        }
    }

    Ok(sim)
}
