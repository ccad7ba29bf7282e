use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use traffic_net::math::{Point2d, Polyline2d};
use traffic_net::{
    Brain, IdmBrain, LaneAttributes, LaneId, ManualClock, Net, Route, SimResult, Simulation,
    TickReport,
};

const FRAME_TIME: f64 = 0.05; // s
const NUM_FRAMES: u32 = 1000;
const NUM_ROUTES: usize = 200;

/// Builds a one-way ring road of four two-lane edges around a square.
fn build_ring(size: f64) -> SimResult<(Net, Vec<LaneId>)> {
    let mut net = Net::new();
    let corners = [
        Point2d::new(0.0, 0.0),
        Point2d::new(size, 0.0),
        Point2d::new(size, size),
        Point2d::new(0.0, size),
    ];
    let junctions = corners.map(|pos| net.add_junction(pos));

    let mut edges = vec![];
    for i in 0..4 {
        let (from, to) = (i, (i + 1) % 4);
        let edge = net.add_edge(junctions[from], junctions[to])?;
        let mut lanes = vec![];
        for _ in 0..2 {
            if let Some(shape) = Polyline2d::line(corners[from], corners[to]) {
                lanes.push(net.add_lane(
                    edge,
                    &LaneAttributes {
                        shape: &shape,
                        speed_limit: 16.6,
                    },
                )?);
            }
        }
        edges.push(lanes);
    }

    for i in 0..4 {
        let next = (i + 1) % 4;
        for (from, to) in edges[i].clone().into_iter().zip(edges[next].clone()) {
            net.add_lane_connection(from, to)?;
        }
    }

    Ok((net, edges.concat()))
}

fn main() -> SimResult<()> {
    let (mut net, lanes) = build_ring(250.0)?;
    let mut rng = StdRng::seed_from_u64(42);

    for i in 0..NUM_ROUTES {
        let from = lanes[rng.gen_range(0..lanes.len())];
        let to = lanes[rng.gen_range(0..lanes.len())];
        let Some(to_edge) = net.lane(to).map(|l| l.edge_id()) else {
            continue;
        };
        if let Some(route) = net.plan_route(from, to_edge, 2.5 * i as f64) {
            net.add_route(route)?;
        }
    }

    let clock = ManualClock::new();
    let mut sim = Simulation::with_clock(net, clock.clone());
    let mut brain_rng = StdRng::seed_from_u64(7);
    sim.set_brain_factory(move |_: &Route| {
        let mut brain = IdmBrain::default();
        brain.randomise_velocity_adjust(0.1, &mut brain_rng);
        Box::new(brain) as Box<dyn Brain>
    });

    println!("Simulating...");
    let mut totals = TickReport::default();
    let start = Instant::now();
    for _ in 0..NUM_FRAMES {
        clock.advance(Duration::from_secs_f64(FRAME_TIME));
        let report = sim.tick()?;
        totals.spawned += report.spawned;
        totals.arrivals += report.arrivals;
        totals.collisions += report.collisions;
        totals.edge_transfers += report.edge_transfers;
    }
    let frame = start.elapsed() / NUM_FRAMES;

    println!(
        "Avg. frame: {:?} --> {:.0}x speedup ({} agents)",
        frame,
        FRAME_TIME / frame.as_secs_f64(),
        sim.net().agent_count(),
    );
    println!(
        "{:.0} s simulated: {} spawned, {} arrived, {} crashed, {} junction transfers, {} routes pending",
        sim.time_total(),
        totals.spawned,
        totals.arrivals,
        totals.collisions,
        totals.edge_transfers,
        sim.net().route_count(),
    );
    Ok(())
}
