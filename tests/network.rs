//! Tests that involve agents moving between edges of a network.

use traffic_net::math::{Point2d, Polyline2d};
use traffic_net::{
    Brain, Decision, FullSpeedBrain, JunctionId, LaneAttributes, LaneId, Net, RandomBrain, Route,
    SimError, ThinkContext, Vehicle,
};

/// Adds a single-lane edge between two junctions.
fn road(net: &mut Net, from: JunctionId, to: JunctionId) -> LaneId {
    let start = net.junction(from).unwrap().position();
    let end = net.junction(to).unwrap().position();
    let edge = net.add_edge(from, to).unwrap();
    net.add_lane(
        edge,
        &LaneAttributes {
            shape: &Polyline2d::line(start, end).unwrap(),
            speed_limit: 20.0,
        },
    )
    .unwrap()
}

/// Two 100 m lanes joined end to end, plus a third lane elsewhere.
fn chain() -> (Net, LaneId, LaneId, LaneId) {
    let mut net = Net::new();
    let j = [
        net.add_junction(Point2d::new(0.0, 0.0)),
        net.add_junction(Point2d::new(100.0, 0.0)),
        net.add_junction(Point2d::new(200.0, 0.0)),
        net.add_junction(Point2d::new(0.0, 100.0)),
    ];
    let first = road(&mut net, j[0], j[1]);
    let second = road(&mut net, j[1], j[2]);
    let elsewhere = road(&mut net, j[3], j[0]);
    net.add_lane_connection(first, second).unwrap();
    (net, first, second, elsewhere)
}

fn step(net: &mut Net, dt: f64) -> traffic_net::TickReport {
    net.think();
    net.simulate(dt).unwrap()
}

#[test]
fn agent_crosses_the_junction() {
    let (mut net, first, second, _) = chain();
    let agent = net
        .add_agent(Vehicle::default(), Box::new(FullSpeedBrain), first, 99.0)
        .unwrap();
    net.set_agent_velocity(agent, 10.0).unwrap();

    let report = step(&mut net, 1.0);
    assert_eq!(report.edge_transfers, 1);
    let agent = net.agent(agent).unwrap();
    assert_eq!(agent.lane_id(), second);
    assert_eq!(agent.position(), 0.0);
    assert_eq!(agent.velocity(), 12.5);
    assert!(net.lane(first).unwrap().is_empty());
    assert!(net.lane(second).unwrap().contains(agent));
}

#[test]
fn unreachable_next_lane_crashes_the_agent() {
    let (mut net, first, _, elsewhere) = chain();
    let brain: Box<dyn Brain> = Box::new(move |_: &ThinkContext| Decision {
        next_lane: Some(elsewhere),
        ..Default::default()
    });
    let agent = net.add_agent(Vehicle::default(), brain, first, 99.0).unwrap();
    net.set_agent_velocity(agent, 10.0).unwrap();

    let report = step(&mut net, 1.0);
    assert_eq!(report.collisions, 1);
    assert_eq!(report.edge_transfers, 0);
    assert!(net.agent(agent).is_none());
    assert!(net.lane(first).unwrap().is_empty());
    assert!(net.lane(elsewhere).unwrap().is_empty());
}

#[test]
fn missing_next_lane_crashes_the_agent() {
    let (mut net, first, _, _) = chain();
    let brain: Box<dyn Brain> = Box::new(|_: &ThinkContext| Decision::default());
    let agent = net.add_agent(Vehicle::default(), brain, first, 99.0).unwrap();
    net.set_agent_velocity(agent, 10.0).unwrap();

    assert_eq!(step(&mut net, 1.0).collisions, 1);
    assert_eq!(net.agent_count(), 0);
}

#[test]
fn choosing_a_lane_from_a_dead_end_crashes_the_agent() {
    let (mut net, _, second, elsewhere) = chain();
    let brain: Box<dyn Brain> = Box::new(move |_: &ThinkContext| Decision {
        next_lane: Some(elsewhere),
        ..Default::default()
    });
    let agent = net.add_agent(Vehicle::default(), brain, second, 99.0).unwrap();
    net.set_agent_velocity(agent, 20.0).unwrap();

    let report = step(&mut net, 1.0);
    assert_eq!(report.arrivals, 0);
    assert_eq!(report.collisions, 1);
    assert!(net.agent(agent).is_none());
}

#[test]
fn routed_agent_leaves_at_its_destination() {
    let (mut net, first, _, _) = chain();
    let route = Route::new(0.0, vec![first]).unwrap();
    let agent = net.spawn(&route, Box::new(FullSpeedBrain)).unwrap();
    net.set_agent_velocity(agent, 20.0).unwrap();

    let (mut arrivals, mut transfers) = (0, 0);
    for _ in 0..20 {
        let report = step(&mut net, 1.0);
        arrivals += report.arrivals;
        transfers += report.edge_transfers;
        if net.agent_count() == 0 {
            break;
        }
    }
    assert_eq!(arrivals, 1);
    assert_eq!(transfers, 0);
}

#[test]
fn routed_agent_follows_its_route() {
    let (mut net, first, second, _) = chain();
    let route = net.plan_route(first, net.lane(second).unwrap().edge_id(), 0.0).unwrap();
    assert_eq!(route.lanes(), &[first, second]);
    let agent = net.spawn(&route, Box::new(FullSpeedBrain)).unwrap();

    let mut seen_second = false;
    for _ in 0..40 {
        step(&mut net, 0.5);
        match net.agent(agent) {
            Some(a) => seen_second |= a.lane_id() == second,
            None => break,
        }
    }
    assert!(seen_second);
    assert!(net.agent(agent).is_none());
}

#[test]
fn route_planning_prefers_the_shorter_path() {
    let mut net = Net::new();
    let p = |x, y| Point2d::new(x, y);
    let j0 = net.add_junction(p(0.0, 0.0));
    let j1 = net.add_junction(p(100.0, 0.0));
    let j2 = net.add_junction(p(150.0, 100.0));
    let j3 = net.add_junction(p(200.0, 0.0));
    let j4 = net.add_junction(p(300.0, 0.0));
    let lone = net.add_junction(p(-100.0, -100.0));

    let start = road(&mut net, j0, j1);
    let long = road(&mut net, j1, j3);
    let up = road(&mut net, j1, j2);
    let down = road(&mut net, j2, j3);
    let last = road(&mut net, j3, j4);
    let unreachable = road(&mut net, lone, j0);
    for (from, to) in [(start, long), (start, up), (up, down), (long, last), (down, last)] {
        net.add_lane_connection(from, to).unwrap();
    }

    let target = net.lane(last).unwrap().edge_id();
    let route = net.plan_route(start, target, 5.0).unwrap();
    assert_eq!(route.lanes(), &[start, long, last]);
    assert_eq!(route.departure_time(), 5.0);
    assert_eq!(route.end_lane(), Some(last));

    let target = net.lane(unreachable).unwrap().edge_id();
    assert!(net.plan_route(start, target, 0.0).is_none());
}

#[test]
fn lanes_must_meet_at_a_junction() {
    let (mut net, first, second, elsewhere) = chain();
    assert_eq!(
        net.add_lane_connection(second, elsewhere),
        Err(SimError::NotJunctionAdjacent {
            from: second,
            to: elsewhere
        })
    );
    assert_eq!(net.add_lane_connection(elsewhere, first), Ok(()));
    assert_eq!(net.lane(elsewhere).unwrap().lanes_out(), &[first]);
}

#[test]
fn routes_are_validated_and_cancellable() {
    let (mut net, first, _, _) = chain();
    assert_eq!(Route::new(0.0, vec![]), Err(SimError::EmptyRoute));
    let id = net.add_route(Route::new(3.0, vec![first]).unwrap()).unwrap();
    assert_eq!(net.route_count(), 1);
    assert_eq!(net.remove_route(id).unwrap().departure_time(), 3.0);
    assert_eq!(net.remove_route(id), Err(SimError::UnknownRoute(id)));
}

/// Every agent is on exactly one lane, the one it believes it is on.
#[test]
fn agents_are_always_on_exactly_one_lane() {
    let mut net = Net::new();
    let corners = [
        Point2d::new(0.0, 0.0),
        Point2d::new(200.0, 0.0),
        Point2d::new(200.0, 200.0),
        Point2d::new(0.0, 200.0),
    ];
    let junctions = corners.map(|pos| net.add_junction(pos));
    let mut edges = vec![];
    for i in 0..4 {
        let edge = net.add_edge(junctions[i], junctions[(i + 1) % 4]).unwrap();
        let shape = Polyline2d::line(corners[i], corners[(i + 1) % 4]).unwrap();
        let lanes = (0..2)
            .map(|_| {
                net.add_lane(
                    edge,
                    &LaneAttributes {
                        shape: &shape,
                        speed_limit: 15.0,
                    },
                )
                .unwrap()
            })
            .collect::<Vec<_>>();
        edges.push(lanes);
    }
    for i in 0..4 {
        for from in &edges[i] {
            for to in &edges[(i + 1) % 4] {
                net.add_lane_connection(*from, *to).unwrap();
            }
        }
    }
    for (i, lanes) in edges.iter().enumerate() {
        for (j, lane) in lanes.iter().enumerate() {
            for k in 0..3 {
                let seed = (i * 100 + j * 10 + k) as u64;
                let pos = 20.0 + 60.0 * k as f64;
                net.add_agent(Vehicle::default(), Box::new(RandomBrain::new(seed)), *lane, pos)
                    .unwrap();
            }
        }
    }

    for _ in 0..300 {
        step(&mut net, 0.1);
        for agent in net.iter_agents() {
            let holders = net.iter_lanes().filter(|l| l.contains(agent)).collect::<Vec<_>>();
            assert_eq!(holders.len(), 1);
            assert_eq!(holders[0].id(), agent.lane_id());
            assert!(agent.decision().is_none());
        }
    }
}
