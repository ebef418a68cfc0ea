use rand_distr::{Distribution, Exp};
use signal_sim::math::{Point2d, Vector2d};
use signal_sim::{
    Direction, DirectionMap, Geometry, Junction, LightState, Mode, Pair, Settings, VehicleId,
    VehicleObservation,
};
use slotmap::SlotMap;

/// Frame length in ms.
const FRAME: f64 = 50.0;

/// Simulated run time in ms.
const RUN_TIME: f64 = 180_000.0;

/// Cruising speed in world units per ms.
const SPEED: f64 = 0.06;

/// Minimum distance between the centres of queued vehicles.
const SPACING: f64 = 14.0;

/// How far upstream of the stop line vehicles appear.
const SPAWN_DISTANCE: f64 = 400.0;

struct DemoVehicle {
    direction: Direction,
    /// Distance travelled along the approach from the spawn point.
    along: f64,
    /// Time spent stopped, in ms.
    waited: f64,
}

fn heading(dir: Direction) -> Vector2d {
    match dir {
        Direction::North => Vector2d::new(0.0, 1.0),
        Direction::South => Vector2d::new(0.0, -1.0),
        Direction::East => Vector2d::new(-1.0, 0.0),
        Direction::West => Vector2d::new(1.0, 0.0),
    }
}

/// The spawn point of an approach, in the nearside lane.
fn origin(geom: &Geometry, dir: Direction) -> Point2d {
    let heading = heading(dir);
    let lane = Vector2d::new(-heading.y, heading.x) * (0.25 * geom.road_width);
    let upstream = geom.stop_line_offset + SPAWN_DISTANCE;
    geom.centre - heading * upstream + lane
}

fn main() {
    let mode = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(Mode::Adaptive);

    let geom = Geometry::default();
    let mut junction = Junction::new(geom, mode, Settings::default());
    let mut vehicles = SlotMap::<VehicleId, DemoVehicle>::with_key();
    let mut rng = rand::thread_rng();

    // Mean arrivals per ms on each approach
    let rates = DirectionMap::from_fn(|dir| match dir {
        Direction::North | Direction::South => 1.0 / 3000.0,
        Direction::East | Direction::West => 1.0 / 7000.0,
    });
    let mut next_arrival = DirectionMap::from_fn(|dir| {
        Exp::new(rates[dir]).map_or(f64::INFINITY, |exp| exp.sample(&mut rng))
    });

    let stop_at = SPAWN_DISTANCE;
    let despawn_at = SPAWN_DISTANCE + 2.0 * geom.stop_line_offset + 100.0;
    let mut time = 0.0;
    let mut passed = 0usize;

    println!("Simulating {} mode...", mode);
    while time < RUN_TIME {
        for dir in Direction::ALL {
            next_arrival[dir] -= FRAME;
            if next_arrival[dir] > 0.0 {
                continue;
            }
            let clear = vehicles
                .values()
                .filter(|veh| veh.direction == dir)
                .all(|veh| veh.along > SPACING);
            if clear {
                vehicles.insert(DemoVehicle {
                    direction: dir,
                    along: 0.0,
                    waited: 0.0,
                });
            }
            next_arrival[dir] = Exp::new(rates[dir]).map_or(f64::INFINITY, |exp| exp.sample(&mut rng));
        }

        // Move each queue front to back
        for dir in Direction::ALL {
            let mut queue = vehicles
                .iter()
                .filter(|(_, veh)| veh.direction == dir)
                .map(|(id, veh)| (id, veh.along))
                .collect::<Vec<_>>();
            queue.sort_by(|a, b| b.1.total_cmp(&a.1));

            let green = junction.lights()[dir] == LightState::Green;
            let mut limit = f64::INFINITY;
            for (id, along) in queue {
                let mut advance = SPEED * FRAME;
                if !green && along <= stop_at {
                    advance = advance.min(stop_at - along);
                }
                advance = advance.min(limit - SPACING - along).max(0.0);
                let veh = &mut vehicles[id];
                veh.along += advance;
                if advance < 1e-6 {
                    veh.waited += FRAME;
                } else {
                    veh.waited = 0.0;
                }
                limit = veh.along;
            }
        }

        vehicles.retain(|_, veh| {
            let keep = veh.along < despawn_at;
            passed += !keep as usize;
            keep
        });

        let observations = vehicles
            .iter()
            .map(|(id, veh)| VehicleObservation {
                id,
                direction: veh.direction,
                pos: origin(&geom, veh.direction) + heading(veh.direction) * veh.along,
                waiting: veh.waited > 0.0,
                wait_duration: veh.waited,
            })
            .collect::<Vec<_>>();
        junction.step(&observations, FRAME);
        time += FRAME;

        if junction.frame() % 20 == 0 {
            let lights = junction
                .lights()
                .iter()
                .map(|(dir, state)| format!("{}={:?}", dir, state))
                .collect::<Vec<_>>()
                .join(" ");
            let scores = junction.adaptive().priority_scores();
            println!(
                "t={:>5.0}s  {}  NS={:.1} WE={:.1}  vehs={} passed={}",
                time / 1000.0,
                lights,
                scores[Pair::NS],
                scores[Pair::WE],
                vehicles.len(),
                passed,
            );
        }
    }
}
