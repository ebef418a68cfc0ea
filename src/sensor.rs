//! Vehicle detection upstream of each stop line.

use smallvec::SmallVec;

use crate::direction::{Direction, DirectionMap};
use crate::light::{LightState, LightStates};
use crate::math::{Point2d, Rect};
use crate::util::Interval;
use crate::VehicleId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the detectors need to know about a vehicle each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleObservation {
    /// The vehicle's ID.
    pub id: VehicleId,
    /// The approach the vehicle is travelling on.
    pub direction: Direction,
    /// The vehicle's position in world space.
    pub pos: Point2d,
    /// Whether the vehicle is stopped and queueing.
    pub waiting: bool,
    /// How long the vehicle has been waiting, in ms.
    pub wait_duration: f64,
}

impl VehicleObservation {
    /// Whether the vehicle is stopped and queueing.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// How long the vehicle has already been waiting, in ms.
    pub fn wait_duration(&self) -> f64 {
        if self.waiting {
            self.wait_duration.max(0.0)
        } else {
            0.0
        }
    }
}

/// The layout of the intersection, in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// The centre of the intersection.
    pub centre: Point2d,
    /// The full width of each road, both carriageways.
    pub road_width: f64,
    /// The distance from the centre to each stop line.
    pub stop_line_offset: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            centre: Point2d::new(400.0, 400.0),
            road_width: 80.0,
            stop_line_offset: 60.0,
        }
    }
}

impl Geometry {
    /// The stop line's coordinate along the approach axis of `dir`:
    /// y for north and south, x for east and west.
    pub fn stop_line(&self, dir: Direction) -> f64 {
        match dir {
            Direction::North => self.centre.y - self.stop_line_offset,
            Direction::South => self.centre.y + self.stop_line_offset,
            Direction::East => self.centre.x + self.stop_line_offset,
            Direction::West => self.centre.x - self.stop_line_offset,
        }
    }

    /// The detection zone for `dir`, extending `distance` upstream of the stop line.
    pub fn detection_zone(&self, dir: Direction, distance: f64) -> DetectionZone {
        let half = 0.5 * self.road_width;
        let across_x = Interval::new(self.centre.x - half, self.centre.x + half);
        let across_y = Interval::new(self.centre.y - half, self.centre.y + half);
        let line = self.stop_line(dir);
        let rect = match dir {
            Direction::North => Rect {
                x: across_x,
                y: Interval::new(line - distance, line),
            },
            Direction::South => Rect {
                x: across_x,
                y: Interval::new(line, line + distance),
            },
            Direction::East => Rect {
                x: Interval::new(line, line + distance),
                y: across_y,
            },
            Direction::West => Rect {
                x: Interval::new(line - distance, line),
                y: across_y,
            },
        };
        DetectionZone {
            direction: dir,
            rect,
        }
    }
}

/// The monitored region upstream of a stop line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionZone {
    /// The approach the zone monitors.
    pub direction: Direction,
    /// The zone's extents in world space.
    pub rect: Rect,
}

impl DetectionZone {
    /// Returns true if the point is inside the zone, edges included.
    pub fn contains(&self, pos: Point2d) -> bool {
        self.rect.contains(pos)
    }
}

/// The detector readings for one approach.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorSnapshot {
    /// Vehicles stopped in the zone this frame.
    pub cars_waiting: u32,
    /// How long the first observed waiting vehicle has waited, in ms.
    pub wait_time: f64,
    /// Vehicles that entered the zone since the last cycle boundary.
    pub total_detected: u32,
}

/// The vehicle whose wait is being timed for an approach.
#[derive(Clone, Copy, Debug)]
struct WaitAnchor {
    vehicle: VehicleId,
    /// Accumulated wait in ms.
    elapsed: f64,
    /// Set on the frame the anchor was chosen, so it isn't advanced twice.
    fresh: bool,
}

/// Per-approach state that outlives a single frame.
#[derive(Clone, Debug, Default)]
struct Tracking {
    /// Vehicles currently inside the zone, used for edge-triggered counting.
    inside: SmallVec<[VehicleId; 16]>,
    /// Vehicles held in the zone by a red light this frame.
    detected: SmallVec<[VehicleId; 8]>,
    anchor: Option<WaitAnchor>,
}

/// The detectors for all four approaches.
#[derive(Clone, Debug)]
pub struct SensorSystem {
    geometry: Geometry,
    /// How far upstream of the stop line the zones extend.
    detector_distance: f64,
    snapshot: DirectionMap<SensorSnapshot>,
    tracking: DirectionMap<Tracking>,
    /// Whether every count should be zeroed at the start of the next update.
    reset_pending: bool,
}

impl SensorSystem {
    /// Creates a new set of detectors.
    pub fn new(geometry: Geometry, detector_distance: f64) -> Self {
        Self {
            geometry,
            detector_distance,
            snapshot: Default::default(),
            tracking: Default::default(),
            reset_pending: false,
        }
    }

    /// Clears all readings and tracked vehicles.
    /// The geometry and detector distance are kept.
    pub fn reset(&mut self) {
        self.snapshot = Default::default();
        self.tracking = Default::default();
        self.reset_pending = false;
    }

    /// Requests that every detected count be zeroed at the start of the next update.
    pub fn trigger_count_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Zeroes the detected counts of every approach immediately.
    pub fn reset_all_counts(&mut self) {
        for (_, snapshot) in self.snapshot.iter_mut() {
            snapshot.total_detected = 0;
        }
        log::info!("detected counts reset for new cycle");
    }

    /// Gets the detector distance.
    pub fn detector_distance(&self) -> f64 {
        self.detector_distance
    }

    /// Sets the detector distance. Takes effect from the next update.
    pub fn set_detector_distance(&mut self, distance: f64) {
        self.detector_distance = distance.max(0.0);
    }

    /// Gets the intersection layout.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The current detection zone for `dir`.
    pub fn zone(&self, dir: Direction) -> DetectionZone {
        self.geometry.detection_zone(dir, self.detector_distance)
    }

    /// The latest readings.
    pub fn snapshot(&self) -> &DirectionMap<SensorSnapshot> {
        &self.snapshot
    }

    /// The vehicles held in the zone for `dir` by a red light on the last update.
    pub fn detected(&self, dir: Direction) -> &[VehicleId] {
        &self.tracking[dir].detected
    }

    /// The vehicle whose wait is being timed for `dir`, if any.
    pub fn waiting_vehicle(&self, dir: Direction) -> Option<VehicleId> {
        self.tracking[dir].anchor.map(|anchor| anchor.vehicle)
    }

    /// Processes one frame of observations.
    ///
    /// # Parameters
    /// * `vehicles` - Every vehicle in the simulation, in a stable order.
    /// * `lights` - The current light states; `None` is treated as all red.
    /// * `prev_lights` - The light states on the previous frame.
    /// * `dt` - The time since the previous update, in ms.
    pub fn update(
        &mut self,
        vehicles: &[VehicleObservation],
        lights: Option<&LightStates>,
        prev_lights: Option<&LightStates>,
        dt: f64,
    ) -> &DirectionMap<SensorSnapshot> {
        // Per-frame readings start from scratch; the wait anchors do not
        for (dir, snapshot) in self.snapshot.iter_mut() {
            snapshot.cars_waiting = 0;
            snapshot.wait_time = 0.0;
            self.tracking[dir].detected.clear();
        }

        // A colour change marks a cycle boundary for that approach
        if let (Some(lights), Some(prev_lights)) = (lights, prev_lights) {
            for dir in Direction::ALL {
                if lights[dir] != prev_lights[dir] {
                    self.snapshot[dir].total_detected = 0;
                }
            }
        }

        if self.reset_pending {
            self.reset_all_counts();
            self.reset_pending = false;
        }

        // Forget vehicles which have left the simulation
        for (_, tracking) in self.tracking.iter_mut() {
            tracking
                .inside
                .retain(|id| vehicles.iter().any(|veh| veh.id == *id));
        }

        let all_red = lights.map_or(true, LightStates::is_all_red);

        for vehicle in vehicles {
            let dir = vehicle.direction;
            let in_zone = self.zone(dir).contains(vehicle.pos);
            let tracking = &mut self.tracking[dir];
            let snapshot = &mut self.snapshot[dir];
            let idx = tracking.inside.iter().position(|id| *id == vehicle.id);

            match (idx, in_zone) {
                (None, true) => {
                    tracking.inside.push(vehicle.id);
                    snapshot.total_detected += 1;
                    log::debug!(
                        "vehicle detected on {} approach (total {})",
                        dir,
                        snapshot.total_detected
                    );
                }
                (Some(idx), false) => {
                    tracking.inside.swap_remove(idx);
                }
                _ => {}
            }

            let is_red = lights.map_or(false, |lights| lights[dir] == LightState::Red);
            if !(in_zone && (is_red || all_red)) {
                continue;
            }

            tracking.detected.push(vehicle.id);
            if vehicle.is_waiting() {
                snapshot.cars_waiting += 1;
                if tracking.anchor.is_none() {
                    tracking.anchor = Some(WaitAnchor {
                        vehicle: vehicle.id,
                        elapsed: vehicle.wait_duration(),
                        fresh: true,
                    });
                    log::info!("wait timer started on {} approach", dir);
                }
            }
        }

        // Time the anchored vehicle on each approach
        for (dir, tracking) in self.tracking.iter_mut() {
            let Some(anchor) = tracking.anchor.as_mut() else {
                continue;
            };
            if anchor.fresh {
                anchor.fresh = false;
            } else {
                anchor.elapsed += dt;
            }

            let still_waiting = vehicles
                .iter()
                .find(|veh| veh.id == anchor.vehicle)
                .map_or(false, VehicleObservation::is_waiting);

            if still_waiting {
                self.snapshot[dir].wait_time = anchor.elapsed;
            } else {
                log::info!(
                    "wait timer cleared on {} approach after {:.1}s",
                    dir,
                    anchor.elapsed / 1000.0
                );
                tracking.anchor = None;
            }
        }

        &self.snapshot
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::direction::Pair;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<VehicleId> {
        let mut map = SlotMap::<VehicleId, ()>::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn sensors() -> SensorSystem {
        SensorSystem::new(Geometry::default(), 150.0)
    }

    /// A point inside the north zone of the default geometry.
    fn north_pos() -> Point2d {
        Point2d::new(390.0, 300.0)
    }

    fn observe(id: VehicleId, pos: Point2d, waiting: bool, wait: f64) -> VehicleObservation {
        VehicleObservation {
            id,
            direction: Direction::North,
            pos,
            waiting,
            wait_duration: wait,
        }
    }

    #[test]
    fn zone_geometry() {
        let geom = Geometry::default();
        let north = geom.detection_zone(Direction::North, 150.0);
        assert_eq!(north.rect.y, Interval::new(190.0, 340.0));
        assert_eq!(north.rect.width(), 80.0);
        let east = geom.detection_zone(Direction::East, 150.0);
        assert_eq!(east.rect.x, Interval::new(460.0, 610.0));
        assert_eq!(east.rect.height(), 80.0);
        assert!(north.contains(Point2d::new(360.0, 340.0)));
        assert!(!north.contains(Point2d::new(359.0, 300.0)));
    }

    #[test]
    fn counts_zone_entry_once() {
        let id = ids(1)[0];
        let mut sensors = sensors();
        let red = LightStates::all_red();
        for _ in 0..5 {
            sensors.update(&[observe(id, north_pos(), false, 0.0)], Some(&red), Some(&red), 100.0);
        }
        assert_eq!(sensors.snapshot()[Direction::North].total_detected, 1);

        // Leave over the stop line, then a fresh entry counts again
        let past = Point2d::new(390.0, 380.0);
        sensors.update(&[observe(id, past, false, 0.0)], Some(&red), Some(&red), 100.0);
        assert!(sensors.detected(Direction::North).is_empty());
        sensors.update(&[observe(id, north_pos(), false, 0.0)], Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].total_detected, 2);
    }

    #[test]
    fn waiting_counted_only_on_red() {
        let ids = ids(2);
        let (a, b) = (ids[0], ids[1]);
        let mut sensors = sensors();
        let green = LightStates::for_pair(Pair::NS, LightState::Green);
        let cars = [
            observe(a, north_pos(), true, 0.0),
            observe(b, Point2d::new(390.0, 250.0), true, 0.0),
        ];
        sensors.update(&cars, Some(&green), Some(&green), 100.0);
        let north = sensors.snapshot()[Direction::North];
        assert_eq!(north.cars_waiting, 0);
        assert_eq!(north.total_detected, 2);

        let red = LightStates::for_pair(Pair::WE, LightState::Green);
        sensors.update(&cars, Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].cars_waiting, 2);
        assert_eq!(sensors.detected(Direction::North), &[a, b]);
        assert_eq!(sensors.waiting_vehicle(Direction::North), Some(a));
    }

    #[test]
    fn missing_lights_treated_as_all_red() {
        let id = ids(1)[0];
        let mut sensors = sensors();
        sensors.update(&[observe(id, north_pos(), true, 0.0)], None, None, 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].cars_waiting, 1);
    }

    #[test]
    fn wait_anchor_keeps_prior_wait_and_clears_on_departure() {
        let id = ids(1)[0];
        let mut sensors = sensors();
        let red = LightStates::all_red();

        sensors.update(&[observe(id, north_pos(), true, 2500.0)], Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].wait_time, 2500.0);
        sensors.update(&[observe(id, north_pos(), true, 2600.0)], Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].wait_time, 2600.0);

        sensors.update(&[observe(id, north_pos(), false, 0.0)], Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.waiting_vehicle(Direction::North), None);
        assert_eq!(sensors.snapshot()[Direction::North].wait_time, 0.0);
    }

    #[test]
    fn deferred_count_reset() {
        let id = ids(1)[0];
        let mut sensors = sensors();
        let red = LightStates::all_red();
        sensors.update(&[observe(id, north_pos(), false, 0.0)], Some(&red), Some(&red), 100.0);
        sensors.trigger_count_reset();
        assert_eq!(sensors.snapshot()[Direction::North].total_detected, 1);
        sensors.update(&[observe(id, north_pos(), false, 0.0)], Some(&red), Some(&red), 100.0);
        assert_eq!(sensors.snapshot()[Direction::North].total_detected, 0);
    }
}
