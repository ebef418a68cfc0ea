//! The demand-responsive phase controller.

use crate::direction::{Direction, DirectionMap, Pair, PairMap};
use crate::light::{LightState, LightStates};
use crate::sensor::SensorSnapshot;
use crate::settings::Settings;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum green time once a pair is granted green, and the
/// period after which a losing comparison is re-evaluated, in ms.
pub const GREEN_LOCK_DURATION: f64 = 5000.0;

/// All-red interval between one pair losing right of way and the other gaining it, in ms.
pub const RED_CLEARANCE_DURATION: f64 = 2000.0;

/// The waiting pair must beat the green pair's throughput by this factor.
const SWITCH_RATIO: f64 = 1.5;

/// Waiting this long doubles a queue's weight in the switching comparison, in ms.
const WAIT_WEIGHT_PERIOD: f64 = 10000.0;

/// The phase of the active pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// No pair has been activated yet; all lights are red.
    #[default]
    Idle,
    Green,
    Yellow,
    /// The active pair is red and the other pair is about to be released.
    RedClearance,
}

impl Phase {
    /// The colour shown to the active pair.
    pub fn light_state(self) -> LightState {
        match self {
            Phase::Green => LightState::Green,
            Phase::Yellow => LightState::Yellow,
            Phase::Idle | Phase::RedClearance => LightState::Red,
        }
    }
}

/// Computes the priority score of a pair: the waiting vehicles weighted by
/// how long the first of them has waited in seconds, plus the detected count.
pub fn pair_score(pair: Pair, snapshot: &DirectionMap<SensorSnapshot>) -> f64 {
    pair.directions()
        .iter()
        .map(|dir| {
            let s = &snapshot[*dir];
            s.cars_waiting as f64 * (s.wait_time / 1000.0) + s.total_detected as f64
        })
        .sum()
}

/// A view of the controller's internals, for telemetry and overlays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DebugInfo {
    pub pair: Option<Pair>,
    pub phase: Phase,
    /// Time spent in the current phase, in ms.
    pub phase_timer: f64,
    /// Remaining green lock, in ms.
    pub green_lock: f64,
    pub scores: PairMap<f64>,
    pub throughput: DirectionMap<f64>,
    pub waiting_count: DirectionMap<f64>,
    pub waiting_time: DirectionMap<f64>,
}

/// Chooses which pair gets right of way based on detector readings.
#[derive(Clone, Debug)]
pub struct AdaptiveController {
    settings: Settings,
    /// The pair currently holding (or last holding) right of way.
    active_pair: Option<Pair>,
    phase: Phase,
    /// Time since the current phase was entered, in ms.
    phase_timer: f64,
    /// Remaining green lock, in ms.
    green_lock: f64,
    /// Priority score of each pair from the latest readings.
    priority: PairMap<f64>,
    /// Vehicles detected per approach this cycle.
    throughput: DirectionMap<f64>,
    /// Vehicles queued per approach.
    waiting_count: DirectionMap<f64>,
    /// Wait of the first queued vehicle per approach, in ms.
    waiting_time: DirectionMap<f64>,
    /// Overrides the pair released after the next red clearance.
    pending_next_pair: Option<Pair>,
    lights: LightStates,
}

impl AdaptiveController {
    /// Creates a controller in the idle phase with all lights red.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            active_pair: None,
            phase: Phase::Idle,
            phase_timer: 0.0,
            green_lock: 0.0,
            priority: Default::default(),
            throughput: Default::default(),
            waiting_count: Default::default(),
            waiting_time: Default::default(),
            pending_next_pair: None,
            lights: LightStates::all_red(),
        }
    }

    /// Returns to the idle phase, discarding all timers and scores.
    pub fn reset(&mut self) {
        *self = Self::new(self.settings);
        log::info!("adaptive controller reset, all lights red");
    }

    /// Replaces the settings. Running timers are kept.
    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Gets the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingests the detector readings, then advances the phase machine by `dt` ms.
    /// Absent readings count as no demand.
    pub fn update(&mut self, snapshot: Option<&DirectionMap<SensorSnapshot>>, dt: f64) {
        self.ingest(snapshot);
        self.step(dt);
    }

    /// Recomputes the priority scores and demand maps from the detector readings.
    pub fn ingest(&mut self, snapshot: Option<&DirectionMap<SensorSnapshot>>) {
        let empty = DirectionMap::default();
        let snapshot = snapshot.unwrap_or(&empty);

        self.priority = PairMap::from_fn(|pair| pair_score(pair, snapshot));
        for (dir, reading) in snapshot.iter() {
            self.throughput[dir] = reading.total_detected as f64;
            self.waiting_count[dir] = reading.cars_waiting as f64;
            self.waiting_time[dir] = reading.wait_time;
        }
        log::debug!(
            "priority scores: NS={:.2} WE={:.2}",
            self.priority[Pair::NS],
            self.priority[Pair::WE]
        );
    }

    /// Advances the phase machine by `dt` ms and updates the light states.
    pub fn step(&mut self, dt: f64) {
        self.phase_timer += dt;

        match (self.phase, self.active_pair) {
            (Phase::Green, Some(pair)) => self.step_green(pair, dt),
            (Phase::Yellow, Some(pair)) => {
                if self.phase_timer >= self.settings.yellow_duration {
                    log::info!("{} yellow -> red clearance", pair);
                    self.enter_phase(Phase::RedClearance);
                }
            }
            (Phase::RedClearance, Some(pair)) => {
                if self.phase_timer >= RED_CLEARANCE_DURATION {
                    let next = self.pending_next_pair.take().unwrap_or(pair.other());
                    log::info!("red clearance -> {} green", next);
                    self.start_green(next);
                }
            }
            _ => {
                if let Some(pair) = self.first_detected_pair() {
                    log::info!("first demand detected, starting {} green", pair);
                    self.start_green(pair);
                }
            }
        }

        self.lights = match self.active_pair {
            Some(pair) => LightStates::for_pair(pair, self.phase.light_state()),
            None => LightStates::all_red(),
        };
    }

    /// Keeps or gives up green for the active pair.
    fn step_green(&mut self, pair: Pair, dt: f64) {
        if self.green_lock > 0.0 {
            self.green_lock = f64::max(0.0, self.green_lock - dt);
            if self.green_lock > 0.0 {
                return;
            }
        }

        let current = self.current_green_score();
        let waiting = self.waiting_red_score();
        let max_green = self.phase_timer >= self.settings.green_duration;

        if waiting > current * SWITCH_RATIO || max_green {
            log::info!(
                "{} green -> yellow (waiting {:.2} vs current {:.2}, max green: {})",
                pair,
                waiting,
                current,
                max_green
            );
            self.enter_phase(Phase::Yellow);
        } else {
            self.green_lock = GREEN_LOCK_DURATION;
        }
    }

    fn start_green(&mut self, pair: Pair) {
        self.active_pair = Some(pair);
        self.enter_phase(Phase::Green);
        self.green_lock = GREEN_LOCK_DURATION;
        for dir in pair.directions() {
            self.throughput[dir] = 0.0;
        }
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_timer = 0.0;
    }

    /// Chooses the pair to release from idle. North-South wins ties.
    pub fn first_detected_pair(&self) -> Option<Pair> {
        let ns = self.priority[Pair::NS];
        let we = self.priority[Pair::WE];
        if ns > 0.0 && ns >= we {
            Some(Pair::NS)
        } else if we > 0.0 {
            Some(Pair::WE)
        } else {
            None
        }
    }

    /// Vehicles detected on the green pair's approaches this cycle.
    pub fn current_green_score(&self) -> f64 {
        self.active_pair.map_or(0.0, |pair| {
            pair.directions().iter().map(|dir| self.throughput[*dir]).sum()
        })
    }

    /// Queued vehicles on the red pair's approaches, weighted by wait time.
    pub fn waiting_red_score(&self) -> f64 {
        self.active_pair.map_or(0.0, |pair| {
            pair.other()
                .directions()
                .iter()
                .map(|dir| self.waiting_weight(*dir))
                .sum()
        })
    }

    fn waiting_weight(&self, dir: Direction) -> f64 {
        self.waiting_count[dir] * (1.0 + self.waiting_time[dir] / WAIT_WEIGHT_PERIOD)
    }

    /// Requests that `pair` is released after the next red clearance,
    /// instead of the pair opposite the one being vacated.
    pub fn request_pair(&mut self, pair: Pair) {
        self.pending_next_pair = Some(pair);
    }

    /// Like [Self::request_pair], taking the pair's name.
    /// Unknown names are ignored.
    pub fn request_pair_named(&mut self, name: &str) {
        match name.parse() {
            Ok(pair) => self.request_pair(pair),
            Err(err) => log::warn!("ignoring pair request: {}", err),
        }
    }

    /// The pair holding right of way, or `None` before the first activation.
    pub fn active_pair(&self) -> Option<Pair> {
        self.active_pair
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Time spent in the current phase, in ms.
    pub fn phase_timer(&self) -> f64 {
        self.phase_timer
    }

    /// Remaining green lock, in ms.
    pub fn green_lock_remaining(&self) -> f64 {
        self.green_lock
    }

    /// The priority score of each pair.
    pub fn priority_scores(&self) -> &PairMap<f64> {
        &self.priority
    }

    /// The pair that will be released after the next red clearance, if overridden.
    pub fn pending_next_pair(&self) -> Option<Pair> {
        self.pending_next_pair
    }

    /// The light states from the last step.
    pub fn lights(&self) -> &LightStates {
        &self.lights
    }

    /// Captures the controller's internals.
    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            pair: self.active_pair,
            phase: self.phase,
            phase_timer: self.phase_timer,
            green_lock: self.green_lock,
            scores: self.priority,
            throughput: self.throughput,
            waiting_count: self.waiting_count,
            waiting_time: self.waiting_time,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn reading(cars_waiting: u32, wait_time: f64, total_detected: u32) -> SensorSnapshot {
        SensorSnapshot {
            cars_waiting,
            wait_time,
            total_detected,
        }
    }

    /// A controller that has just released North-South.
    fn ns_green() -> AdaptiveController {
        let mut ctrl = AdaptiveController::new(Settings::default());
        let mut snap = DirectionMap::default();
        snap[Direction::North] = reading(1, 4000.0, 1);
        ctrl.update(Some(&snap), 100.0);
        assert_eq!(ctrl.active_pair(), Some(Pair::NS));
        assert_eq!(ctrl.phase(), Phase::Green);
        ctrl
    }

    #[test]
    fn score_formula() {
        let mut snap = DirectionMap::default();
        snap[Direction::North] = reading(3, 2500.0, 4);
        snap[Direction::South] = reading(0, 9000.0, 2);
        snap[Direction::East] = reading(1, 500.0, 0);
        assert_approx_eq!(pair_score(Pair::NS, &snap), 3.0 * 2.5 + 4.0 + 2.0);
        assert_approx_eq!(pair_score(Pair::WE, &snap), 0.5);
    }

    #[test]
    fn idle_without_demand() {
        let mut ctrl = AdaptiveController::new(Settings::default());
        for _ in 0..1000 {
            ctrl.update(None, 100.0);
            assert_eq!(ctrl.phase(), Phase::Idle);
            assert!(ctrl.lights().is_all_red());
        }
    }

    #[test]
    fn ties_favour_north_south() {
        let mut ctrl = AdaptiveController::new(Settings::default());
        let mut snap = DirectionMap::default();
        snap[Direction::South] = reading(0, 0.0, 2);
        snap[Direction::West] = reading(0, 0.0, 2);
        ctrl.update(Some(&snap), 100.0);
        assert_eq!(ctrl.active_pair(), Some(Pair::NS));

        let mut ctrl = AdaptiveController::new(Settings::default());
        snap[Direction::East] = reading(1, 1000.0, 0);
        ctrl.update(Some(&snap), 100.0);
        assert_eq!(ctrl.active_pair(), Some(Pair::WE));
    }

    #[test]
    fn green_lock_holds() {
        let mut ctrl = ns_green();
        // Overwhelming demand on the red pair
        let mut snap = DirectionMap::default();
        snap[Direction::East] = reading(20, 60000.0, 20);
        for _ in 0..49 {
            ctrl.update(Some(&snap), 100.0);
            assert_eq!(ctrl.phase(), Phase::Green);
        }
        ctrl.update(Some(&snap), 100.0);
        assert_eq!(ctrl.phase(), Phase::Yellow);
    }

    #[test]
    fn rejected_switch_rearms_lock() {
        let mut ctrl = ns_green();
        let mut snap = DirectionMap::default();
        snap[Direction::North] = reading(0, 0.0, 6);
        snap[Direction::South] = reading(0, 0.0, 4);
        // 5 * (1 + 2000 / 10000) = 6, which does not beat 10 * 1.5
        snap[Direction::East] = reading(5, 2000.0, 0);
        for _ in 0..50 {
            ctrl.update(Some(&snap), 100.0);
        }
        assert_approx_eq!(ctrl.current_green_score(), 10.0);
        assert_approx_eq!(ctrl.waiting_red_score(), 6.0);
        assert_eq!(ctrl.phase(), Phase::Green);
        assert_eq!(ctrl.green_lock_remaining(), GREEN_LOCK_DURATION);
    }

    #[test]
    fn accepted_switch() {
        let mut ctrl = ns_green();
        let mut snap = DirectionMap::default();
        snap[Direction::North] = reading(0, 0.0, 4);
        // 5 * (1 + 4000 / 10000) = 7, which beats 4 * 1.5
        snap[Direction::West] = reading(5, 4000.0, 0);
        for _ in 0..50 {
            ctrl.update(Some(&snap), 100.0);
        }
        assert_approx_eq!(ctrl.waiting_red_score(), 7.0);
        assert_eq!(ctrl.phase(), Phase::Yellow);
        assert_eq!(ctrl.lights()[Direction::North], LightState::Yellow);
        assert_eq!(ctrl.lights()[Direction::West], LightState::Red);
    }

    #[test]
    fn max_green_forces_switch() {
        let mut ctrl = ns_green();
        let mut snap = DirectionMap::default();
        snap[Direction::North] = reading(0, 0.0, 50);
        // Lock expires at 5000 and 10000 ms; the second evaluation hits max green
        for _ in 0..99 {
            ctrl.update(Some(&snap), 100.0);
            assert_eq!(ctrl.phase(), Phase::Green);
        }
        ctrl.update(Some(&snap), 100.0);
        assert_eq!(ctrl.phase(), Phase::Yellow);
    }

    #[test]
    fn pending_pair_overrides_opposite() {
        let mut ctrl = ns_green();
        ctrl.request_pair_named("sideways");
        assert_eq!(ctrl.pending_next_pair(), None);
        ctrl.request_pair(Pair::NS);

        let mut snap = DirectionMap::default();
        snap[Direction::West] = reading(5, 4000.0, 0);
        while ctrl.phase() != Phase::RedClearance {
            ctrl.update(Some(&snap), 100.0);
        }
        while ctrl.phase() == Phase::RedClearance {
            ctrl.update(Some(&snap), 100.0);
        }
        assert_eq!(ctrl.active_pair(), Some(Pair::NS));
        assert_eq!(ctrl.pending_next_pair(), None);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut ctrl = ns_green();
        ctrl.reset();
        assert_eq!(ctrl.phase(), Phase::Idle);
        assert_eq!(ctrl.active_pair(), None);
        assert!(ctrl.lights().is_all_red());
    }
}
