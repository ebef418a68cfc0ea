use crate::direction::{DirectionMap, Pair};
use crate::settings::Settings;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The all-red wait between the two halves of the fixed cycle, in ms.
const FIXED_RED_WAIT: f64 = 3000.0;

/// The colour shown by a single direction's signal head.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LightState {
    #[default]
    Red,
    Yellow,
    Green,
}

/// The colour of every direction's signal head.
pub type LightStates = DirectionMap<LightState>;

impl LightStates {
    /// Every direction red.
    pub fn all_red() -> Self {
        Self::splat(LightState::Red)
    }

    /// Gives `state` to the directions of `pair` and red to everything else.
    pub fn for_pair(pair: Pair, state: LightState) -> Self {
        Self::from_fn(|dir| {
            if dir.pair() == pair {
                state
            } else {
                LightState::Red
            }
        })
    }

    /// Whether every direction is red.
    pub fn is_all_red(&self) -> bool {
        self.values().all(|state| *state == LightState::Red)
    }

    /// The pair currently showing a non-red colour, if any.
    pub fn non_red_pair(&self) -> Option<Pair> {
        self.iter()
            .find(|(_, state)| **state != LightState::Red)
            .map(|(dir, _)| dir.pair())
    }
}

/// One step of the fixed-time cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FixedStep {
    /// The pair shown a non-red colour, if any.
    pair: Option<Pair>,
    /// The colour shown to `pair`.
    state: LightState,
}

const FIXED_STEPS: [FixedStep; 6] = [
    FixedStep { pair: Some(Pair::NS), state: LightState::Green },
    FixedStep { pair: Some(Pair::NS), state: LightState::Yellow },
    FixedStep { pair: None, state: LightState::Red },
    FixedStep { pair: Some(Pair::WE), state: LightState::Green },
    FixedStep { pair: Some(Pair::WE), state: LightState::Yellow },
    FixedStep { pair: None, state: LightState::Red },
];

/// A fixed-time signal plan that cycles through both pairs
/// with constant durations, ignoring demand.
#[derive(Clone, Debug, Default)]
pub struct FixedCycle {
    /// Index into the cycle steps.
    step: usize,
    /// Time spent in the current step, in ms.
    since: f64,
}

impl FixedCycle {
    /// Creates a cycle starting with North-South green.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns to the start of the cycle.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advances the cycle by `dt` milliseconds.
    pub fn step(&mut self, dt: f64, settings: &Settings) {
        self.since += dt;
        let step = FIXED_STEPS[self.step];
        let duration = match step.state {
            LightState::Green => settings.green_duration,
            LightState::Yellow => settings.yellow_duration,
            LightState::Red => FIXED_RED_WAIT,
        };
        if self.since >= duration {
            self.step = (self.step + 1) % FIXED_STEPS.len();
            self.since = 0.0;
            log::debug!("fixed cycle advanced to step {}", self.step);
        }
    }

    /// The index of the current cycle step.
    pub fn current_step(&self) -> usize {
        self.step
    }

    /// Time spent in the current step, in ms.
    pub fn timer(&self) -> f64 {
        self.since
    }

    /// The colours for the current step.
    pub fn lights(&self) -> LightStates {
        let step = FIXED_STEPS[self.step];
        match step.pair {
            Some(pair) => LightStates::for_pair(pair, step.state),
            None => LightStates::all_red(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::direction::Direction;

    #[test]
    fn for_pair_is_mutually_exclusive() {
        let lights = LightStates::for_pair(Pair::WE, LightState::Yellow);
        assert_eq!(lights[Direction::East], LightState::Yellow);
        assert_eq!(lights[Direction::West], LightState::Yellow);
        assert_eq!(lights[Direction::North], LightState::Red);
        assert_eq!(lights.non_red_pair(), Some(Pair::WE));
        assert!(LightStates::all_red().is_all_red());
    }

    #[test]
    fn fixed_cycle_round_trip() {
        let settings = Settings {
            green_duration: 1000.0,
            yellow_duration: 500.0,
            ..Default::default()
        };
        let mut cycle = FixedCycle::new();
        let mut seen = vec![cycle.lights()];
        // 2 * (1000 + 500 + 3000) ms in 100 ms frames
        for _ in 0..90 {
            cycle.step(100.0, &settings);
            if seen.last() != Some(&cycle.lights()) {
                seen.push(cycle.lights());
            }
        }
        assert_eq!(cycle.current_step(), 0);
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[3], LightStates::for_pair(Pair::WE, LightState::Green));
        assert!(seen[2].is_all_red());
    }
}
