use std::fmt;
use std::str::FromStr;

use crate::direction::ParseEnumError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Runtime options for the junction. All durations are in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// The maximum green time in adaptive mode,
    /// and the green time of the fixed cycle.
    pub green_duration: f64,
    /// The yellow time in both modes.
    pub yellow_duration: f64,
    /// How far upstream of the stop line vehicles are detected, in world units.
    pub detector_distance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            green_duration: 10000.0,
            yellow_duration: 3000.0,
            detector_distance: 150.0,
        }
    }
}

/// How the junction chooses its light states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Constant durations, round-robin between the pairs.
    Fixed,
    /// Demand-driven phase selection.
    #[default]
    Adaptive,
}

impl FromStr for Mode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Mode::Fixed),
            "adaptive" => Ok(Mode::Adaptive),
            _ => Err(ParseEnumError {
                kind: "mode",
                input: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Fixed => "fixed",
            Mode::Adaptive => "adaptive",
        })
    }
}
