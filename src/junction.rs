use crate::adaptive::{AdaptiveController, DebugInfo};
use crate::direction::Pair;
use crate::light::{FixedCycle, LightStates};
use crate::sensor::{Geometry, SensorSystem, VehicleObservation};
use crate::settings::{Mode, Settings};

#[cfg(feature = "serde")]
use serde::Serialize;

/// A snapshot of whichever controller is driving the lights.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "lowercase"))]
pub enum ControllerDebug {
    Fixed { step: usize, timer: f64 },
    Adaptive(DebugInfo),
}

/// A signalised four-way intersection.
///
/// Each frame the detectors are updated first, then the active controller,
/// so the controller always sees readings from the same frame.
#[derive(Clone, Debug)]
pub struct Junction {
    mode: Mode,
    settings: Settings,
    sensors: SensorSystem,
    adaptive: AdaptiveController,
    fixed: FixedCycle,
    /// The light states shown this frame.
    lights: LightStates,
    /// The light states shown on the previous frame.
    prev_lights: LightStates,
    /// The current frame of simulation.
    frame: usize,
}

impl Junction {
    /// Creates a new junction with every light red.
    pub fn new(geometry: Geometry, mode: Mode, settings: Settings) -> Self {
        Self {
            mode,
            settings,
            sensors: SensorSystem::new(geometry, settings.detector_distance),
            adaptive: AdaptiveController::new(settings),
            fixed: FixedCycle::new(),
            lights: LightStates::all_red(),
            prev_lights: LightStates::all_red(),
            frame: 0,
        }
    }

    /// Advances the junction by `dt` milliseconds.
    ///
    /// # Parameters
    /// * `vehicles` - Every vehicle approaching or inside the intersection.
    /// * `dt` - The time since the previous frame, in ms.
    pub fn step(&mut self, vehicles: &[VehicleObservation], dt: f64) {
        self.sensors
            .update(vehicles, Some(&self.lights), Some(&self.prev_lights), dt);

        let next = match self.mode {
            Mode::Adaptive => {
                self.adaptive.update(Some(self.sensors.snapshot()), dt);
                *self.adaptive.lights()
            }
            Mode::Fixed => {
                self.fixed.step(dt, &self.settings);
                self.fixed.lights()
            }
        };

        self.prev_lights = self.lights;
        self.lights = next;
        self.frame += 1;
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// The light states shown this frame.
    pub fn lights(&self) -> &LightStates {
        &self.lights
    }

    /// The light states shown on the previous frame.
    pub fn prev_lights(&self) -> &LightStates {
        &self.prev_lights
    }

    /// Gets the control mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switches control mode. The incoming controller starts from its initial state.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        match mode {
            Mode::Fixed => self.fixed.reset(),
            Mode::Adaptive => self.adaptive.reset(),
        }
        log::info!("switched to {} mode", mode);
        self.mode = mode;
    }

    /// Gets the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the settings, including the detector distance.
    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.adaptive.update_settings(settings);
        self.sensors.set_detector_distance(settings.detector_distance);
    }

    /// Changes how far upstream of each stop line vehicles are detected.
    pub fn set_detector_distance(&mut self, distance: f64) {
        self.sensors.set_detector_distance(distance);
        self.settings.detector_distance = self.sensors.detector_distance();
    }

    /// Zeroes every detected count at the start of the next frame.
    pub fn reset_counts(&mut self) {
        self.sensors.trigger_count_reset();
    }

    /// Reinitialises the detectors and both controllers. Every light turns red.
    pub fn reset(&mut self) {
        self.sensors.reset();
        self.adaptive.reset();
        self.fixed.reset();
        self.lights = LightStates::all_red();
        self.prev_lights = LightStates::all_red();
        log::info!("{} mode reset", self.mode);
    }

    /// Asks the adaptive controller to release the named pair after the next red clearance.
    /// Unknown names are ignored.
    pub fn request_pair(&mut self, name: &str) {
        self.adaptive.request_pair_named(name);
    }

    /// The pair currently showing a non-red colour, if any.
    pub fn green_pair(&self) -> Option<Pair> {
        self.lights.non_red_pair()
    }

    /// Gets the detectors.
    pub fn sensors(&self) -> &SensorSystem {
        &self.sensors
    }

    /// Gets the adaptive controller.
    pub fn adaptive(&self) -> &AdaptiveController {
        &self.adaptive
    }

    /// Gets the fixed-time controller.
    pub fn fixed(&self) -> &FixedCycle {
        &self.fixed
    }

    /// Captures the state of the active controller.
    pub fn debug_info(&self) -> ControllerDebug {
        match self.mode {
            Mode::Fixed => ControllerDebug::Fixed {
                step: self.fixed.current_step(),
                timer: self.fixed.timer(),
            },
            Mode::Adaptive => ControllerDebug::Adaptive(self.adaptive.debug_info()),
        }
    }

    /// Gets the debugging information for the current frame as JSON.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        serde_json::json!({
            "frame": self.frame,
            "lights": self.lights,
            "sensors": self.sensors.snapshot(),
            "controller": self.debug_info(),
        })
    }
}
