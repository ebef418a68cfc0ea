pub use adaptive::{AdaptiveController, DebugInfo, Phase};
pub use cgmath;
pub use direction::{Direction, DirectionMap, Pair, PairMap, ParseEnumError};
pub use junction::{ControllerDebug, Junction};
pub use light::{FixedCycle, LightState, LightStates};
pub use sensor::{DetectionZone, Geometry, SensorSnapshot, SensorSystem, VehicleObservation};
pub use settings::{Mode, Settings};
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use util::Interval;

pub mod adaptive;
mod direction;
mod junction;
mod light;
pub mod math;
pub mod sensor;
mod settings;
mod util;

new_key_type! {
    /// Unique ID of an observed vehicle.
    pub struct VehicleId;
}
