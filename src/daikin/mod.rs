pub mod controller;
pub mod packet;
pub mod phy;

pub use controller::{Climate, ClimateTraits, Controller, ReceiveError, StateChange, Transmitter, BOOST_TIMEOUT};
pub use packet::{encode, EncodedCommand, Frame, FrameError};
pub use phy::{DecodeError, Phy, PhyError};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Target temperature used until the first request, clamped into the model's range.
pub const DEFAULT_TEMPERATURE: u8 = 22;

/// Remote control model, selects the frame layout sent to the unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Model {
    /// First + time + state frame, 10..=30C
    #[default]
    #[strum(serialize = "ARC470A1")]
    Arc470a1,
    /// First + state frame, 18..=32C
    #[strum(serialize = "ARC432A14")]
    Arc432a14,
}

impl Model {
    pub fn min_temperature(self) -> u8 {
        match self {
            Model::Arc470a1 => 10,
            Model::Arc432a14 => 18,
        }
    }

    pub fn max_temperature(self) -> u8 {
        match self {
            Model::Arc470a1 => 30,
            Model::Arc432a14 => 32,
        }
    }

    /// Rounds and clamps a requested setpoint into the supported range.
    /// NaN yields `None`.
    pub fn clamp_temperature(self, temperature: f32) -> Option<u8> {
        if temperature.is_nan() {
            return None;
        }
        let clamped = temperature.round().clamp(
            self.min_temperature() as f32,
            self.max_temperature() as f32,
        );
        Some(clamped as u8)
    }

    pub fn supports_temperature(self, temperature: u8) -> bool {
        (self.min_temperature()..=self.max_temperature()).contains(&temperature)
    }
}

impl Serialize for Model {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unsupported model: {}", name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Mode {
    #[default]
    Off,
    Heat,
    Cool,
    Dry,
    FanOnly,
    Auto,
}

impl Mode {
    /// Only heating and cooling carry the target temperature, the other modes send a fixed marker.
    pub fn sends_setpoint(self) -> bool {
        matches!(self, Mode::Heat | Mode::Cool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Fan {
    #[default]
    Auto,
    Quiet,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Swing {
    #[default]
    Off,
    Vertical,
    Horizontal,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "snake_case")]
pub enum Preset {
    #[default]
    None,
    Eco,
    Boost,
    Comfort,
}

/// Feature groups enabled at construction time. Disabled groups are never
/// reachable through the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub swing_horizontal: bool,
    pub swing_both: bool,
    pub preset_eco: bool,
    pub preset_boost: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            swing_horizontal: true,
            swing_both: true,
            preset_eco: true,
            preset_boost: true,
        }
    }
}

impl Features {
    pub fn allows_swing(&self, swing: Swing) -> bool {
        match swing {
            Swing::Off | Swing::Vertical => true,
            Swing::Horizontal => self.swing_horizontal,
            Swing::Both => self.swing_both,
        }
    }

    /// Eco is additionally refused while only the fan runs.
    pub fn allows_preset(&self, preset: Preset, mode: Mode) -> bool {
        match preset {
            Preset::None | Preset::Comfort => true,
            Preset::Eco => self.preset_eco && mode != Mode::FanOnly,
            Preset::Boost => self.preset_boost,
        }
    }
}

/// The complete state sent to the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateState {
    pub mode: Mode,

    // Setpoint in Celsius, always within the model's range
    pub target_temperature: u8,

    pub fan: Fan,

    pub swing: Swing,

    pub preset: Preset,
}

impl ClimateState {
    pub fn new(model: Model) -> Self {
        Self {
            mode: Mode::Off,
            target_temperature: DEFAULT_TEMPERATURE
                .clamp(model.min_temperature(), model.max_temperature()),
            fan: Fan::Auto,
            swing: Swing::Off,
            preset: Preset::None,
        }
    }

    pub fn swing_vertical(&self) -> bool {
        self.swing == Swing::Vertical
    }

    pub fn swing_horizontal(&self) -> bool {
        self.swing == Swing::Horizontal
    }

    pub fn swing_both(&self) -> bool {
        self.swing == Swing::Both
    }

    /// Vertical louver movement, either alone or combined with horizontal.
    fn moves_vertically(&self) -> bool {
        matches!(self.swing, Swing::Vertical | Swing::Both)
    }

    fn moves_horizontally(&self) -> bool {
        matches!(self.swing, Swing::Horizontal | Swing::Both)
    }
}
