use super::{
    phy::{Phy, CARRIER_FREQUENCY},
    ClimateState, Fan, Mode, Model, Preset, Swing,
};
use bitfield::bitfield;
use log::debug;
use std::{fmt, time::Duration};
use thiserror::Error;

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("invalid frame header")]
    InvalidHeader,

    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

pub const FIRST_FRAME_SIZE: usize = 8;
pub const TIME_FRAME_SIZE: usize = 8;
pub const STATE_FRAME_SIZE: usize = 19;

const HEADER: [u8; 3] = [0x11, 0xDA, 0x27];

// Byte 4
const FIRST_FRAME_TYPE: u8 = 0xC5;
const TIME_FRAME_TYPE: u8 = 0x42;
const STATE_FRAME_TYPE: u8 = 0x00;

// ARC432A14 flags its first frame in byte 3 and leaves the type empty
const ARC432A14_FIRST_FRAME_ID: u8 = 0xF0;

// Clock payload is fixed, the unit ignores it for climate control
const TIME_FRAME: [u8; TIME_FRAME_SIZE] = [0x11, 0xDA, 0x27, 0x00, 0x42, 0x49, 0x05, 0xA2];

bitfield! {
    /// Leading frame of every command, carries the comfort flag.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FirstFrame([u8]);
    u8;
    pub header_id, set_header_id: 31, 24;
    pub frame_type, set_frame_type: 39, 32;
    pub comfort_raw, set_comfort_raw: 55, 48;
    pub checksum, set_checksum: 63, 56;
}

bitfield! {
    /// Full climate state, always the last frame of a command.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct StateFrame([u8]);
    u8;
    pub frame_type, set_frame_type: 39, 32;
    pub power, set_power: 40;
    pub mode_raw, set_mode_raw: 47, 44;
    pub temperature_raw, set_temperature_raw: 55, 48;
    pub swing_vertical_raw, set_swing_vertical_raw: 67, 64;
    pub fan_raw, set_fan_raw: 71, 68;
    pub swing_horizontal_raw, set_swing_horizontal_raw: 79, 72;
    pub u16, model_id, set_model_id: 103, 88;
    pub boost_raw, set_boost_raw: 111, 104;
    _, set_unknown: 127, 120;
    pub eco, set_eco: 130;
    pub checksum, set_checksum: 151, 144;
}

impl FirstFrame<[u8; FIRST_FRAME_SIZE]> {
    const COMFORT_ON: u8 = 0x10;

    fn from_state(state: &ClimateState, model: Model) -> Self {
        let mut frame = FirstFrame([0; FIRST_FRAME_SIZE]);
        frame.0[..HEADER.len()].copy_from_slice(&HEADER);

        match model {
            Model::Arc470a1 => frame.set_frame_type(FIRST_FRAME_TYPE),
            Model::Arc432a14 => frame.set_header_id(ARC432A14_FIRST_FRAME_ID),
        }

        if state.preset == Preset::Comfort {
            frame.set_comfort_raw(Self::COMFORT_ON);
        }

        frame.set_checksum(checksum(&frame.0));
        frame
    }

    pub fn comfort(&self) -> bool {
        self.comfort_raw() == Self::COMFORT_ON
    }
}

impl StateFrame<[u8; STATE_FRAME_SIZE]> {
    // Modes
    const MODE_AUTO: u8 = 0x0;
    const MODE_DRY: u8 = 0x2;
    const MODE_COOL: u8 = 0x3;
    const MODE_HEAT: u8 = 0x4;
    const MODE_FAN: u8 = 0x6;

    // Fans
    const FAN_1: u8 = 0x3;
    const FAN_2: u8 = 0x4;
    const FAN_3: u8 = 0x5;
    const FAN_4: u8 = 0x6;
    const FAN_5: u8 = 0x7;
    const FAN_AUTO: u8 = 0xA;
    const FAN_QUIET: u8 = 0xB;

    // Setpoints forced by the mode
    const TEMP_FAN_ONLY: u8 = 0x32;
    const TEMP_AUTO: u8 = 0xC0;

    const SWING_ON: u8 = 0xF;
    const BOOST_ON: u8 = 0x01;
    const UNKNOWN: u8 = 0xC0;
    const ARC470A1_ID: u16 = 0x6006;

    fn from_state(state: &ClimateState, model: Model) -> Self {
        let mut frame = StateFrame([0; STATE_FRAME_SIZE]);
        frame.0[..HEADER.len()].copy_from_slice(&HEADER);
        frame.set_frame_type(STATE_FRAME_TYPE);
        frame.set_unknown(Self::UNKNOWN);

        frame.set_power(state.mode != Mode::Off);
        frame.set_mode_raw(match state.mode {
            Mode::Off | Mode::Auto => Self::MODE_AUTO,
            Mode::Dry => Self::MODE_DRY,
            Mode::Cool => Self::MODE_COOL,
            Mode::Heat => Self::MODE_HEAT,
            Mode::FanOnly => Self::MODE_FAN,
        });

        frame.set_temperature_raw(match state.mode {
            Mode::FanOnly => Self::TEMP_FAN_ONLY,
            Mode::Auto | Mode::Dry => Self::TEMP_AUTO,
            // Half degree units
            _ => state.target_temperature << 1,
        });

        frame.set_fan_raw(match state.fan {
            Fan::Auto => Self::FAN_AUTO,
            Fan::Quiet => Self::FAN_QUIET,
            Fan::Level1 => Self::FAN_1,
            Fan::Level2 => Self::FAN_2,
            Fan::Level3 => Self::FAN_3,
            Fan::Level4 => Self::FAN_4,
            Fan::Level5 => Self::FAN_5,
        });

        if state.moves_vertically() {
            frame.set_swing_vertical_raw(Self::SWING_ON);
        }
        if state.moves_horizontally() {
            // Horizontal alone also sets the upper nibble, as the remote does
            frame.set_swing_horizontal_raw(if state.swing == Swing::Horizontal {
                0xFF
            } else {
                Self::SWING_ON
            });
        }

        match state.preset {
            Preset::Boost => frame.set_boost_raw(Self::BOOST_ON),
            Preset::Eco => frame.set_eco(true),
            Preset::None | Preset::Comfort => {}
        }

        if model == Model::Arc470a1 {
            frame.set_model_id(Self::ARC470A1_ID);
        }

        frame.set_checksum(checksum(&frame.0));
        frame
    }

    /// `None` if the mode nibble isn't one the remote sends.
    pub fn mode(&self) -> Option<Mode> {
        if !self.power() {
            return Some(Mode::Off);
        }

        Some(match self.mode_raw() {
            Self::MODE_AUTO => Mode::Auto,
            Self::MODE_DRY => Mode::Dry,
            Self::MODE_COOL => Mode::Cool,
            Self::MODE_HEAT => Mode::Heat,
            Self::MODE_FAN => Mode::FanOnly,
            _ => return None,
        })
    }

    /// Setpoint in Celsius, or None when the mode forces a marker value instead.
    pub fn temperature(&self) -> Option<u8> {
        let raw = self.temperature_raw();
        if raw & Self::TEMP_AUTO != 0 || self.mode() == Some(Mode::FanOnly) {
            None
        } else {
            Some(raw >> 1)
        }
    }

    pub fn fan(&self) -> Option<Fan> {
        Some(match self.fan_raw() {
            Self::FAN_AUTO => Fan::Auto,
            Self::FAN_QUIET => Fan::Quiet,
            Self::FAN_1 => Fan::Level1,
            Self::FAN_2 => Fan::Level2,
            Self::FAN_3 => Fan::Level3,
            Self::FAN_4 => Fan::Level4,
            Self::FAN_5 => Fan::Level5,
            _ => return None,
        })
    }

    pub fn swing(&self) -> Swing {
        let vertical = self.swing_vertical_raw() != 0;
        let horizontal = self.swing_horizontal_raw() & Self::SWING_ON != 0;
        match (vertical, horizontal) {
            (true, true) => Swing::Both,
            (true, false) => Swing::Vertical,
            (false, true) => Swing::Horizontal,
            (false, false) => Swing::Off,
        }
    }

    /// Boost or eco if the frame asks for one of them. Comfort lives in the first frame.
    pub fn preset(&self) -> Option<Preset> {
        if self.boost_raw() == Self::BOOST_ON {
            Some(Preset::Boost)
        } else if self.eco() {
            Some(Preset::Eco)
        } else {
            None
        }
    }
}

/// One checksummed frame of a Daikin command.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    First(FirstFrame<[u8; FIRST_FRAME_SIZE]>),
    Time([u8; TIME_FRAME_SIZE]),
    State(StateFrame<[u8; STATE_FRAME_SIZE]>),
}

impl Frame {
    /// Validates header, length and checksum of a received frame.
    pub fn parse(bytes: &[u8]) -> Result<Frame, FrameError> {
        if bytes.len() <= 4 {
            return Err(FrameError::TooShort(bytes.len()));
        }
        if bytes[..HEADER.len()] != HEADER {
            return Err(FrameError::InvalidHeader);
        }

        let expected = match (bytes[3], bytes[4]) {
            (ARC432A14_FIRST_FRAME_ID, _) => FIRST_FRAME_SIZE,
            (0x00, FIRST_FRAME_TYPE) => FIRST_FRAME_SIZE,
            (0x00, TIME_FRAME_TYPE) => TIME_FRAME_SIZE,
            (0x00, STATE_FRAME_TYPE) => STATE_FRAME_SIZE,
            (0x00, other) => return Err(FrameError::UnknownFrameType(other)),
            _ => return Err(FrameError::InvalidHeader),
        };

        if bytes.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }

        let computed = checksum(bytes);
        let actual = bytes[bytes.len() - 1];
        if computed != actual {
            return Err(FrameError::ChecksumMismatch {
                expected: computed,
                actual,
            });
        }

        let invalid_length = |_| FrameError::InvalidLength {
            expected,
            actual: bytes.len(),
        };
        Ok(match (bytes[3], bytes[4]) {
            (0x00, TIME_FRAME_TYPE) => Frame::Time(bytes.try_into().map_err(invalid_length)?),
            (0x00, STATE_FRAME_TYPE) => {
                Frame::State(StateFrame(bytes.try_into().map_err(invalid_length)?))
            }
            _ => Frame::First(FirstFrame(bytes.try_into().map_err(invalid_length)?)),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::First(frame) => &frame.0,
            Frame::Time(frame) => frame,
            Frame::State(frame) => &frame.0,
        }
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Frame::First(_) => "First",
            Frame::Time(_) => "Time",
            Frame::State(_) => "State",
        };
        write!(f, "{}({})", kind, hex::encode(self.as_bytes()))
    }
}

/// Additive checksum over every byte but the last, which holds it. Zero for an empty frame.
pub fn checksum(frame: &[u8]) -> u8 {
    frame.split_last().map_or(0, |(_, payload)| {
        payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    })
}

/// The frames of one command plus the pulse train that carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub model: Model,
    pub frames: Vec<Frame>,
    // Alternating mark/space durations, starting and ending with a mark
    pub pulses: Vec<Duration>,
}

impl EncodedCommand {
    pub fn bytes(&self) -> Vec<u8> {
        self.frames
            .iter()
            .flat_map(|f| f.as_bytes().iter().copied())
            .collect()
    }

    pub fn carrier_frequency(&self) -> u32 {
        CARRIER_FREQUENCY
    }

    pub fn state_frame(&self) -> Option<&StateFrame<[u8; STATE_FRAME_SIZE]>> {
        self.frames.iter().find_map(|f| match f {
            Frame::State(frame) => Some(frame),
            _ => None,
        })
    }
}

/// Encodes a validated state for the given remote model.
///
/// Panics if the setpoint is outside the model's range: the controller clamps
/// every request, so this only fires when that validation was bypassed.
pub fn encode(state: &ClimateState, model: Model) -> EncodedCommand {
    assert!(
        model.supports_temperature(state.target_temperature),
        "target temperature {} outside {}..={} for {}",
        state.target_temperature,
        model.min_temperature(),
        model.max_temperature(),
        model
    );

    let mut frames = Vec::with_capacity(3);
    frames.push(Frame::First(FirstFrame::from_state(state, model)));
    if model == Model::Arc470a1 {
        frames.push(Frame::Time(TIME_FRAME));
    }
    frames.push(Frame::State(StateFrame::from_state(state, model)));

    let pulses = Phy::encode(&frames);
    let command = EncodedCommand {
        model,
        frames,
        pulses,
    };
    debug!("encoded frame: {}", hex::encode(command.bytes()));
    command
}
