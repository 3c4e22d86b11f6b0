use crate::pwm::{Codec, CodecError, Rule};

use std::time::Duration;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

pub const CARRIER_FREQUENCY: u32 = 38_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, EnumIter)]
pub enum PulseType {
    HeaderMark,
    HeaderSpace,
    BitMark,
    OneSpace,
    ZeroSpace,
    // Between two frames of the same command
    MessageSpace,
    // Idle time after the last mark, only seen when receiving
    Gap,
}

impl PulseType {
    pub fn duration(self) -> Duration {
        Duration::from_micros(match self {
            PulseType::HeaderMark => 3360,
            PulseType::HeaderSpace => 1760,
            PulseType::BitMark => 520,
            PulseType::OneSpace => 1370,
            PulseType::ZeroSpace => 360,
            PulseType::MessageSpace => 32300,
            PulseType::Gap => 100_000,
        })
    }

    fn is_mark(self) -> bool {
        matches!(self, PulseType::HeaderMark | PulseType::BitMark)
    }

    fn rule(self) -> Rule {
        match self {
            // Receivers stretch marks and shorten spaces by up to ~150us
            PulseType::ZeroSpace => Rule::with_tolerance(self.duration(), Duration::from_micros(180)),
            PulseType::Gap => Rule::with_tolerance(self.duration(), Duration::from_millis(50)),
            _ => Rule::new(self.duration()),
        }
    }
}

#[derive(Error, Debug, Copy, Clone)]
pub enum PhyError {
    #[error("PWM error: {0}")]
    PWMError(#[from] CodecError),
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),
}

const PREAMBLE: (PulseType, PulseType) = (PulseType::HeaderMark, PulseType::HeaderSpace);

/// Turns frames into the Daikin pulse train and back. Every frame starts with
/// the preamble and carries its bytes LSB first, one mark + space per bit.
pub struct Phy {
    codec: Codec<PulseType>,
}

impl Default for Phy {
    fn default() -> Self {
        Self::new()
    }
}

impl Phy {
    pub fn new() -> Self {
        let (marks, spaces): (Vec<_>, Vec<_>) = PulseType::iter().partition(|p| p.is_mark());
        let codec = Codec::new(
            marks.into_iter().map(|p| (p, p.rule())),
            spaces.into_iter().map(|p| (p, p.rule())),
        );

        Self { codec }
    }

    /// Encodes frames into mark/space durations, starting and ending with a mark.
    pub fn encode<F: AsRef<[u8]>>(frames: &[F]) -> Vec<Duration> {
        Phy::encode_pulses(frames)
            .into_iter()
            .map(PulseType::duration)
            .collect()
    }

    pub fn encode_pulses<F: AsRef<[u8]>>(frames: &[F]) -> Vec<PulseType> {
        let bits: usize = frames.iter().map(|f| f.as_ref().len() * 8).sum();
        let mut pulses = Vec::with_capacity(2 * (bits + 2 * frames.len()) + 1);

        for (i, frame) in frames.iter().enumerate() {
            if i > 0 {
                pulses.push(PulseType::BitMark);
                pulses.push(PulseType::MessageSpace);
            }
            Phy::append_frame(frame.as_ref(), &mut pulses);
        }

        // Trailer
        pulses.push(PulseType::BitMark);
        pulses
    }

    fn append_frame(frame: &[u8], pulses: &mut Vec<PulseType>) {
        pulses.push(PREAMBLE.0);
        pulses.push(PREAMBLE.1);

        for byte in frame {
            for bit in 0..8 {
                pulses.push(PulseType::BitMark);
                pulses.push(if byte & (1 << bit) != 0 {
                    PulseType::OneSpace
                } else {
                    PulseType::ZeroSpace
                });
            }
        }
    }

    /// Decodes a received pulse train into the bytes of each frame it holds.
    pub fn decode(&self, pulses: impl Iterator<Item = Duration>) -> Result<Vec<Vec<u8>>, PhyError> {
        let mut pulses: Vec<Duration> = pulses.collect();
        // Whatever follows the trailing mark is idle time, not a symbol
        if pulses.len() % 2 != 0 {
            pulses.push(PulseType::Gap.duration());
        } else if let Some(last) = pulses.last_mut() {
            *last = PulseType::Gap.duration();
        }

        let pairs = self.codec.decode(pulses.into_iter())?;
        Ok(Phy::decode_pulses(pairs.into_iter())?)
    }

    pub fn decode_pulses(
        mut pulses: impl Iterator<Item = (PulseType, PulseType)>,
    ) -> Result<Vec<Vec<u8>>, DecodeError> {
        let mut frames = Vec::new();

        while let Some(next) = pulses.next() {
            if next != PREAMBLE {
                return Err(DecodeError::InvalidPreamble);
            }
            frames.push(Phy::decode_frame(&mut pulses)?);
        }

        if frames.is_empty() {
            return Err(DecodeError::TruncatedMessage);
        }

        Ok(frames)
    }

    fn decode_frame(
        pulses: impl Iterator<Item = (PulseType, PulseType)>,
    ) -> Result<Vec<u8>, DecodeError> {
        use PulseType::*;

        let mut bytes = Vec::new();
        let mut current: u8 = 0;
        let mut bit = 0;

        for pulse in pulses {
            match pulse {
                (BitMark, OneSpace) => current |= 1 << bit,
                (BitMark, ZeroSpace) => {}
                (BitMark, MessageSpace | Gap) => break,
                any => return Err(DecodeError::InvalidCombination(any)),
            }

            bit += 1;
            if bit == 8 {
                bytes.push(current);
                current = 0;
                bit = 0;
            }
        }

        if bit != 0 {
            return Err(DecodeError::PartialByte(bit));
        }
        if bytes.is_empty() {
            return Err(DecodeError::TruncatedMessage);
        }

        Ok(bytes)
    }
}

#[derive(Error, Debug, Copy, Clone)]
pub enum DecodeError {
    #[error("invalid preamble")]
    InvalidPreamble,
    #[error("invalid combination of pulses: {0:?}")]
    InvalidCombination((PulseType, PulseType)),
    #[error("frame ended after {0} bits of a byte")]
    PartialByte(u8),
    #[error("truncated message")]
    TruncatedMessage,
}
