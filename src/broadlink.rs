use std::time::Duration;

/**
 * Broadlink IR packet: the byte form a Broadlink remote (and SmartIR) uses for a pulse train.
 * Payload format from: https://github.com/mjg59/python-broadlink/blob/master/protocol.md
 */
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::daikin::EncodedCommand;

// Broadlink counts in 2^-15 s units, µs * 269 / 8192 is close enough
fn to_ticks(duration: Duration) -> u16 {
    (duration.as_micros() as f64 * 269.0 / 8192.0).round() as u16
}

fn from_ticks(ticks: u16) -> Duration {
    Duration::from_nanos((ticks as f64 * 8_192_000.0 / 269.0).round() as u64)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transport {
    Ir = 0x26,
    Rf433 = 0xb2,
    Rf315 = 0xd7,
}

/*
Offset  Contents
0x00    0x26 = IR, 0xb2 for RF 433Mhz, 0xd7 for RF 315Mhz
0x01    repeat count, (0 = no repeat, 1 send twice, .....)
0x02-03 Length of the following data in little endian
0x04 .. Pulse lengths in ticks, one byte each, or 0x00 followed by a big endian u16
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recording {
    pub repeat_count: u8,
    pub transport: Transport,
    // Mark, space, mark, ...
    pub pulses: Vec<Duration>,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid transport type: {0}")]
    InvalidTransport(u8),
    #[error("packet ended before its declared length")]
    Truncated,
}

impl From<&EncodedCommand> for Recording {
    fn from(command: &EncodedCommand) -> Self {
        Recording::new_ir(command.pulses.clone())
    }
}

impl Recording {
    pub fn new_ir(pulses: Vec<Duration>) -> Self {
        Self {
            repeat_count: 0,
            transport: Transport::Ir,
            pulses,
        }
    }

    /// `+mark -space ...` in microseconds, as IrScrutinizer and irp print them.
    pub fn to_raw_format(&self) -> String {
        self.pulses
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let sign = if i % 2 == 0 { '+' } else { '-' };
                format!("{}{}", sign, p.as_micros())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut pulses_buf = BytesMut::with_capacity(self.pulses.len());
        for &pulse in &self.pulses {
            match to_ticks(pulse) {
                ticks @ 1..=255 => pulses_buf.put_u8(ticks as u8),
                ticks => {
                    pulses_buf.put_u8(0);
                    pulses_buf.put_u16(ticks);
                }
            }
        }

        let mut b = BytesMut::with_capacity(4 + pulses_buf.len());
        b.put_u8(self.transport as u8);
        b.put_u8(self.repeat_count);
        b.put_u16_le(pulses_buf.len() as _);
        b.put(pulses_buf);
        b.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> Result<Self, ParseError> {
        if buf.remaining() < 4 {
            return Err(ParseError::Truncated);
        }

        let transport = match buf.get_u8() {
            0x26 => Transport::Ir,
            0xb2 => Transport::Rf433,
            0xd7 => Transport::Rf315,
            x => return Err(ParseError::InvalidTransport(x)),
        };

        let repeat_count = buf.get_u8();
        let length = buf.get_u16_le() as usize;
        if buf.remaining() < length {
            return Err(ParseError::Truncated);
        }
        let mut data = buf.split_to(length);

        let mut pulses = Vec::with_capacity(length);
        while data.has_remaining() {
            let ticks = match data.get_u8() {
                0 if data.remaining() >= 2 => data.get_u16(),
                0 => return Err(ParseError::Truncated),
                ticks => ticks as u16,
            };
            pulses.push(from_ticks(ticks));
        }

        Ok(Recording {
            repeat_count,
            transport,
            pulses,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::daikin::{encode, ClimateState, Model, Phy};
    use hex_literal::hex;

    #[test]
    fn test_ticks() {
        assert_eq!(to_ticks(Duration::from_micros(520)), 17);
        assert_eq!(to_ticks(Duration::from_micros(3360)), 110);
        assert_eq!(to_ticks(Duration::from_micros(32300)), 1061);
        assert_eq!(from_ticks(17).as_micros(), 517);
    }

    #[test]
    fn test_to_bytes() {
        let recording = Recording::new_ir([3360, 1760, 520, 32300, 520].map(Duration::from_micros).to_vec());
        assert_eq!(
            recording.to_bytes().as_ref(),
            hex!("2600 0700 6e 3a 11 000425 11")
        );
        assert_eq!(recording.to_raw_format(), "+3360 -1760 +520 -32300 +520");
    }

    #[test]
    fn test_command_survives_broadlink() {
        let command = encode(&ClimateState::new(Model::Arc470a1), Model::Arc470a1);
        let bytes = Recording::from(&command).to_bytes();

        let recording = Recording::from_bytes(bytes).unwrap();
        assert_eq!(recording.transport, Transport::Ir);
        assert_eq!(recording.pulses.len(), command.pulses.len());

        let frames = Phy::new().decode(recording.pulses.into_iter()).unwrap();
        assert_eq!(frames.concat(), command.bytes());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Recording::from_bytes(Bytes::copy_from_slice(&hex!("99000000"))),
            Err(ParseError::InvalidTransport(0x99))
        );
        assert_eq!(
            Recording::from_bytes(Bytes::copy_from_slice(&hex!("2600050011"))),
            Err(ParseError::Truncated)
        );
        assert_eq!(
            Recording::from_bytes(Bytes::copy_from_slice(&hex!("260002001100"))),
            Err(ParseError::Truncated)
        );
    }
}
