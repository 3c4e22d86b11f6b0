use std::{
    fmt,
    io::{BufRead, BufReader, Stdin, Stdout, Write},
    str::FromStr,
};

use anyhow::anyhow;
use log::debug;
use thiserror::Error;

use crate::{
    broadlink::Recording,
    daikin::{EncodedCommand, Transmitter},
};

use super::codecs::{create_codec, Codec, CodecError, CodecType};

pub trait Device {
    type Error;

    fn send(&mut self, recording: &Recording) -> Result<(), Self::Error>;
    fn recv(&mut self) -> Result<Recording, Self::Error>;
}

impl<D: Device + ?Sized> Device for Box<D> {
    type Error = D::Error;

    fn send(&mut self, recording: &Recording) -> Result<(), Self::Error> {
        (**self).send(recording)
    }

    fn recv(&mut self) -> Result<Recording, Self::Error> {
        (**self).recv()
    }
}

/// Any device can carry the controller's commands, sent as a single IR recording.
impl<D> Transmitter for D
where
    D: Device + ?Sized,
    D::Error: fmt::Display,
{
    type Error = D::Error;

    fn transmit(&mut self, command: &EncodedCommand) -> Result<(), Self::Error> {
        let recording = Recording::from(command);
        debug!("sending {} pulses", recording.pulses.len());
        self.send(&recording)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    /// Read/write lines to stdin/stdout
    Lines { codec_type: CodecType },
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (device_type, args) = s.split_once(':').unwrap_or((s, ""));

        Ok(match device_type {
            "lines" => {
                if args.is_empty() {
                    return Err(anyhow!("missing codec type"));
                }
                DeviceType::Lines {
                    codec_type: CodecType::from_str(args)?,
                }
            }
            _ => return Err(anyhow!("unknown device type: {}", device_type)),
        })
    }
}

pub fn create_device(ty: DeviceType) -> Box<dyn Device<Error = DeviceError>> {
    match ty {
        DeviceType::Lines { codec_type } => Box::new(Lines::<BufReader<Stdin>, Stdout>::stdio(codec_type)),
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("EOF")]
    EOF,
}

/// One recording per line, in the codec's text form.
pub struct Lines<R, W> {
    codec: Box<dyn Codec<Error = CodecError>>,
    reader: R,
    writer: W,
}

impl Lines<BufReader<Stdin>, Stdout> {
    pub fn stdio(codec_type: CodecType) -> Self {
        Lines::new(
            codec_type,
            BufReader::new(std::io::stdin()),
            std::io::stdout(),
        )
    }
}

impl<R: BufRead, W: Write> Lines<R, W> {
    pub fn new(codec_type: CodecType, reader: R, writer: W) -> Self {
        Self {
            codec: create_codec(codec_type),
            reader,
            writer,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<R: BufRead, W: Write> Device for Lines<R, W> {
    type Error = DeviceError;

    fn send(&mut self, recording: &Recording) -> Result<(), Self::Error> {
        let encoded = self.codec.encode(recording)?;
        writeln!(self.writer, "{}", encoded)?;
        self.writer.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Recording, Self::Error> {
        loop {
            let mut input = String::new();
            if self.reader.read_line(&mut input)? == 0 {
                return Err(DeviceError::EOF);
            }

            let line = input.trim();
            // Blank lines and comments between captures
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok(self.codec.decode(line)?);
        }
    }
}
