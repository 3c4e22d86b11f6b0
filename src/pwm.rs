/** Classifies measured mark/space durations into symbolic pulse types, with per-rule tolerance */
use std::{collections::HashMap, hash::Hash, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rule {
    pub duration: Duration,
    pub tolerance: Duration,
}

impl Rule {
    pub fn new(duration: Duration) -> Self {
        // 25% tolerance, same window IR receivers usually accept
        Self {
            duration,
            tolerance: duration / 4,
        }
    }

    pub fn with_tolerance(duration: Duration, tolerance: Duration) -> Self {
        Self {
            duration,
            tolerance,
        }
    }

    fn distance(&self, duration: Duration) -> Duration {
        self.duration
            .checked_sub(duration)
            .unwrap_or_else(|| duration - self.duration)
    }

    fn matches(&self, duration: Duration) -> bool {
        self.distance(duration) <= self.tolerance
    }
}

#[derive(Error, Debug, Copy, Clone)]
pub enum CodecError {
    #[error("invalid mark length: {0:?}")]
    InvalidMarkLength(Duration),

    #[error("invalid space length: {0:?}")]
    InvalidSpaceLength(Duration),

    #[error("odd number of pulses, the last mark has no space")]
    UnpairedPulse,
}

/// Marks (carrier on) and spaces (carrier off) are matched against separate
/// rule sets, so a short mark never classifies as a short space.
pub struct Codec<TPulse> {
    marks: HashMap<TPulse, Rule>,
    spaces: HashMap<TPulse, Rule>,
}

impl<T: Copy + Eq + Hash + std::fmt::Debug> Codec<T> {
    pub fn new(
        marks: impl Iterator<Item = (T, Rule)>,
        spaces: impl Iterator<Item = (T, Rule)>,
    ) -> Self {
        Self {
            marks: marks.collect(),
            spaces: spaces.collect(),
        }
    }

    /// Decode alternating durations, starting with a mark, into (mark, space) pairs.
    pub fn decode(
        &self,
        pulses: impl Iterator<Item = Duration>,
    ) -> Result<Vec<(T, T)>, CodecError> {
        let mut ret = Vec::new();
        let mut mark: Option<T> = None;

        for pulse in pulses {
            match mark.take() {
                Some(m) => ret.push((m, self.decode_space(pulse)?)),
                None => mark = Some(self.decode_mark(pulse)?),
            }
        }

        if mark.is_some() {
            return Err(CodecError::UnpairedPulse);
        }

        Ok(ret)
    }

    pub fn decode_mark(&self, pulse: Duration) -> Result<T, CodecError> {
        closest(&self.marks, pulse).ok_or(CodecError::InvalidMarkLength(pulse))
    }

    pub fn decode_space(&self, pulse: Duration) -> Result<T, CodecError> {
        closest(&self.spaces, pulse).ok_or(CodecError::InvalidSpaceLength(pulse))
    }
}

// Picks the nearest rule whose tolerance window contains the pulse.
fn closest<T: Copy>(rules: &HashMap<T, Rule>, pulse: Duration) -> Option<T> {
    rules
        .iter()
        .filter(|(_, r)| r.matches(pulse))
        .min_by_key(|(_, r)| r.distance(pulse))
        .map(|(p, _)| *p)
}
