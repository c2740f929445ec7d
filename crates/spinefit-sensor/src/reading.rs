use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};

use crate::Channel;

/// One force value per channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReading([f32; Channel::LEN]);

impl SensorReading {
    pub const ZERO: Self = Self([0.0; Channel::LEN]);

    #[must_use]
    pub const fn new(values: [f32; Channel::LEN]) -> Self {
        Self(values)
    }

    #[must_use]
    pub const fn values(&self) -> &[f32; Channel::LEN] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.iter().copied().zip(self.0.iter().copied())
    }

    /// Sum of absolute per-channel differences.
    #[must_use]
    pub fn total_abs_error(&self, other: &Self) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| (a - b).abs()).sum()
    }

    /// Largest absolute per-channel difference.
    #[must_use]
    pub fn max_abs_diff(&self, other: &Self) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }

    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl Index<Channel> for SensorReading {
    type Output = f32;

    fn index(&self, channel: Channel) -> &Self::Output {
        &self.0[channel.index()]
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (channel, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{channel}={value:.3}")?;
        }
        Ok(())
    }
}

/// The reading a solver must reproduce.
///
/// Captured once per race right after a posture has settled, then only read.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetVector(SensorReading);

impl TargetVector {
    #[must_use]
    pub const fn new(reading: SensorReading) -> Self {
        Self(reading)
    }

    #[must_use]
    pub const fn reading(&self) -> &SensorReading {
        &self.0
    }

    /// Total absolute error of `current` against this target.
    #[must_use]
    pub fn error(&self, current: &SensorReading) -> f32 {
        current.total_abs_error(&self.0)
    }
}

impl fmt::Display for TargetVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
