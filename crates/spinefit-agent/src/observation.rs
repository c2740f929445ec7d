use nalgebra::Vector3;
use spinefit_body::normalized_rotation;
use spinefit_sensor::{Channel, SensorReading, TargetVector};

/// Multiplier applied to forces before clamping into `[0, OBSERVATION_SCALE]`.
pub const OBSERVATION_SCALE: f32 = 10.0;

/// Length of an observation for a spine with `controlled` driven joints.
#[must_use]
pub const fn observation_len(controlled: usize) -> usize {
    2 * Channel::LEN + 3 * controlled
}

/// Input vector handed to a [`Policy`](crate::Policy).
///
/// Layout: for every channel in [`Channel::ALL`] order the scaled current
/// force followed by the scaled target force, then for every controlled joint
/// its rotation folded into `(-1, 1]` as x, y, z.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    values: Vec<f32>,
}

impl Observation {
    pub fn new<I>(current: &SensorReading, target: &TargetVector, rotations: I) -> Self
    where
        I: IntoIterator<Item = Vector3<f32>>,
    {
        let mut values = Vec::with_capacity(2 * Channel::LEN);
        for channel in Channel::ALL {
            values.push(scale(current[channel]));
            values.push(scale(target.reading()[channel]));
        }
        for rotation in rotations {
            values.extend(normalized_rotation(&rotation).iter());
        }
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Scaled `(current, target)` force pairs, one per channel.
    pub fn forces(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.values[..2 * Channel::LEN]
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
    }

    #[must_use]
    pub fn joints(&self) -> &[f32] {
        &self.values[2 * Channel::LEN..]
    }

    /// Sum of per-channel differences, in unscaled force units.
    #[must_use]
    pub fn force_error(&self) -> f32 {
        self.forces().map(|(c, t)| (c - t).abs()).sum::<f32>() / OBSERVATION_SCALE
    }
}

fn scale(force: f32) -> f32 {
    (force * OBSERVATION_SCALE).max(0.0).min(OBSERVATION_SCALE)
}
