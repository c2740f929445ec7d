use std::sync::Arc;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use spinefit_body::SurfaceMesh;

use crate::{Channel, SampleSets, SensorError, SensorReading};

/// Gain applied to the two diagonal shoulder channels (orange and cyan).
///
/// Their strips run across the back and pick up lateral motion that the
/// vertical strips do not, so they read about three times hotter for the
/// same posture. Empirically tuned.
pub const LATERAL_CHANNEL_GAIN: f32 = 1.0 / 3.0;

/// Historic purple-only gain from before mirror pairing made the purple
/// strip geometrically symmetric with blue. Not applied by default.
pub const LEGACY_PURPLE_GAIN: f32 = 45.0 / 25.0;

/// Per-channel multiplier applied on top of the global sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelGains([f32; Channel::LEN]);

impl Default for ChannelGains {
    fn default() -> Self {
        Self::uniform(1.0)
            .with(Channel::Orange, LATERAL_CHANNEL_GAIN)
            .with(Channel::Cyan, LATERAL_CHANNEL_GAIN)
    }
}

impl ChannelGains {
    #[must_use]
    pub const fn uniform(gain: f32) -> Self {
        Self([gain; Channel::LEN])
    }

    #[must_use]
    pub const fn with(mut self, channel: Channel, gain: f32) -> Self {
        self.0[channel.index()] = gain;
        self
    }

    #[must_use]
    pub const fn get(&self, channel: Channel) -> f32 {
        self.0[channel.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorParams {
    pub sensitivity: f32,
    pub max_force: f32,
    pub gains: ChannelGains,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            max_force: 10.0,
            gains: ChannelGains::default(),
        }
    }
}

/// Converts a change in path length into a force.
///
/// Shrinking never produces force, and the result always lies in
/// `[0, max_force]`, including for non-finite inputs.
///
/// ```
/// use spinefit_sensor::stretch_force;
///
/// assert_eq!(stretch_force(2.0, 5.0, 1.0, 1.0, 10.0), 3.0);
/// assert_eq!(stretch_force(2.0, 1.0, 1.0, 1.0, 10.0), 0.0);
/// assert_eq!(stretch_force(2.0, 50.0, 1.0, 1.0, 10.0), 10.0);
/// ```
#[must_use]
pub fn stretch_force(
    rest_length: f32,
    current_length: f32,
    sensitivity: f32,
    gain: f32,
    max_force: f32,
) -> f32 {
    let stretch = (current_length - rest_length).max(0.0);
    // f32::max/min drop a NaN operand, so NaN collapses to 0.
    (stretch * sensitivity * gain).max(0.0).min(max_force.max(0.0))
}

/// Rest lengths and gains for all channels.
///
/// The model holds no geometry of its own: every call reads whatever
/// positions it is given, typically the settled positions of a
/// [`Body`](spinefit_body::Body). The sample sets are shared between all
/// models built from the same surface.
#[derive(Debug, Clone)]
pub struct SensorModel {
    sets: Arc<SampleSets>,
    rest_lengths: [f32; Channel::LEN],
    params: SensorParams,
}

impl SensorModel {
    pub fn new(
        sets: Arc<SampleSets>,
        rest_positions: &[Point3<f32>],
        params: SensorParams,
    ) -> Result<Self, SensorError> {
        if let Some(index) = sets.max_index()
            && index >= rest_positions.len()
        {
            return Err(SensorError::VertexOutOfRange {
                index,
                len: rest_positions.len(),
            });
        }
        let rest_lengths = Channel::ALL.map(|c| sets.get(c).path_length(rest_positions));
        Ok(Self {
            sets,
            rest_lengths,
            params,
        })
    }

    /// Classifies the mesh's colour tags and measures rest lengths on its
    /// rest positions.
    pub fn from_mesh(mesh: &SurfaceMesh, params: SensorParams) -> Result<Self, SensorError> {
        let rest = mesh.rest_positions();
        let sets = SampleSets::classify(mesh.colors(), &rest)?;
        Self::new(Arc::new(sets), &rest, params)
    }

    #[must_use]
    pub fn sample_sets(&self) -> &Arc<SampleSets> {
        &self.sets
    }

    #[must_use]
    pub fn params(&self) -> &SensorParams {
        &self.params
    }

    #[must_use]
    pub fn rest_length(&self, channel: Channel) -> f32 {
        self.rest_lengths[channel.index()]
    }

    /// Force on one channel for the given positions. Empty channels read 0.
    #[must_use]
    pub fn force(&self, channel: Channel, positions: &[Point3<f32>]) -> f32 {
        let set = self.sets.get(channel);
        if set.is_empty() {
            return 0.0;
        }
        stretch_force(
            self.rest_length(channel),
            set.path_length(positions),
            self.params.sensitivity,
            self.params.gains.get(channel),
            self.params.max_force,
        )
    }

    #[must_use]
    pub fn sample(&self, positions: &[Point3<f32>]) -> SensorReading {
        SensorReading::new(Channel::ALL.map(|c| self.force(c, positions)))
    }
}
