use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::AgentError;

/// Which rotation axes receive random variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    pub const ALL: Self = Self::new(true, true, true);
    pub const NONE: Self = Self::new(false, false, false);

    #[must_use]
    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    fn apply(self, v: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            if self.x { v.x } else { 0.0 },
            if self.y { v.y } else { 0.0 },
            if self.z { v.z } else { 0.0 },
        )
    }
}

/// A named preset: per controlled joint, a rotation offset from rest (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posture {
    pub name: String,
    pub offsets: Vec<Vector3<f32>>,
    /// Half-width of the uniform jitter added to each masked axis (degrees).
    #[serde(default)]
    pub variation: f32,
    #[serde(default = "default_axes")]
    pub axes: AxisMask,
}

fn default_axes() -> AxisMask {
    AxisMask::ALL
}

impl Posture {
    /// Rotation for the `k`-th controlled joint: rest plus offset plus jitter.
    pub fn joint_rotation<R>(&self, k: usize, rest: Vector3<f32>, rng: &mut R) -> Vector3<f32>
    where
        R: Rng + ?Sized,
    {
        let offset = self.offsets.get(k).copied().unwrap_or_else(Vector3::zeros);
        rest + offset + self.jitter(rng)
    }

    fn jitter<R>(&self, rng: &mut R) -> Vector3<f32>
    where
        R: Rng + ?Sized,
    {
        let range = self.variation.abs();
        if !range.is_finite() || range == 0.0 {
            return Vector3::zeros();
        }
        let raw = Vector3::new(
            rng.random_range(-range..=range),
            rng.random_range(-range..=range),
            rng.random_range(-range..=range),
        );
        self.axes.apply(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostureCatalog {
    postures: Vec<Posture>,
}

impl PostureCatalog {
    pub fn new(postures: Vec<Posture>) -> Result<Self, AgentError> {
        if postures.is_empty() {
            return Err(AgentError::EmptyCatalog);
        }
        Ok(Self { postures })
    }

    /// The built-in presets for a spine with `controlled` driven joints.
    ///
    /// Joints are split bottom-up into lumbar, thoracic and cervical thirds.
    /// Every offset stays inside the rotation window the agents search, so
    /// each preset is reachable.
    #[must_use]
    pub fn standard(controlled: usize) -> Self {
        let region = |k: usize| {
            #[expect(clippy::cast_precision_loss)]
            let t = k as f32 / controlled.max(1) as f32;
            if t < 0.35 {
                Region::Lumbar
            } else if t < 0.75 {
                Region::Thoracic
            } else {
                Region::Cervical
            }
        };
        let build = |name: &str, variation: f32, axes: AxisMask, f: &dyn Fn(Region) -> [f32; 3]| {
            Posture {
                name: name.to_owned(),
                offsets: (0..controlled)
                    .map(|k| Vector3::from(f(region(k))))
                    .collect(),
                variation,
                axes,
            }
        };
        let postures = vec![
            build("kyphosis", 3.0, AxisMask::new(true, false, false), &|r| match r {
                Region::Thoracic => [12.0, 0.0, 0.0],
                _ => [0.0; 3],
            }),
            build("forward_head", 3.0, AxisMask::new(true, false, true), &|r| match r {
                Region::Cervical => [15.0, 0.0, 0.0],
                Region::Thoracic => [4.0, 0.0, 0.0],
                Region::Lumbar => [0.0; 3],
            }),
            build("slouch", 2.0, AxisMask::ALL, &|_| [7.0, 0.0, 0.0]),
            build("lean_left", 2.0, AxisMask::new(true, false, true), &|r| match r {
                Region::Cervical => [0.0; 3],
                _ => [3.0, 0.0, 6.0],
            }),
            build("lean_right", 2.0, AxisMask::new(true, false, true), &|r| match r {
                Region::Cervical => [0.0; 3],
                _ => [3.0, 0.0, -6.0],
            }),
            build("twisted_slouch", 1.0, AxisMask::new(true, true, false), &|r| match r {
                Region::Thoracic => [8.0, 2.0, 0.0],
                _ => [0.0; 3],
            }),
        ];
        Self { postures }
    }

    /// Checks every preset carries one offset per controlled joint.
    pub fn validate(&self, controlled: usize) -> Result<(), AgentError> {
        if self.postures.is_empty() {
            return Err(AgentError::EmptyCatalog);
        }
        if let Some(bad) = self.postures.iter().find(|p| p.offsets.len() != controlled) {
            return Err(AgentError::PostureShape {
                name: bad.name.clone(),
                got: bad.offsets.len(),
                expected: controlled,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn postures(&self) -> &[Posture] {
        &self.postures
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.postures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.postures.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Posture> {
        self.postures.get(index)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.postures.iter().position(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Lumbar,
    Thoracic,
    Cervical,
}
