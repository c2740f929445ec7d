use nalgebra::{Isometry3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{BodyError, angle::rotation_from_euler};

/// A single joint of the chain.
///
/// `offset` is the bone vector from the parent joint (or from the body origin
/// for the first joint), expressed in the parent's frame. `rotation` is the
/// local Euler rotation in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    pub offset: Vector3<f32>,
    pub rotation: Vector3<f32>,
}

impl Joint {
    #[must_use]
    pub fn new(name: impl Into<String>, offset: Vector3<f32>, rotation: Vector3<f32>) -> Self {
        Self {
            name: name.into(),
            offset,
            rotation,
        }
    }
}

/// An ordered chain of joints, each parented to the one before it.
///
/// The rotations present at construction time are captured once as the rest
/// pose. The rest pose is never mutated afterwards; it is the baseline for
/// [`Self::reset_to_rest`] and for clamping joint deltas.
///
/// # Controlled joints
///
/// Only every second joint (indices 0, 2, 4, ...) is driven independently.
/// The joints in between keep whatever rotation they have and follow their
/// parents rigidly. See [`Self::controlled_joints`].
///
/// # Example
///
/// ```
/// use nalgebra::Vector3;
/// use spinefit_body::{Joint, JointChain};
///
/// let joints = (0..4)
///     .map(|i| Joint::new(format!("j{i}"), Vector3::new(0.0, 1.0, 0.0), Vector3::zeros()))
///     .collect();
/// let mut chain = JointChain::new(joints).unwrap();
///
/// chain.set_rotation(2, Vector3::new(15.0, 0.0, 0.0)).unwrap();
/// chain.reset_to_rest();
/// assert_eq!(chain.rotation(2), Some(Vector3::zeros()));
/// assert_eq!(chain.controlled_joints(), vec![0, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JointChain {
    joints: Vec<Joint>,
    rest: Vec<Vector3<f32>>,
}

impl JointChain {
    /// Creates a chain and snapshots its current rotations as the rest pose.
    pub fn new(joints: Vec<Joint>) -> Result<Self, BodyError> {
        if joints.is_empty() {
            return Err(BodyError::EmptyChain);
        }
        let rest = joints.iter().map(|j| j.rotation).collect();
        Ok(Self { joints, rest })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Always `false`; construction rejects empty chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[must_use]
    pub fn rotation(&self, index: usize) -> Option<Vector3<f32>> {
        self.joints.get(index).map(|j| j.rotation)
    }

    #[must_use]
    pub fn rest_rotation(&self, index: usize) -> Option<Vector3<f32>> {
        self.rest.get(index).copied()
    }

    #[must_use]
    pub fn rest_rotations(&self) -> &[Vector3<f32>] {
        &self.rest
    }

    pub fn rotations(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.joints.iter().map(|j| j.rotation)
    }

    pub fn set_rotation(&mut self, index: usize, rotation: Vector3<f32>) -> Result<(), BodyError> {
        let len = self.joints.len();
        let joint = self
            .joints
            .get_mut(index)
            .ok_or(BodyError::JointOutOfRange { index, len })?;
        joint.rotation = rotation;
        Ok(())
    }

    /// Restores every joint to its rest rotation. Idempotent.
    pub fn reset_to_rest(&mut self) {
        for (joint, rest) in self.joints.iter_mut().zip(&self.rest) {
            joint.rotation = *rest;
        }
    }

    /// Restores the listed joints to their rest rotations.
    pub fn reset_joints(&mut self, indices: &[usize]) -> Result<(), BodyError> {
        for &index in indices {
            let rest = self.rest_rotation(index).ok_or(BodyError::JointOutOfRange {
                index,
                len: self.joints.len(),
            })?;
            self.set_rotation(index, rest)?;
        }
        Ok(())
    }

    /// Indices of the independently driven joints: every second joint,
    /// starting with the first.
    #[must_use]
    pub fn controlled_joints(&self) -> Vec<usize> {
        (0..self.joints.len()).step_by(2).collect()
    }

    /// World transform of every joint for the current rotations.
    #[must_use]
    pub fn world_transforms(&self) -> Vec<Isometry3<f32>> {
        forward_kinematics(self.joints.iter().map(|j| (&j.offset, &j.rotation)))
    }

    /// World transform of every joint for the rest pose.
    #[must_use]
    pub fn rest_world_transforms(&self) -> Vec<Isometry3<f32>> {
        forward_kinematics(self.joints.iter().zip(&self.rest).map(|(j, r)| (&j.offset, r)))
    }
}

fn forward_kinematics<'a, I>(segments: I) -> Vec<Isometry3<f32>>
where
    I: IntoIterator<Item = (&'a Vector3<f32>, &'a Vector3<f32>)>,
{
    let mut parent = Isometry3::identity();
    segments
        .into_iter()
        .map(|(offset, rotation)| {
            let local =
                Isometry3::from_parts(Translation3::from(*offset), rotation_from_euler(rotation));
            parent *= local;
            parent
        })
        .collect()
}
