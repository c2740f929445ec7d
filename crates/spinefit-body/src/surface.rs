use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::{BodyError, JointChain};

/// A tracked point on the body surface.
///
/// `position` is the rest-pose world position. `color` is the RGB tag that
/// assigns the vertex to a sensor strip (or to none). `joint` is the index of
/// the joint the vertex is rigidly bound to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceVertex {
    pub position: Point3<f32>,
    pub color: [f32; 3],
    pub joint: usize,
}

/// Untagged skin colour.
pub const SKIN_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMesh {
    vertices: Vec<SurfaceVertex>,
}

impl SurfaceMesh {
    #[must_use]
    pub fn new(vertices: Vec<SurfaceVertex>) -> Self {
        Self { vertices }
    }

    pub fn push(&mut self, vertex: SurfaceVertex) {
        self.vertices.push(vertex);
    }

    #[must_use]
    pub fn vertices(&self) -> &[SurfaceVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn colors(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.iter().map(|v| v.color)
    }

    #[must_use]
    pub fn rest_positions(&self) -> Vec<Point3<f32>> {
        self.vertices.iter().map(|v| v.position).collect()
    }
}

/// Surface vertices expressed in the local frame of their bound joint.
///
/// Binding happens once against the chain's rest pose; deformation then
/// applies each joint's current world transform to its bound vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedSurface {
    bindings: Vec<(usize, Point3<f32>)>,
}

impl SkinnedSurface {
    pub fn bind(mesh: &SurfaceMesh, chain: &JointChain) -> Result<Self, BodyError> {
        let rest = chain.rest_world_transforms();
        let bindings = mesh
            .vertices()
            .iter()
            .enumerate()
            .map(|(vertex, v)| {
                let joint_pose = rest.get(v.joint).ok_or(BodyError::VertexJointOutOfRange {
                    vertex,
                    joint: v.joint,
                    len: chain.len(),
                })?;
                Ok((v.joint, joint_pose.inverse_transform_point(&v.position)))
            })
            .collect::<Result<_, BodyError>>()?;
        Ok(Self { bindings })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Writes the deformed world positions for the chain's current pose.
    pub fn deform_into(&self, chain: &JointChain, out: &mut Vec<Point3<f32>>) {
        let transforms = chain.world_transforms();
        out.clear();
        out.extend(
            self.bindings
                .iter()
                .map(|(joint, local)| transforms[*joint] * local),
        );
    }

    #[must_use]
    pub fn deform(&self, chain: &JointChain) -> Vec<Point3<f32>> {
        let mut out = Vec::with_capacity(self.bindings.len());
        self.deform_into(chain, &mut out);
        out
    }
}
