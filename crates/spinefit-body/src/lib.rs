//! Articulated spine model: joint chain, skinned surface and settling body.
//!
//! This crate holds the geometric half of the system. Everything that reads
//! forces off the surface lives in `spinefit-sensor`; everything that moves
//! joints with intent lives in `spinefit-agent`.
//!
//! - [`JointChain`] - Ordered joints with local Euler rotations and a rest pose snapshot
//! - [`SurfaceMesh`] / [`SkinnedSurface`] - Colour-tagged surface points rigidly bound to joints
//! - [`Body`] - A chain plus its surface, whose geometry settles toward the joint pose
//!   one simulation tick at a time
//! - [`TorsoTemplate`] - Procedural torso with eight stretch strips on the back
//! - [`PostureMonitor`] - Regional curvature checks with hold timers
//!
//! # Example
//!
//! ```
//! use nalgebra::Vector3;
//! use spinefit_body::{Body, TorsoTemplate};
//!
//! let template = TorsoTemplate::default();
//! let mut body = Body::from_template(&template, 1.0).unwrap();
//!
//! body.chain_mut().set_rotation(4, Vector3::new(10.0, 0.0, 0.0)).unwrap();
//! body.step_simulation();
//!
//! assert_ne!(body.positions(), body.rest_positions());
//! ```

pub use self::{angle::*, body::*, joint_chain::*, monitor::*, surface::*, template::*};

mod angle;
mod body;
mod joint_chain;
mod monitor;
mod surface;
mod template;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BodyError {
    #[display("joint chain has no joints")]
    EmptyChain,
    #[display("joint index {index} out of range for a chain of {len} joints")]
    JointOutOfRange { index: usize, len: usize },
    #[display("surface vertex {vertex} is bound to joint {joint}, but the chain has {len} joints")]
    VertexJointOutOfRange {
        vertex: usize,
        joint: usize,
        len: usize,
    },
}
