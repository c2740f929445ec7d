//! Stretch-sensor model for the tagged body surface.
//!
//! Eight independent channels each watch one strip of surface points. A
//! channel's force is how much longer its strip currently is than at rest,
//! scaled and clamped:
//!
//! ```text
//! force = clamp(max(0, current_length - rest_length) * sensitivity * gain, 0, max_force)
//! ```
//!
//! The length is a phenomenological proxy for stretch, not an elastic
//! simulation.
//!
//! - [`Channel`] - The eight channels and the colour rules that assign points to them
//! - [`SampleSets`] - Ordered point indices per channel, with mirror pairing
//! - [`SensorModel`] - Rest lengths plus gains; turns positions into a [`SensorReading`]
//! - [`StabilityFilter`] - Bounded retry loop that waits for readings to converge
//!
//! # Example
//!
//! ```
//! use spinefit_body::{Body, TorsoTemplate};
//! use spinefit_sensor::{Channel, SensorModel, SensorParams};
//!
//! let (chain, mesh) = TorsoTemplate::default().build().unwrap();
//! let sensor = SensorModel::from_mesh(&mesh, SensorParams::default()).unwrap();
//! let body = Body::new(chain, &mesh, 1.0).unwrap();
//!
//! let reading = sensor.sample(body.positions());
//! assert_eq!(reading[Channel::Red], 0.0);
//! ```

pub use self::{channel::*, model::*, reading::*, sample_set::*, stability::*};

mod channel;
mod model;
mod reading;
mod sample_set;
mod stability;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SensorError {
    #[display("sample index {index} out of range for {len} surface points")]
    VertexOutOfRange { index: usize, len: usize },
}
