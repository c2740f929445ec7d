use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spinefit_body::{Body, TorsoTemplate};
use spinefit_sensor::{SampleSets, SensorModel, SensorParams};

use crate::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParams {
    pub template: TorsoTemplate,
    /// Fraction of the remaining surface motion applied per simulation tick.
    pub settle_rate: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            template: TorsoTemplate::default(),
            settle_rate: 1.0,
        }
    }
}

/// A prototype body and sensor model.
///
/// Every component that needs a spine clones its own copy from the rig; the
/// sample sets inside the sensor model are shared between clones.
#[derive(Debug, Clone)]
pub struct Rig {
    body: Body,
    sensor: SensorModel,
}

impl Rig {
    /// Builds the template and measures sensor rest lengths on the body's
    /// own rest geometry, so an undisturbed body reads exactly zero.
    pub fn new(body: &BodyParams, sensor: SensorParams) -> Result<Self, AgentError> {
        let (chain, mesh) = body.template.build()?;
        let body = Body::new(chain, &mesh, body.settle_rate)?;
        let rest = body.rest_positions();
        let sets = SampleSets::classify(mesh.colors(), rest)?;
        let sensor = SensorModel::new(Arc::new(sets), rest, sensor)?;
        Ok(Self { body, sensor })
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn sensor(&self) -> &SensorModel {
        &self.sensor
    }

    #[must_use]
    pub fn controlled_count(&self) -> usize {
        self.body.chain().controlled_joints().len()
    }
}
