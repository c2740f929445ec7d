use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use spinefit_body::MonitorParams;
use spinefit_sensor::SensorParams;

use crate::{
    AgentError, AgentId, AgentParams, BodyParams, ClockParams, PolicyKind, PostureCatalog,
    PostureGenerator, RaceCoordinator, Rig, SolverAgent, Trainer,
};

/// Every tunable of a race or training run.
///
/// All sections have defaults, so an empty JSON object is a valid
/// configuration.
///
/// ```
/// use spinefit_agent::SpinefitConfig;
///
/// let config: SpinefitConfig = serde_json::from_str(r#"{"agent_count": 2}"#).unwrap();
/// assert_eq!(config.agent_count, 2);
/// assert_eq!(config.agent.max_steps, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinefitConfig {
    pub clock: ClockParams,
    pub body: BodyParams,
    pub sensor: SensorParams,
    pub agent: AgentParams,
    pub policy: PolicyKind,
    /// Presets to draw targets from; the built-in catalog when absent.
    pub catalog: Option<PostureCatalog>,
    pub monitor: MonitorParams,
    pub agent_count: usize,
    /// Joint slots of the pose sink the winner is copied into.
    pub visualization_slots: usize,
}

impl Default for SpinefitConfig {
    fn default() -> Self {
        Self {
            clock: ClockParams::default(),
            body: BodyParams::default(),
            sensor: SensorParams::default(),
            agent: AgentParams::default(),
            policy: PolicyKind::default(),
            catalog: None,
            monitor: MonitorParams::default(),
            agent_count: 6,
            visualization_slots: 13,
        }
    }
}

impl SpinefitConfig {
    pub fn rig(&self) -> Result<Rig, AgentError> {
        Rig::new(&self.body, self.sensor.clone())
    }

    #[must_use]
    pub fn catalog_for(&self, rig: &Rig) -> PostureCatalog {
        self.catalog
            .clone()
            .unwrap_or_else(|| PostureCatalog::standard(rig.controlled_count()))
    }

    pub fn generator(&self, rig: &Rig, seed: u64) -> Result<PostureGenerator, AgentError> {
        PostureGenerator::new(
            rig.body().clone(),
            rig.sensor().clone(),
            self.catalog_for(rig),
            seed,
        )
    }

    #[must_use]
    pub fn agent(&self, rig: &Rig, id: AgentId, seed: u64) -> SolverAgent {
        SolverAgent::new(
            id,
            rig.body().clone(),
            rig.sensor().clone(),
            self.agent.clone(),
            &self.clock,
            self.policy.build(seed),
        )
    }

    /// Builds a coordinator with `agent_count` agents, all seeded from `seed`.
    pub fn coordinator(&self, seed: u64) -> Result<RaceCoordinator, AgentError> {
        let rig = self.rig()?;
        let mut seeds = Pcg32::seed_from_u64(seed);
        let generator = self.generator(&rig, seeds.random())?;
        let agents = (0..self.agent_count)
            .map(|i| self.agent(&rig, AgentId(i), seeds.random()))
            .collect();
        let sink = vec![Vector3::zeros(); self.visualization_slots];
        Ok(RaceCoordinator::new(generator, agents, sink))
    }

    pub fn trainer(&self, seed: u64) -> Result<Trainer, AgentError> {
        let rig = self.rig()?;
        let mut seeds = Pcg32::seed_from_u64(seed);
        let generator = self.generator(&rig, seeds.random())?;
        let agent = self.agent(&rig, AgentId(0), seeds.random());
        if let Some(err) = agent.fault() {
            return Err(err.clone());
        }
        Trainer::new(generator, agent)
    }
}
