use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use spinefit_body::Body;
use spinefit_sensor::{SensorModel, TargetVector};
use tracing::{debug, warn};

use crate::{AgentError, PostureCatalog, Tick, TickClock, TickKind};

/// Largest surface lag, in template units, accepted as settled.
pub const SETTLE_TOLERANCE: f32 = 1e-4;

/// Simulation ticks to wait for settling before the surface is snapped.
pub const MAX_SETTLE_TICKS: u32 = 600;

/// Outcome of one posture generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTarget {
    pub posture: String,
    pub target: TargetVector,
    /// Applied rotation of every controlled joint, in controlled order.
    pub rotations: Vec<Vector3<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Controlled joints were reset; the preset is applied on the next render tick.
    AwaitReset { posture: Option<usize> },
    /// Preset applied; waiting for the geometry to settle.
    AwaitSimulation { posture: usize, ticks: u32 },
    /// Geometry settled; readings are captured on the next render tick.
    AwaitCapture { posture: usize },
}

/// Produces target readings by bending a private spine into preset postures.
///
/// Call [`begin`](Self::begin) (or [`begin_named`](Self::begin_named)) and
/// feed ticks to [`on_tick`](Self::on_tick) until it yields a target:
///
/// 1. reset the controlled joints to rest
/// 2. on the next render tick pick a preset and apply rest + offset + jitter
/// 3. wait for simulation ticks until the surface has settled
/// 4. on the following render tick sample all channels
///
/// With a body `settle_rate` of 1 the wait is a single simulation tick.
#[derive(Debug, Clone)]
pub struct PostureGenerator {
    body: Body,
    sensor: SensorModel,
    catalog: PostureCatalog,
    controlled: Vec<usize>,
    rng: Pcg32,
    phase: Phase,
    last: Option<GeneratedTarget>,
}

impl PostureGenerator {
    pub fn new(
        body: Body,
        sensor: SensorModel,
        catalog: PostureCatalog,
        seed: u64,
    ) -> Result<Self, AgentError> {
        let controlled = body.chain().controlled_joints();
        catalog.validate(controlled.len())?;
        if sensor.sample_sets().is_unassigned() {
            return Err(AgentError::UnassignedSensor);
        }
        Ok(Self {
            body,
            sensor,
            catalog,
            controlled,
            rng: Pcg32::seed_from_u64(seed),
            phase: Phase::Idle,
            last: None,
        })
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn catalog(&self) -> &PostureCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// The most recently generated target, if any.
    #[must_use]
    pub fn last_target(&self) -> Option<&GeneratedTarget> {
        self.last.as_ref()
    }

    /// Starts a generation with a randomly chosen preset.
    ///
    /// A generation already in progress is abandoned.
    pub fn begin(&mut self) -> Result<(), AgentError> {
        self.start(None)
    }

    pub fn begin_named(&mut self, name: &str) -> Result<(), AgentError> {
        let index = self
            .catalog
            .position(name)
            .ok_or_else(|| AgentError::UnknownPosture {
                name: name.to_owned(),
            })?;
        self.start(Some(index))
    }

    fn start(&mut self, posture: Option<usize>) -> Result<(), AgentError> {
        self.body.chain_mut().reset_joints(&self.controlled)?;
        self.phase = Phase::AwaitReset { posture };
        Ok(())
    }

    pub fn on_tick(&mut self, tick: Tick) -> Result<Option<GeneratedTarget>, AgentError> {
        if tick.kind.is_simulation() {
            self.body.step_simulation();
        }
        match (self.phase, tick.kind) {
            (Phase::AwaitReset { posture }, TickKind::Render) => {
                let index =
                    posture.unwrap_or_else(|| self.rng.random_range(0..self.catalog.len()));
                self.apply(index)?;
                self.phase = Phase::AwaitSimulation {
                    posture: index,
                    ticks: 0,
                };
                Ok(None)
            }
            (Phase::AwaitSimulation { posture, ticks }, TickKind::Simulation) => {
                let ticks = ticks + 1;
                if self.body.is_settled(SETTLE_TOLERANCE) {
                    self.phase = Phase::AwaitCapture { posture };
                } else if ticks >= MAX_SETTLE_TICKS {
                    warn!(
                        ticks,
                        lag = self.body.settle_error(),
                        "surface did not settle, snapping to pose"
                    );
                    self.body.snap_to_pose();
                    self.phase = Phase::AwaitCapture { posture };
                } else {
                    self.phase = Phase::AwaitSimulation { posture, ticks };
                }
                Ok(None)
            }
            (Phase::AwaitCapture { posture }, TickKind::Render) => {
                self.phase = Phase::Idle;
                let generated = self.capture(posture);
                self.last = Some(generated.clone());
                Ok(Some(generated))
            }
            _ => Ok(None),
        }
    }

    /// Runs a whole generation by pulling ticks from `clock`.
    pub fn generate(&mut self, clock: &mut TickClock) -> Result<GeneratedTarget, AgentError> {
        self.begin()?;
        self.drive(clock)
    }

    pub fn generate_named(
        &mut self,
        clock: &mut TickClock,
        name: &str,
    ) -> Result<GeneratedTarget, AgentError> {
        self.begin_named(name)?;
        self.drive(clock)
    }

    fn drive(&mut self, clock: &mut TickClock) -> Result<GeneratedTarget, AgentError> {
        loop {
            if let Some(generated) = self.on_tick(clock.next_tick())? {
                return Ok(generated);
            }
        }
    }

    fn apply(&mut self, index: usize) -> Result<(), AgentError> {
        let Some(posture) = self.catalog.get(index) else {
            return Err(AgentError::EmptyCatalog);
        };
        let chain = self.body.chain_mut();
        for (k, &joint) in self.controlled.iter().enumerate() {
            let rest = chain.rest_rotation(joint).unwrap_or_else(Vector3::zeros);
            let rotation = posture.joint_rotation(k, rest, &mut self.rng);
            chain.set_rotation(joint, rotation)?;
        }
        debug!(posture = %posture.name, "posture applied");
        Ok(())
    }

    fn capture(&self, index: usize) -> GeneratedTarget {
        let reading = self.sensor.sample(self.body.positions());
        let posture = self
            .catalog
            .get(index)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        if reading.is_all_zero() {
            warn!(%posture, "generated target has no stretch on any channel");
        }
        debug!(%posture, target = %reading, "target captured");
        let chain = self.body.chain();
        let rotations = self
            .controlled
            .iter()
            .filter_map(|&j| chain.rotation(j))
            .collect();
        GeneratedTarget {
            posture,
            target: TargetVector::new(reading),
            rotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use spinefit_body::TorsoTemplate;
    use spinefit_sensor::SensorParams;

    use super::*;

    fn generator(seed: u64) -> PostureGenerator {
        generator_with_settle_rate(seed, 1.0)
    }

    fn generator_with_settle_rate(seed: u64, settle_rate: f32) -> PostureGenerator {
        let (chain, mesh) = TorsoTemplate::default().build().unwrap();
        let sensor = SensorModel::from_mesh(&mesh, SensorParams::default()).unwrap();
        let body = Body::new(chain, &mesh, settle_rate).unwrap();
        let catalog = PostureCatalog::standard(body.chain().controlled_joints().len());
        PostureGenerator::new(body, sensor, catalog, seed).unwrap()
    }

    #[test]
    fn test_generation_takes_one_render_simulation_render_sequence() {
        let mut generator = generator(1);
        generator.begin().unwrap();
        let mut clock = TickClock::new();
        // frame 0: simulation (nothing pending), render (apply)
        assert_eq!(generator.on_tick(clock.next_tick()).unwrap(), None);
        assert_eq!(generator.on_tick(clock.next_tick()).unwrap(), None);
        // frame 1: simulation (settle), render (capture)
        assert_eq!(generator.on_tick(clock.next_tick()).unwrap(), None);
        let generated = generator.on_tick(clock.next_tick()).unwrap().unwrap();
        assert!(!generator.is_busy());
        assert_eq!(generated.rotations.len(), 13);
        assert!(!generated.target.reading().is_all_zero());
    }

    #[test]
    fn test_soft_body_waits_until_settled() {
        let stiff = generator(9)
            .generate_named(&mut TickClock::new(), "slouch")
            .unwrap();

        let mut soft = generator_with_settle_rate(9, 0.05);
        let mut clock = TickClock::new();
        let generated = soft.generate_named(&mut clock, "slouch").unwrap();
        assert!(clock.frame() > 10);
        assert!(soft.body().is_settled(SETTLE_TOLERANCE));
        assert_eq!(generated.rotations, stiff.rotations);
        assert!(
            generated.target.error(stiff.target.reading()) < 5e-2,
            "{} vs {}",
            generated.target,
            stiff.target
        );
    }

    #[test]
    fn test_unsettled_surface_is_snapped() {
        let mut soft = generator_with_settle_rate(9, f32::EPSILON);
        let mut clock = TickClock::new();
        let generated = soft.generate_named(&mut clock, "slouch").unwrap();
        assert!(clock.frame() >= u64::from(MAX_SETTLE_TICKS));
        assert!(soft.body().is_settled(SETTLE_TOLERANCE));
        assert!(!generated.target.reading().is_all_zero());
    }

    #[test]
    fn test_same_seed_same_target() {
        let a = generator(42).generate(&mut TickClock::new()).unwrap();
        let b = generator(42).generate(&mut TickClock::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_generation_covers_catalog() {
        let mut generator = generator(13);
        let mut clock = TickClock::new();
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..120 {
            seen.insert(generator.generate(&mut clock).unwrap().posture);
        }
        let all: std::collections::BTreeSet<String> = generator
            .catalog()
            .postures()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(seen, all);
    }

    #[test]
    fn test_named_generation() {
        let mut generator = generator(3);
        let generated = generator
            .generate_named(&mut TickClock::new(), "kyphosis")
            .unwrap();
        assert_eq!(generated.posture, "kyphosis");
        assert_eq!(generator.last_target(), Some(&generated));
        assert_eq!(
            generator.begin_named("handstand"),
            Err(AgentError::UnknownPosture {
                name: "handstand".into()
            })
        );
    }

    #[test]
    fn test_repeated_generation_resets_first() {
        let mut generator = generator(5);
        let mut clock = TickClock::new();
        let first = generator.generate_named(&mut clock, "slouch").unwrap();
        let again = generator.generate_named(&mut clock, "kyphosis").unwrap();
        assert_eq!(again.posture, "kyphosis");
        assert_ne!(first.target, again.target);
    }
}
