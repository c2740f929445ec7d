//! The episodic solver agent.
//!
//! # Lifecycle
//!
//! ```text
//!            start()              pause elapsed
//!   Idle ──────────────→ Preparing ─────────────→ Running ──┬──→ Succeeded
//!    ↑                                             │  ↺     └──→ TimedOut
//!    └──────────── start() / cancel() ←────────────┴────────────────┘
//! ```
//!
//! An agent whose configuration is unusable (no controlled joints, no
//! assigned sensor channel) is built in the `Faulted` state and ignores
//! every request, so one broken agent never takes a race down with it.
//!
//! # Decision step
//!
//! A running agent alternates between three pending phases:
//!
//! 1. **Decide** (render tick) - build an [`Observation`], ask the policy for
//!    actions, smooth them against the previous actions and write
//!    `rest + smoothed * window` into every controlled joint
//! 2. **Await simulation** - the surface settles on the next simulation tick
//! 3. **Sample** (render ticks) - read the sensor through a
//!    [`StabilityFilter`] until it is stable or out of retries, then shape the
//!    reward and check for termination
//!
//! Termination is checked in order: success, step limit, stagnation
//! (training only). At most one fires per step.

use std::sync::mpsc::Sender;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use spinefit_body::{Body, normalized_rotation};
use spinefit_sensor::{SensorModel, SensorReading, StabilityFilter, StabilityParams, TargetVector};
use tracing::{debug, error, info, trace};

use crate::{
    AgentError, ClockParams, Observation, Policy, RewardParams, RewardShaper, Tick, TickKind,
    observation_len, sanitize_reward,
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("agent-{_0}")]
pub struct AgentId(pub usize);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Race mode: success is reported and the agent stops.
    #[default]
    Inference,
    /// Stagnation also ends an episode.
    Training,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    #[display("succeeded")]
    Succeeded,
    #[display("timed out")]
    TimedOut,
    #[display("stagnated")]
    Stagnated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum Lifecycle {
    #[display("idle")]
    Idle,
    #[display("faulted")]
    Faulted,
    #[display("preparing")]
    Preparing,
    #[display("running")]
    Running,
    #[display("succeeded")]
    Succeeded,
    /// Step limit or stagnation.
    #[display("timed out")]
    TimedOut,
}

/// Terminal outcome of one episode, sent over the agent's reporter channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReport {
    pub agent: AgentId,
    pub episode: u64,
    pub outcome: EpisodeOutcome,
    pub steps: u32,
    pub reading: SensorReading,
    pub total_error: f32,
    pub total_reward: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    pub max_steps: u32,
    /// An episode succeeds once the total error drops below this.
    pub success_threshold: f32,
    /// Weight of the new action in `lerp(previous, new, smoothing)`.
    pub smoothing: f32,
    /// Half-width of the reachable rotation around rest, per axis (degrees).
    pub rotation_window: Vector3<f32>,
    /// Consecutive steps without improvement tolerated in training mode.
    pub stagnation_limit: u32,
    /// Pause between start and the first decision (seconds).
    pub prepare_delay: f32,
    pub stability: StabilityParams,
    pub reward: RewardParams,
    /// Log every decision step at debug level.
    pub debug_steps: bool,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            max_steps: 500,
            success_threshold: 0.1,
            smoothing: 0.8,
            rotation_window: Vector3::new(20.0, 3.0, 10.0),
            stagnation_limit: 100,
            prepare_delay: 0.1,
            stability: StabilityParams::default(),
            reward: RewardParams::default(),
            debug_steps: false,
        }
    }
}

impl AgentParams {
    /// Success check used at every step.
    ///
    /// ```
    /// use spinefit_agent::AgentParams;
    ///
    /// let params = AgentParams::default();
    /// assert!(!params.is_successful(0.3));
    /// assert!(params.is_successful(0.05));
    /// ```
    #[must_use]
    pub fn is_successful(&self, total_error: f32) -> bool {
        total_error < self.success_threshold
    }
}

/// Per-episode mutable data.
#[derive(Debug, Clone)]
pub struct AgentState {
    episode: u64,
    target: TargetVector,
    step: u32,
    last_actions: Vec<Vector3<f32>>,
    reading: SensorReading,
    shaper: RewardShaper,
    last_reward: f32,
    total_reward: f32,
}

impl AgentState {
    fn new(controlled: usize, reward: RewardParams) -> Self {
        Self {
            episode: 0,
            target: TargetVector::default(),
            step: 0,
            last_actions: vec![Vector3::zeros(); controlled],
            reading: SensorReading::ZERO,
            shaper: RewardShaper::new(reward),
            last_reward: 0.0,
            total_reward: 0.0,
        }
    }

    fn restart(&mut self, target: TargetVector, reading: SensorReading) {
        self.episode += 1;
        self.target = target;
        self.step = 0;
        self.last_actions.fill(Vector3::zeros());
        self.reading = reading;
        self.shaper.reset();
        self.last_reward = 0.0;
        self.total_reward = 0.0;
    }

    #[must_use]
    pub fn episode(&self) -> u64 {
        self.episode
    }

    #[must_use]
    pub fn target(&self) -> &TargetVector {
        &self.target
    }

    #[must_use]
    pub fn step(&self) -> u32 {
        self.step
    }

    #[must_use]
    pub fn best_error(&self) -> Option<f32> {
        self.shaper.best_error()
    }

    #[must_use]
    pub fn no_improvement(&self) -> u32 {
        self.shaper.no_improvement()
    }

    /// Smoothed actions of the last decision, one per controlled joint.
    #[must_use]
    pub fn last_actions(&self) -> &[Vector3<f32>] {
        &self.last_actions
    }

    #[must_use]
    pub fn reading(&self) -> &SensorReading {
        &self.reading
    }

    #[must_use]
    pub fn total_error(&self) -> f32 {
        self.target.error(&self.reading)
    }

    #[must_use]
    pub fn last_reward(&self) -> f32 {
        self.last_reward
    }

    #[must_use]
    pub fn total_reward(&self) -> f32 {
        self.total_reward
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Faulted,
    Preparing { frames_left: u32 },
    Running(RunStep),
    Finished(EpisodeOutcome),
}

#[derive(Debug, Clone)]
enum RunStep {
    Decide,
    AwaitSimulation,
    Sampling(StabilityFilter),
}

#[derive(Debug)]
pub struct SolverAgent {
    id: AgentId,
    mode: AgentMode,
    params: AgentParams,
    window: Vector3<f32>,
    prepare_frames: u32,
    body: Body,
    sensor: SensorModel,
    controlled: Vec<usize>,
    policy: Box<dyn Policy>,
    actions: Vec<f32>,
    state: AgentState,
    phase: Phase,
    fault: Option<AgentError>,
    reporter: Option<Sender<AgentReport>>,
}

impl SolverAgent {
    /// Builds an agent around its own body and sensor model.
    ///
    /// Configuration problems do not fail construction: the agent is built
    /// in the [`Lifecycle::Faulted`] state and the problem is logged and kept
    /// in [`fault`](Self::fault).
    pub fn new(
        id: AgentId,
        body: Body,
        sensor: SensorModel,
        params: AgentParams,
        clock: &ClockParams,
        policy: Box<dyn Policy>,
    ) -> Self {
        let controlled = body.chain().controlled_joints();
        let window = params
            .rotation_window
            .map(|w| if w.is_finite() { w.abs() } else { 0.0 });
        let mut agent = Self {
            id,
            mode: AgentMode::default(),
            window,
            prepare_frames: clock.frames_for(params.prepare_delay),
            state: AgentState::new(controlled.len(), params.reward.clone()),
            actions: vec![0.0; 3 * controlled.len()],
            params,
            body,
            sensor,
            controlled,
            policy,
            phase: Phase::Idle,
            fault: None,
            reporter: None,
        };
        if let Err(err) = agent.check_configuration() {
            error!(agent = %id, %err, "agent disabled");
            agent.phase = Phase::Faulted;
            agent.fault = Some(err);
        }
        agent
    }

    fn check_configuration(&self) -> Result<(), AgentError> {
        if self.controlled.is_empty() {
            return Err(AgentError::Body(spinefit_body::BodyError::EmptyChain));
        }
        let sets = self.sensor.sample_sets();
        if sets.is_unassigned() {
            return Err(AgentError::UnassignedSensor);
        }
        let len = self.body.positions().len();
        if let Some(index) = sets.max_index().filter(|&i| i >= len) {
            return Err(spinefit_sensor::SensorError::VertexOutOfRange { index, len }.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    #[must_use]
    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    #[must_use]
    pub fn fault(&self) -> Option<&AgentError> {
        self.fault.as_ref()
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        match &self.phase {
            Phase::Idle => Lifecycle::Idle,
            Phase::Faulted => Lifecycle::Faulted,
            Phase::Preparing { .. } => Lifecycle::Preparing,
            Phase::Running(_) => Lifecycle::Running,
            Phase::Finished(EpisodeOutcome::Succeeded) => Lifecycle::Succeeded,
            Phase::Finished(EpisodeOutcome::TimedOut | EpisodeOutcome::Stagnated) => {
                Lifecycle::TimedOut
            }
        }
    }

    /// Whether an episode is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Preparing { .. } | Phase::Running(_))
    }

    /// Current rotation of every controlled joint, in controlled order.
    #[must_use]
    pub fn controlled_rotations(&self) -> Vec<Vector3<f32>> {
        let chain = self.body.chain();
        self.controlled
            .iter()
            .filter_map(|&j| chain.rotation(j))
            .collect()
    }

    pub fn set_reporter(&mut self, reporter: Sender<AgentReport>) {
        self.reporter = Some(reporter);
    }

    pub fn set_mode(&mut self, mode: AgentMode) -> Result<(), AgentError> {
        match self.phase {
            Phase::Faulted => Err(AgentError::Faulted),
            Phase::Preparing { .. } | Phase::Running(_) => Err(AgentError::Busy),
            _ => {
                self.mode = mode;
                Ok(())
            }
        }
    }

    /// Begins an episode against `target`.
    ///
    /// The joint chain is reset to rest, then the agent waits out its
    /// preparation pause before the first decision.
    pub fn start(&mut self, target: TargetVector) -> Result<(), AgentError> {
        match self.phase {
            Phase::Faulted => return Err(AgentError::Faulted),
            Phase::Preparing { .. } | Phase::Running(_) => return Err(AgentError::Busy),
            Phase::Idle | Phase::Finished(_) => {}
        }
        self.body.chain_mut().reset_to_rest();
        let reading = self.sensor.sample(self.body.positions());
        self.state.restart(target, reading);
        self.policy.reset();
        self.phase = Phase::Preparing {
            frames_left: self.prepare_frames,
        };
        debug!(
            agent = %self.id,
            episode = self.state.episode,
            mode = ?self.mode,
            "episode started"
        );
        Ok(())
    }

    /// Drops any in-flight episode. Joint rotations are left as they are.
    pub fn cancel(&mut self) {
        match self.phase {
            Phase::Preparing { .. } | Phase::Running(_) => {
                debug!(agent = %self.id, step = self.state.step, "episode cancelled");
                self.phase = Phase::Idle;
            }
            Phase::Finished(_) => self.phase = Phase::Idle,
            Phase::Idle | Phase::Faulted => {}
        }
    }

    pub fn on_tick(&mut self, tick: Tick) {
        if tick.kind.is_simulation() {
            self.body.step_simulation();
        }
        if let Err(err) = self.advance(tick) {
            error!(agent = %self.id, %err, "agent fault during episode");
            self.phase = Phase::Faulted;
            self.fault = Some(err);
        }
    }

    fn advance(&mut self, tick: Tick) -> Result<(), AgentError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        self.phase = match (phase, tick.kind) {
            (Phase::Preparing { frames_left }, TickKind::Render) => {
                match frames_left.saturating_sub(1) {
                    0 => {
                        self.state.reading = self.sensor.sample(self.body.positions());
                        Phase::Running(RunStep::Decide)
                    }
                    frames_left => Phase::Preparing { frames_left },
                }
            }
            (Phase::Running(RunStep::Decide), TickKind::Render) => {
                self.decide()?;
                Phase::Running(RunStep::AwaitSimulation)
            }
            (Phase::Running(RunStep::AwaitSimulation), TickKind::Simulation) => {
                Phase::Running(RunStep::Sampling(StabilityFilter::new(self.params.stability)))
            }
            (Phase::Running(RunStep::Sampling(mut filter)), TickKind::Render) => {
                let reading = self.sensor.sample(self.body.positions());
                let status = filter.observe(reading);
                if status.is_done() {
                    trace!(agent = %self.id, ?status, "sensor settled");
                    self.complete_step(reading)
                } else {
                    Phase::Running(RunStep::Sampling(filter))
                }
            }
            (phase, _) => phase,
        };
        Ok(())
    }

    fn decide(&mut self) -> Result<(), AgentError> {
        let observation = Observation::new(
            &self.state.reading,
            &self.state.target,
            self.controlled_rotations(),
        );
        debug_assert_eq!(observation.len(), observation_len(self.controlled.len()));
        self.policy.act(&observation, &mut self.actions);
        self.state.step += 1;

        let smoothing = self.params.smoothing;
        let window = self.window;
        let chain = self.body.chain_mut();
        for ((&joint, raw), previous) in self
            .controlled
            .iter()
            .zip(self.actions.chunks_exact(3))
            .zip(&mut self.state.last_actions)
        {
            let raw = Vector3::new(raw[0], raw[1], raw[2]).map(clamp_action);
            let smoothed = previous.lerp(&raw, smoothing);
            *previous = smoothed;
            let rest = chain.rest_rotation(joint).unwrap_or_else(Vector3::zeros);
            let rotation = rest + smoothed.component_mul(&window);
            let rotation = Vector3::new(
                rotation.x.clamp(rest.x - window.x, rest.x + window.x),
                rotation.y.clamp(rest.y - window.y, rest.y + window.y),
                rotation.z.clamp(rest.z - window.z, rest.z + window.z),
            );
            chain.set_rotation(joint, rotation)?;
        }

        if self.params.debug_steps {
            let first = self.controlled.first().and_then(|&j| self.body.chain().rotation(j));
            debug!(
                agent = %self.id,
                step = self.state.step,
                force_error = observation.force_error(),
                first_joint = ?first.map(|r| normalized_rotation(&r)),
                "decision applied"
            );
        }
        Ok(())
    }

    fn complete_step(&mut self, reading: SensorReading) -> Phase {
        self.state.reading = reading;
        let error = self.state.total_error();
        let reward_params = &self.params.reward;
        let mut reward = self.state.shaper.shape(error);

        let outcome = if self.params.is_successful(error) {
            reward += reward_params.success_reward;
            Some(EpisodeOutcome::Succeeded)
        } else if self.state.step >= self.params.max_steps {
            reward += reward_params.timeout_penalty;
            Some(EpisodeOutcome::TimedOut)
        } else if self.mode.is_training()
            && self.state.no_improvement() > self.params.stagnation_limit
        {
            reward += reward_params.stagnation_penalty();
            Some(EpisodeOutcome::Stagnated)
        } else {
            None
        };

        let reward = sanitize_reward(reward);
        self.state.last_reward = reward;
        self.state.total_reward += reward;
        self.policy.observe(reward);

        if self.params.debug_steps {
            debug!(
                agent = %self.id,
                step = self.state.step,
                error,
                reward,
                no_improvement = self.state.no_improvement(),
                "step complete"
            );
        }

        match outcome {
            Some(outcome) => {
                self.report(outcome, error);
                Phase::Finished(outcome)
            }
            None => Phase::Running(RunStep::Decide),
        }
    }

    fn report(&self, outcome: EpisodeOutcome, error: f32) {
        let report = AgentReport {
            agent: self.id,
            episode: self.state.episode,
            outcome,
            steps: self.state.step,
            reading: self.state.reading,
            total_error: error,
            total_reward: self.state.total_reward,
        };
        match outcome {
            EpisodeOutcome::Succeeded => info!(
                agent = %self.id,
                steps = report.steps,
                error,
                "target matched"
            ),
            EpisodeOutcome::TimedOut | EpisodeOutcome::Stagnated => debug!(
                agent = %self.id,
                steps = report.steps,
                error,
                %outcome,
                "episode ended without a match"
            ),
        }
        if let Some(reporter) = &self.reporter {
            // The receiver may already be gone when a race is torn down.
            let _ = reporter.send(report);
        }
    }
}

fn clamp_action(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
