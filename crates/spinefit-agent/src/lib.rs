//! Solver agents that race to reproduce a target set of stretch readings.
//!
//! A race runs in three stages:
//!
//! 1. **Target** - [`PostureGenerator`] bends its own copy of the spine into a
//!    randomly chosen preset [`Posture`] and records the settled readings as a
//!    [`TargetVector`](spinefit_sensor::TargetVector)
//! 2. **Search** - every [`SolverAgent`] resets its own spine and runs an
//!    episodic control loop, nudging joints until its readings match the target
//! 3. **Arbitration** - [`RaceCoordinator`] takes the first success, cancels
//!    everyone else and copies the winner's joint rotations to a [`PoseSink`]
//!
//! # Architecture
//!
//! ```text
//! RaceCoordinator
//!     ├─ PostureGenerator ──(one TargetVector per race)──┐
//!     │                                                   ↓
//!     ├─ SolverAgent 0 ─┐                     broadcast to all agents
//!     ├─ SolverAgent 1 ─┼─ Body + SensorModel + Policy (private to each agent)
//!     └─ SolverAgent N ─┘
//!           │
//!           └──(AgentReport over an mpsc channel)──→ RaceCoordinator
//! ```
//!
//! # Scheduling
//!
//! Everything runs on one cooperative tick stream produced by [`TickClock`]:
//! each frame is a simulation tick followed by a render tick. Components are
//! explicit state machines; a pending phase names the tick it waits for, and
//! the component only advances from its `on_tick` handler. There is no
//! parallelism and no locking. Cancelling a component drops its pending
//! phase, so the continuation simply never runs.
//!
//! On a simulation tick every body first settles its surface geometry, then
//! any continuation waiting on that tick runs. Posture generation always
//! completes before any agent is started against the new target.
//!
//! # Training
//!
//! [`Trainer`] runs a single agent in training mode: stagnation ends an
//! episode early, a success asks for a fresh target, and a timeout retries
//! the same one.

pub use self::{
    agent::*, clock::*, config::*, coordinator::*, generator::*, observation::*, policy::*,
    posture::*, reward::*, rig::*, sink::*, stats::*, training::*,
};

mod agent;
mod clock;
mod config;
mod coordinator;
mod generator;
mod observation;
mod policy;
mod posture;
mod reward;
mod rig;
mod sink;
mod stats;
mod training;

use spinefit_body::BodyError;
use spinefit_sensor::SensorError;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum AgentError {
    #[display("body configuration fault: {_0}")]
    #[from]
    Body(BodyError),
    #[display("sensor configuration fault: {_0}")]
    #[from]
    Sensor(SensorError),
    #[display("no sensor channel has any surface points assigned")]
    UnassignedSensor,
    #[display("posture catalog is empty")]
    EmptyCatalog,
    #[display("posture {name:?} has {got} joint offsets, expected {expected}")]
    PostureShape {
        name: String,
        got: usize,
        expected: usize,
    },
    #[display("no posture named {name:?}")]
    UnknownPosture { name: String },
    #[display("agent is busy with an episode")]
    Busy,
    #[display("agent is disabled by a configuration fault")]
    Faulted,
}
