#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use nalgebra::Vector3;
use spinefit_agent::{
    AgentId, AgentParams, GeneratedTarget, Observation, Policy, PostureGenerator, Rig, SolverAgent,
    SpinefitConfig, TickClock,
};

/// Steers straight at a known joint configuration, optionally after idling.
#[derive(Debug, Clone)]
pub struct Oracle {
    actions: Vec<f32>,
    idle_steps: u32,
    remaining_idle: u32,
}

impl Oracle {
    pub fn new(rig: &Rig, params: &AgentParams, target: &GeneratedTarget, idle_steps: u32) -> Self {
        let chain = rig.body().chain();
        let window = params.rotation_window;
        let actions = chain
            .controlled_joints()
            .into_iter()
            .zip(&target.rotations)
            .flat_map(|(joint, rotation)| {
                let rest = chain.rest_rotation(joint).unwrap();
                let a = (rotation - rest).component_div(&window);
                [a.x, a.y, a.z]
            })
            .collect();
        Self {
            actions,
            idle_steps,
            remaining_idle: idle_steps,
        }
    }
}

impl Policy for Oracle {
    fn reset(&mut self) {
        self.remaining_idle = self.idle_steps;
    }

    fn act(&mut self, _observation: &Observation, actions: &mut [f32]) {
        if self.remaining_idle > 0 {
            self.remaining_idle -= 1;
            actions.fill(0.0);
        } else {
            actions.copy_from_slice(&self.actions);
        }
    }
}

/// Always outputs zero actions, i.e. holds the rest pose.
#[derive(Debug)]
pub struct Still;

impl Policy for Still {
    fn act(&mut self, _observation: &Observation, actions: &mut [f32]) {
        actions.fill(0.0);
    }
}

pub fn config() -> SpinefitConfig {
    SpinefitConfig::default()
}

pub fn agent(
    config: &SpinefitConfig,
    rig: &Rig,
    id: usize,
    policy: Box<dyn Policy>,
) -> SolverAgent {
    SolverAgent::new(
        AgentId(id),
        rig.body().clone(),
        rig.sensor().clone(),
        config.agent.clone(),
        &config.clock,
        policy,
    )
}

/// The target `generator` will produce next, without advancing it.
pub fn preview(generator: &PostureGenerator) -> GeneratedTarget {
    generator.clone().generate(&mut TickClock::new()).unwrap()
}

pub fn rest_rotations(rig: &Rig) -> Vec<Vector3<f32>> {
    let chain = rig.body().chain();
    chain
        .controlled_joints()
        .into_iter()
        .map(|j| chain.rest_rotation(j).unwrap())
        .collect()
}

/// In-memory log sink for [`capture_logs`].
#[derive(Debug, Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a debug-level subscriber and returns what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (value, logs)
}
