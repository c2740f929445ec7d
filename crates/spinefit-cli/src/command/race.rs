use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use spinefit_agent::TickClock;
use tracing::info;

use crate::{
    schema::report::{RaceReport, RaceResult},
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct RaceArg {
    /// Number of agents (overrides the configuration)
    #[arg(long)]
    agents: Option<usize>,
    /// Seed for posture selection and every agent's policy
    #[arg(long)]
    seed: Option<u64>,
    /// Give up after this many frames
    #[arg(long, default_value_t = 60_000)]
    max_frames: u64,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &RaceArg) -> anyhow::Result<()> {
    let RaceArg {
        agents,
        seed,
        max_frames,
        config,
        output,
    } = arg;
    let mut config = util::load_config(config.as_deref())?;
    if let Some(agents) = agents {
        config.agent_count = *agents;
    }
    let seed = util::resolve_seed(*seed);
    info!(seed, agents = config.agent_count, "setting up race");

    let mut coordinator = config
        .coordinator(seed)
        .context("Failed to set up the race")?;
    let outcome = coordinator.run_to_completion(&mut TickClock::new(), *max_frames);

    let report = RaceReport {
        recorded_at: Utc::now(),
        seed,
        agents: config.agent_count,
        result: RaceResult::from_outcome(outcome, *max_frames),
    };
    Output::save_json(&report, output.clone())
}
