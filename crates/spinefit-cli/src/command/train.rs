use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use spinefit_agent::TickClock;
use tracing::info;

use crate::{
    schema::report::TrainingReport,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Number of episodes to run
    #[arg(long, default_value_t = 20)]
    episodes: usize,
    #[arg(long)]
    seed: Option<u64>,
    /// Frame budget per episode
    #[arg(long, default_value_t = 10_000)]
    max_frames: u64,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        episodes,
        seed,
        max_frames,
        config,
        output,
    } = arg;
    let config = util::load_config(config.as_deref())?;
    let seed = util::resolve_seed(*seed);
    info!(seed, episodes, "training");

    let mut trainer = config
        .trainer(seed)
        .context("Failed to set up the trainer")?;
    let summary = trainer
        .run(&mut TickClock::new(), *episodes, *max_frames)
        .context("Training stopped")?;
    info!(
        successes = summary.successes,
        timeouts = summary.timeouts,
        stagnations = summary.stagnations,
        "training finished"
    );

    let report = TrainingReport {
        recorded_at: Utc::now(),
        seed,
        summary,
        episodes: trainer.records().to_vec(),
    };
    Output::save_json(&report, output.clone())
}
