use std::path::PathBuf;

use anyhow::Context as _;
use spinefit_agent::TickClock;
use spinefit_body::PostureMonitor;

use crate::{
    schema::report::InspectReport,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    #[arg(long)]
    seed: Option<u64>,
    /// Preset to apply instead of a random one
    #[arg(long)]
    posture: Option<String>,
    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg {
        seed,
        posture,
        config,
        output,
    } = arg;
    let config = util::load_config(config.as_deref())?;
    let seed = util::resolve_seed(*seed);

    let rig = config.rig().context("Failed to build the body")?;
    let mut generator = config
        .generator(&rig, seed)
        .context("Failed to set up the posture generator")?;
    let mut clock = TickClock::new();
    let generated = match posture {
        Some(name) => generator.generate_named(&mut clock, name),
        None => generator.generate(&mut clock),
    }
    .context("Failed to generate a posture")?;

    // hold the posture long enough for sustained faults to register
    let mut monitor = PostureMonitor::new(config.monitor.clone());
    let hold = monitor.params().hold_time;
    let assessment = monitor.update(generator.body().chain(), hold);

    let report = InspectReport {
        seed,
        posture: generated.posture,
        target: generated.target,
        curvature: assessment.curvature,
        faults: InspectReport::fault_names(&assessment.faults),
    };
    Output::save_json(&report, output.clone())
}
