use std::path::PathBuf;

use spinefit_agent::SpinefitConfig;

use crate::util::Output;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ConfigArg {
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ConfigArg) -> anyhow::Result<()> {
    Output::save_json(&SpinefitConfig::default(), arg.output.clone())
}
