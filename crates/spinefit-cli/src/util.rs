use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use rand::Rng as _;
use spinefit_agent::SpinefitConfig;

/// Destination of a JSON document: a file, or stdout when no path is given.
pub struct Output {
    writer: Box<dyn Write>,
    name: String,
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        Self::create(output_path)?.write_json(value)
    }

    fn create(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = output_path else {
            return Ok(Self {
                writer: Box::new(io::stdout().lock()),
                name: "stdout".to_owned(),
            });
        };
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
            name: path.display().to_string(),
        })
    }

    fn write_json<T>(mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut self.writer, value)
            .with_context(|| format!("Failed to write JSON to {}", self.name))?;
        writeln!(self.writer)
            .with_context(|| format!("Failed to write newline to {}", self.name))?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush output to {}", self.name))?;
        Ok(())
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;
    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!("Failed to parse {} JSON file: {}", file_kind, path.display())
    })?;
    Ok(value)
}

/// Loads the configuration file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SpinefitConfig> {
    match path {
        Some(path) => read_json_file("config", path),
        None => Ok(SpinefitConfig::default()),
    }
}

/// The given seed, or a fresh one from the thread RNG.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random())
}
