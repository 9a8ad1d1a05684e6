use clap::{Args, Parser};
use serde::{Deserialize, Serialize};

fn parse_max_resolution(s: &str) -> Result<u32, String> {
    if s.eq_ignore_ascii_case("max") {
        Ok(u32::MAX)
    } else {
        s.parse::<u32>()
            .map_err(|e| format!("Invalid max resolution '{s}': {e}"))
    }
}

#[derive(Clone, Debug, Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadDatasetConfig {
    /// Max nr. of samples to load.
    #[arg(long, help_heading = "Dataset Options")]
    pub max_samples: Option<usize>,
    /// Load only every nth sample.
    #[arg(long, help_heading = "Dataset Options")]
    pub subsample: Option<usize>,
    /// Max resolution of skybox faces. Larger faces are downscaled before projection.
    ///
    /// Pass `max` to keep the source resolution.
    #[arg(
        long,
        help_heading = "Dataset Options",
        default_value = "max",
        value_parser = parse_max_resolution
    )]
    pub max_resolution: u32,
}

#[derive(Parser)]
struct DefaultArgs {
    #[clap(flatten)]
    config: LoadDatasetConfig,
}

impl Default for LoadDatasetConfig {
    fn default() -> Self {
        DefaultArgs::parse_from([""]).config
    }
}
