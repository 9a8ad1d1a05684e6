pub mod records;
mod ui;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar};
use reallight_dataset::{Dataset, LoadDatasetConfig, load_planar_image};
use reallight_sh::{Cubemap, NUM_COEFFS, ShCoeffs, ShProjector, extract_main_light, sh};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::records::{
    CubemapRecord, PredictionRecord, SampleRecord, SampleScore, ScoreReport,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reallight - spherical harmonic lighting from cubemaps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Project every skybox of a dataset to SH coefficients.
    Project(ProjectArgs),
    /// Project one cubemap given as six face images.
    Faces(FacesArgs),
    /// Score predicted coefficients against the dataset skyboxes.
    Score(ScoreArgs),
}

#[derive(Clone, Debug, Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// Nr. of skyboxes loaded and projected together.
    #[arg(long, help_heading = "Projection Options", default_value = "8")]
    pub batch_size: usize,
    /// Intensity multiplier for the extracted main light.
    #[arg(long, help_heading = "Projection Options", default_value = "1.0")]
    pub light_intensity: f32,
    /// Don't extract a main light.
    #[arg(long, help_heading = "Projection Options")]
    pub no_main_light: bool,
}

impl ProjectConfig {
    fn light_intensity(&self) -> Option<f32> {
        (!self.no_main_light).then_some(self.light_intensity)
    }
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Dataset root, containing one directory per room.
    #[arg(value_name = "DATASET")]
    pub root: PathBuf,
    /// Write JSON records here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    #[clap(flatten)]
    pub dataset: LoadDatasetConfig,
    #[clap(flatten)]
    pub project: ProjectConfig,
}

#[derive(Args)]
pub struct FacesArgs {
    /// Face images in +Y, +Z, +X, -Z, -X, -Y order.
    #[arg(value_name = "FACE", num_args = 6, required = true)]
    pub faces: Vec<PathBuf>,
    #[arg(long, default_value = "1.0")]
    pub light_intensity: f32,
}

#[derive(Args)]
pub struct ScoreArgs {
    #[arg(value_name = "DATASET")]
    pub root: PathBuf,
    /// JSON array of objects with `key` and 27 `coeffs`.
    #[arg(long, short)]
    pub predictions: PathBuf,
    #[clap(flatten)]
    pub dataset: LoadDatasetConfig,
    #[arg(long, default_value = "8")]
    pub batch_size: usize,
}

/// Project a dataset in batches. Samples come back in dataset order.
pub async fn project_dataset(
    projector: &ShProjector,
    dataset: &Dataset,
    max_resolution: u32,
    config: &ProjectConfig,
    progress: &ProgressBar,
) -> anyhow::Result<Vec<SampleRecord>> {
    let mut records = Vec::with_capacity(dataset.len());
    for chunk in dataset.samples.chunks(config.batch_size.max(1)) {
        let cubemaps = dataset
            .load_skyboxes(chunk, max_resolution)
            .instrument(tracing::trace_span!("Load skyboxes"))
            .await?;
        let batch = projector.project_batch(&cubemaps);

        records.extend(
            chunk
                .iter()
                .zip(&batch.samples)
                .map(|(sample, sh)| SampleRecord::new(sample.clone(), sh, config.light_intensity())),
        );
        progress.inc(chunk.len() as u64);
    }
    Ok(records)
}

pub async fn project_faces(
    projector: &ShProjector,
    faces: &[PathBuf],
    light_intensity: f32,
) -> anyhow::Result<CubemapRecord> {
    let mut planes = Vec::with_capacity(faces.len());
    for path in faces {
        planes.push(load_planar_image(path, u32::MAX).await?);
    }
    let cubemap = Cubemap::from_faces(planes).context("Faces don't form a cubemap")?;
    let sh = projector.project(&cubemap);
    Ok(CubemapRecord {
        coeffs: sh.to_flat().to_vec(),
        main_light: extract_main_light(&sh, light_intensity),
    })
}

pub type PredictionMap = BTreeMap<String, ShCoeffs>;

pub async fn read_predictions(path: &Path) -> anyhow::Result<PredictionMap> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read predictions {path:?}"))?;
    let records: Vec<PredictionRecord> =
        serde_json::from_slice(&bytes).context("Invalid predictions file")?;

    let mut map = PredictionMap::new();
    for record in records {
        let Some(coeffs) = ShCoeffs::from_flat(&record.coeffs) else {
            bail!(
                "Prediction {} has {} coefficients, expected {NUM_COEFFS}",
                record.key,
                record.coeffs.len()
            );
        };
        if map.insert(record.key.clone(), coeffs).is_some() {
            log::warn!("Duplicate prediction for {}, keeping the last one", record.key);
        }
    }
    Ok(map)
}

pub async fn score_dataset(
    projector: &ShProjector,
    dataset: &Dataset,
    predictions: &PredictionMap,
    max_resolution: u32,
    batch_size: usize,
    progress: &ProgressBar,
) -> anyhow::Result<ScoreReport> {
    let mut samples = vec![];
    let mut missing = vec![];
    for chunk in dataset.samples.chunks(batch_size.max(1)) {
        let (scored, unscored): (Vec<_>, Vec<_>) = chunk
            .iter()
            .partition(|s| predictions.contains_key(&s.key()));
        missing.extend(unscored.iter().map(|s| s.key()));

        let scored: Vec<_> = scored.into_iter().cloned().collect();
        let cubemaps = dataset.load_skyboxes(&scored, max_resolution).await?;
        let batch = projector.project_batch(&cubemaps);
        for (sample, target) in scored.iter().zip(&batch.samples) {
            let key = sample.key();
            if let Some(pred) = predictions.get(&key) {
                samples.push(SampleScore {
                    key,
                    mse: sh::mse(pred, target),
                });
            }
        }
        progress.inc(chunk.len() as u64);
    }

    if samples.is_empty() {
        bail!("No prediction matches a dataset sample");
    }
    let dataset_keys: BTreeSet<_> = dataset.samples.iter().map(|s| s.key()).collect();
    let unmatched = predictions
        .keys()
        .filter(|key| !dataset_keys.contains(*key))
        .cloned()
        .collect();

    let mean_mse = samples.iter().map(|s| s.mse as f64).sum::<f64>() / samples.len() as f64;
    Ok(ScoreReport {
        samples,
        mean_mse: mean_mse as f32,
        missing,
        unmatched,
    })
}

async fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?,
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn run(cli: Cli, multi: &MultiProgress) -> anyhow::Result<()> {
    let projector = ShProjector::new();
    let start = Instant::now();

    match cli.command {
        Command::Project(args) => {
            let dataset = Dataset::scan(&args.root, &args.dataset)
                .instrument(tracing::trace_span!("Scan dataset"))
                .await?;
            let progress = ui::progress_bar(multi, dataset.len(), "Projecting");
            let records = project_dataset(
                &projector,
                &dataset,
                args.dataset.max_resolution,
                &args.project,
                &progress,
            )
            .await?;
            progress.finish_and_clear();
            write_json(&records, args.output.as_deref()).await?;
            log::info!(
                "Projected {} skyboxes in {}",
                records.len(),
                ui::format_elapsed(start.elapsed())
            );
        }
        Command::Faces(args) => {
            let record = project_faces(&projector, &args.faces, args.light_intensity).await?;
            write_json(&record, None).await?;
        }
        Command::Score(args) => {
            let predictions = read_predictions(&args.predictions).await?;
            let dataset = Dataset::scan(&args.root, &args.dataset)
                .instrument(tracing::trace_span!("Scan dataset"))
                .await?;
            let progress = ui::progress_bar(multi, dataset.len(), "Scoring");
            let report = score_dataset(
                &projector,
                &dataset,
                &predictions,
                args.dataset.max_resolution,
                args.batch_size,
                &progress,
            )
            .await?;
            progress.finish_and_clear();
            if !report.missing.is_empty() {
                log::warn!("{} samples have no prediction", report.missing.len());
            }
            if !report.unmatched.is_empty() {
                log::warn!(
                    "{} predictions match no dataset sample",
                    report.unmatched.len()
                );
            }
            log::info!(
                "Mean SH MSE {:.6} over {} samples ({})",
                report.mean_mse,
                report.samples.len(),
                ui::format_elapsed(start.elapsed())
            );
            write_json(&report, None).await?;
        }
    }
    Ok(())
}
