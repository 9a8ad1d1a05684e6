use reallight_dataset::SampleEntry;
use reallight_sh::{MainLight, ShCoeffs, extract_main_light};
use serde::{Deserialize, Serialize};

/// Projected coefficients of one dataset sample.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleRecord {
    pub key: String,
    #[serde(flatten)]
    pub sample: SampleEntry,
    /// 27 values, `basis * 3 + channel`.
    pub coeffs: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_light: Option<MainLight>,
}

impl SampleRecord {
    pub fn new(sample: SampleEntry, sh: &ShCoeffs, light_intensity: Option<f32>) -> Self {
        Self {
            key: sample.key(),
            sample,
            coeffs: sh.to_flat().to_vec(),
            main_light: light_intensity.and_then(|i| extract_main_light(sh, i)),
        }
    }
}

/// Coefficients for a single cubemap, without dataset bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CubemapRecord {
    pub coeffs: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_light: Option<MainLight>,
}

/// A model prediction to score. Any JSON object with these two fields works,
/// including the output of `reallight project`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub key: String,
    pub coeffs: Vec<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleScore {
    pub key: String,
    pub mse: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreReport {
    pub samples: Vec<SampleScore>,
    pub mean_mse: f32,
    /// Dataset samples without a matching prediction.
    pub missing: Vec<String>,
    /// Prediction keys that match no dataset sample.
    pub unmatched: Vec<String>,
}
