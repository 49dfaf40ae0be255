//! Serde-facing region and policy records.
//!
//! These types stay loosely typed on purpose: `kind`, `mode`, `aggregate`,
//! and `rect` are kept as plain strings and lists so the linter can report
//! bad values as diagnostics instead of failing deserialization. The typed
//! model in the parent module is produced by a separate compile step.

use crate::util::{RegionMatchError, RegionMatchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_kind() -> String {
    "button".to_string()
}

fn default_method() -> String {
    "normed_correlation".to_string()
}

fn default_threshold() -> f32 {
    0.8
}

fn default_mode() -> String {
    "contains".to_string()
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_anchor() -> String {
    "center".to_string()
}

/// One region record as authored in `regions.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    /// `[x, y, w, h]` in frame coordinates. Kept as a raw list so a wrong
    /// arity is a lint finding, not a parse failure.
    #[serde(default)]
    pub rect: Vec<i64>,
    #[serde(default)]
    pub template: Option<TemplateSpec>,
    #[serde(default)]
    pub ocr: Option<OcrSpec>,
    #[serde(default)]
    pub fusion: Option<FusionSpec>,
    #[serde(default)]
    pub click: Option<ClickSpec>,
    #[serde(default)]
    pub annotation: String,
}

/// Template matching block of a region record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSpec {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

/// Text recognition block of a region record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSpec {
    #[serde(default)]
    pub expected: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

/// Fusion block of a hybrid region record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSpec {
    #[serde(default)]
    pub require: Option<Vec<String>>,
    #[serde(default)]
    pub aggregate: Option<String>,
}

/// Click binding block of a region record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickSpec {
    #[serde(default = "default_anchor")]
    pub anchor: String,
    #[serde(default)]
    pub offset: (i32, i32),
}

/// One policy record as authored in the policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub name: String,
    pub when: WhenSpec,
    pub action: ActionSpec,
}

/// Condition block of a policy record. Omitted fields are always satisfied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhenSpec {
    pub region: String,
    #[serde(default)]
    pub matched: Option<bool>,
    #[serde(default)]
    pub confidence_gte: Option<f32>,
}

/// Action block of a policy record. Cooldown is in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub cooldown: f64,
}

/// Policy file shape: the records live under a named list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    pub policies: Vec<PolicySpec>,
}

fn read_to_string(path: &Path) -> RegionMatchResult<String> {
    std::fs::read_to_string(path).map_err(|err| RegionMatchError::ConfigIo {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Loads the region set from a YAML file (a list of region records).
pub fn load_region_specs(path: &Path) -> RegionMatchResult<Vec<RegionSpec>> {
    let text = read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|err| RegionMatchError::ConfigParse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Loads the policy set from a YAML file (`policies:` list).
pub fn load_policy_specs(path: &Path) -> RegionMatchResult<Vec<PolicySpec>> {
    let text = read_to_string(path)?;
    let file: PolicyFile =
        serde_yaml::from_str(&text).map_err(|err| RegionMatchError::ConfigParse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(file.policies)
}
