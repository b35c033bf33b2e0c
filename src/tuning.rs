use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::roles::{RoleClassifier, RoleConfig};
use crate::scoring::{ScoreConfig, ScoreEngine};

pub const TUNING_PATH_ENV: &str = "FRAG_RATING_TUNING_PATH";

static DEFAULT_TUNING: OnceCell<Tuning> = OnceCell::new();

/// Every threshold, weight and quota used by the classifier and the score engine.
/// Fields left out of a JSON override keep their built-in values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub roles: RoleConfig,
    pub scoring: ScoreConfig,
}

impl Tuning {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let tuning: Tuning = serde_json::from_str(raw).context("parse tuning json")?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read tuning {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("load tuning {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.roles.validate().context("invalid role tuning")?;
        self.scoring.validate().context("invalid score tuning")?;
        Ok(())
    }

    pub fn classifier(&self) -> RoleClassifier {
        RoleClassifier::new(self.roles.clone())
    }

    pub fn score_engine(&self) -> ScoreEngine {
        ScoreEngine::new(self.scoring.clone())
    }
}

/// Loads tuning from `FRAG_RATING_TUNING_PATH` when it points at an existing file,
/// otherwise returns the built-in values.
pub fn load_tuning() -> Result<Tuning> {
    load_tuning_from(tuning_path_override().as_deref())
}

/// Same resolution as [`load_tuning`] for an explicit override path.
pub fn load_tuning_from(path: Option<&Path>) -> Result<Tuning> {
    if let Some(path) = path
        && path.exists()
    {
        info!(path = %path.display(), "loading tuning override");
        return Tuning::load(path);
    }
    Ok(Tuning::default())
}

/// Process-wide tuning, resolved once. A broken override falls back to defaults.
pub fn default_tuning() -> &'static Tuning {
    DEFAULT_TUNING.get_or_init(|| tuning_or_default(tuning_path_override().as_deref()))
}

fn tuning_or_default(path: Option<&Path>) -> Tuning {
    load_tuning_from(path).unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "tuning override rejected, using defaults");
        Tuning::default()
    })
}

fn tuning_path_override() -> Option<PathBuf> {
    env::var(TUNING_PATH_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
