use serde::{Deserialize, Serialize};

pub type PlayerId = String;

const UNKNOWN_TEAM: &str = "unknown";

/// Per-match aggregate for one player, produced upstream and never mutated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerFeatures {
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub awp_kills: u32,
    #[serde(default)]
    pub entry_kills: u32,
    #[serde(default)]
    pub entry_deaths: u32,
    #[serde(default)]
    pub flashes_thrown: u32,
    #[serde(default)]
    pub enemies_blinded: u32,
    #[serde(default)]
    pub tradeable_deaths: u32,
    // Game units.
    #[serde(default)]
    pub avg_teammate_dist: f64,
    #[serde(default)]
    pub swing_kills: u32,
    // Fraction in [0, 1].
    #[serde(default)]
    pub kast_percentage: f64,
    #[serde(default)]
    pub raw_impact: f64,
    #[serde(default)]
    pub team_id: String,
}

impl PlayerFeatures {
    pub fn entry_attempts(&self) -> u64 {
        u64::from(self.entry_kills) + u64::from(self.entry_deaths)
    }

    pub fn awp_ratio(&self) -> f64 {
        self.awp_kills as f64 / self.kills.max(1) as f64
    }

    pub fn entry_success_rate(&self) -> f64 {
        self.entry_kills as f64 / self.entry_attempts().max(1) as f64
    }

    pub fn tradeable_ratio(&self) -> f64 {
        self.tradeable_deaths as f64 / self.deaths.max(1) as f64
    }

    /// Normalized team key, or `None` when the id is blank or "unknown".
    pub fn team_key(&self) -> Option<&str> {
        team_key(&self.team_id)
    }
}

pub fn team_key(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_TEAM) {
        None
    } else {
        Some(trimmed)
    }
}
