use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::{PlayerFeatures, PlayerId};
use crate::roles::{Role, RoleAssignment, RoleClassifier};
use crate::scoring::{
    CategoryScores, ImpactBand, ImpactCounters, RatingCategories, RatingContext, ScoreEngine,
};
use crate::tuning::Tuning;

/// Raw per-match stats the score engine consumes, beyond the role features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStatLine {
    // Fraction in [0, 1].
    pub hs_percent: f64,
    pub kpr: f64,
    pub adr: f64,
    // Percent in [0, 100].
    pub counter_strafe_percent: f64,
    pub untradeable_ratio: f64,
    pub trade_success_rate: f64,
    pub survival_rate: f64,
    pub utility_damage: u32,
    pub kdr: f64,
    pub impact: ImpactCounters,
}

impl PlayerStatLine {
    pub fn opening_kills(&self) -> u32 {
        self.impact
            .opening_kills_won
            .saturating_add(self.impact.opening_kills_lost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub player_id: PlayerId,
    pub features: PlayerFeatures,
    #[serde(default)]
    pub stats: Option<PlayerStatLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchInput {
    #[serde(default)]
    pub match_id: Option<String>,
    pub players: Vec<MatchPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player_id: PlayerId,
    pub role: Role,
    pub raw_aim: i32,
    pub scores: CategoryScores,
    pub final_rating: i32,
    pub impact_band: ImpactBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub match_id: Option<String>,
    pub roles: RoleAssignment,
    pub role_distribution: BTreeMap<Role, usize>,
    pub players: Vec<PlayerReport>,
}

/// Classifies the roster once, then scores every player that has a stat line.
#[derive(Debug, Clone, Default)]
pub struct MatchRater {
    classifier: RoleClassifier,
    engine: ScoreEngine,
}

impl MatchRater {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            classifier: tuning.classifier(),
            engine: tuning.score_engine(),
        }
    }

    pub fn rate_match(&self, input: &MatchInput) -> MatchReport {
        let roles = self.classifier.classify_roles(
            input
                .players
                .iter()
                .map(|p| (p.player_id.as_str(), &p.features)),
        );

        let players = input
            .players
            .iter()
            .filter_map(|p| {
                let stats = p.stats.as_ref()?;
                let role = roles.get(&p.player_id).unwrap_or(Role::SiteAnchor);
                Some(self.rate_player(p, stats, role))
            })
            .collect::<Vec<_>>();

        debug!(
            match_id = input.match_id.as_deref().unwrap_or("-"),
            roster = input.players.len(),
            scored = players.len(),
            "match rated"
        );

        MatchReport {
            match_id: input.match_id.clone(),
            role_distribution: roles.distribution(),
            roles,
            players,
        }
    }

    fn rate_player(&self, player: &MatchPlayer, stats: &PlayerStatLine, role: Role) -> PlayerReport {
        let e = &self.engine;
        let (raw_aim, aim) = e.compute_aim_score(
            stats.hs_percent,
            stats.kpr,
            stats.adr,
            stats.counter_strafe_percent,
        );
        let scores = CategoryScores {
            aim,
            positioning: e.compute_positioning_score(
                stats.untradeable_ratio,
                stats.trade_success_rate,
                stats.survival_rate,
            ),
            utility: e.compute_utility_score(
                player.features.enemies_blinded,
                stats.utility_damage,
                player.features.flashes_thrown,
            ),
            impact: e.compute_impact_score(&stats.impact),
        };
        let final_rating = e.compute_final_rating(
            RatingCategories::from(&scores),
            &RatingContext {
                role,
                kdr: stats.kdr,
                untradeable_deaths: stats.impact.untradeable_deaths,
                survival_rate: stats.survival_rate,
                opening_kills: stats.opening_kills(),
            },
        );

        PlayerReport {
            player_id: player.player_id.clone(),
            role,
            raw_aim,
            scores,
            final_rating,
            impact_band: ImpactBand::classify(scores.impact),
        }
    }
}

pub fn rate_match(tuning: &Tuning, input: &MatchInput) -> MatchReport {
    MatchRater::new(tuning).rate_match(input)
}

/// Rates independent matches in parallel; output order follows input order.
pub fn rate_matches(tuning: &Tuning, inputs: &[MatchInput]) -> Vec<MatchReport> {
    let rater = MatchRater::new(tuning);
    inputs.par_iter().map(|m| rater.rate_match(m)).collect()
}
