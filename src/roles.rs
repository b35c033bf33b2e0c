use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::features::{PlayerFeatures, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    AWPer,
    Entry,
    Support,
    Lurker,
    Rotator,
    Trader,
    SiteAnchor,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::AWPer,
        Role::Entry,
        Role::Support,
        Role::Lurker,
        Role::Rotator,
        Role::Trader,
        Role::SiteAnchor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::AWPer => "AWPer",
            Role::Entry => "Entry",
            Role::Support => "Support",
            Role::Lurker => "Lurker",
            Role::Rotator => "Rotator",
            Role::Trader => "Trader",
            Role::SiteAnchor => "SiteAnchor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let s = raw.trim().to_ascii_lowercase();
        let role = match s.as_str() {
            "awper" | "awp" => Role::AWPer,
            "entry" => Role::Entry,
            "support" => Role::Support,
            "lurker" | "lurk" => Role::Lurker,
            "rotator" => Role::Rotator,
            "trader" => Role::Trader,
            "siteanchor" | "site_anchor" | "anchor" => Role::SiteAnchor,
            _ => bail!("unknown role {raw:?}"),
        };
        Ok(role)
    }
}

/// Thresholds for the role ladder and the per-team quotas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub awp_ratio_min: f64,
    pub awp_kills_min: u32,

    // Entry eligibility is limited to the top-N roster by entry attempts.
    pub entry_top_n: usize,
    pub entry_attempts_min: u32,
    pub entry_success_min: f64,
    pub entry_kills_min: u32,
    pub entry_kast_min: f64,
    pub entry_trade_ratio_min: f64,
    pub entry_trade_bonus: f64,
    pub entry_flashes_min: u32,
    pub entry_flash_bonus: f64,
    pub entry_flash_bonus_low: f64,

    pub support_blinded_min: u32,

    pub lurker_dist_min: f64,

    pub rotator_swing_kills_min: u32,
    pub rotator_impact_min: f64,

    pub trader_ratio_min: f64,

    pub max_awpers_per_team: usize,
    pub max_entries_per_team: usize,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            awp_ratio_min: 0.25,
            awp_kills_min: 2,
            entry_top_n: 4,
            entry_attempts_min: 3,
            entry_success_min: 0.35,
            entry_kills_min: 2,
            entry_kast_min: 0.55,
            entry_trade_ratio_min: 0.4,
            entry_trade_bonus: 1.5,
            entry_flashes_min: 2,
            entry_flash_bonus: 1.0,
            entry_flash_bonus_low: 0.5,
            support_blinded_min: 3,
            lurker_dist_min: 650.0,
            rotator_swing_kills_min: 2,
            rotator_impact_min: 30.0,
            trader_ratio_min: 0.35,
            max_awpers_per_team: 1,
            max_entries_per_team: 2,
        }
    }
}

impl RoleConfig {
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("awp_ratio_min", self.awp_ratio_min),
            ("entry_success_min", self.entry_success_min),
            ("entry_kast_min", self.entry_kast_min),
            ("entry_trade_ratio_min", self.entry_trade_ratio_min),
            ("trader_ratio_min", self.trader_ratio_min),
        ];
        for (name, value) in fractions {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                bail!("role config {name} must be within [0, 1], got {value}");
            }
        }
        let non_negative = [
            ("entry_trade_bonus", self.entry_trade_bonus),
            ("entry_flash_bonus", self.entry_flash_bonus),
            ("entry_flash_bonus_low", self.entry_flash_bonus_low),
            ("lurker_dist_min", self.lurker_dist_min),
            ("rotator_impact_min", self.rotator_impact_min),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                bail!("role config {name} must be finite and non-negative, got {value}");
            }
        }
        if self.entry_top_n == 0 {
            bail!("role config entry_top_n must be at least 1");
        }
        if self.max_awpers_per_team == 0 || self.max_entries_per_team == 0 {
            bail!("role quotas must allow at least one player per team");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub player_id: PlayerId,
    pub role: Role,
}

/// One role per input player, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleAssignment {
    entries: Vec<RoleEntry>,
}

impl RoleAssignment {
    pub fn get(&self, player_id: &str) -> Option<Role> {
        self.entries
            .iter()
            .find(|e| e.player_id == player_id)
            .map(|e| e.role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Role)> {
        self.entries.iter().map(|e| (e.player_id.as_str(), e.role))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn distribution(&self) -> BTreeMap<Role, usize> {
        let mut out = BTreeMap::new();
        for entry in &self.entries {
            *out.entry(entry.role).or_insert(0) += 1;
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RoleCandidate {
    role: Role,
    score: f64,
}

impl RoleCandidate {
    fn new(role: Role, score: f64) -> Self {
        Self { role, score }
    }

    fn demoted() -> Self {
        Self::new(Role::Trader, 0.0)
    }
}

/// Roster-wide figures computed once before the ladder runs.
struct RosterContext {
    avg_flashes: f64,
    top_entry: HashSet<usize>,
}

impl RosterContext {
    fn build(cfg: &RoleConfig, players: &[(&str, &PlayerFeatures)]) -> Self {
        let total_flashes: f64 = players.iter().map(|(_, p)| p.flashes_thrown as f64).sum();
        let avg_flashes = total_flashes / players.len().max(1) as f64;

        // Stable sort keeps input order among equal attempt counts.
        let mut by_attempts: Vec<(usize, u64)> = players
            .iter()
            .enumerate()
            .map(|(idx, (_, p))| (idx, p.entry_attempts()))
            .collect();
        by_attempts.sort_by(|a, b| b.1.cmp(&a.1));
        let top_entry = by_attempts
            .into_iter()
            .take(cfg.entry_top_n)
            .map(|(idx, _)| idx)
            .collect();

        Self {
            avg_flashes,
            top_entry,
        }
    }
}

struct RuleInput<'a> {
    cfg: &'a RoleConfig,
    roster: &'a RosterContext,
    index: usize,
    player: &'a PlayerFeatures,
}

type Rule = fn(&RuleInput<'_>) -> Option<RoleCandidate>;

/// Strict priority order; the first rule returning a candidate wins.
const RULE_LADDER: [(&str, Rule); 7] = [
    ("awper", awper_rule),
    ("entry", entry_rule),
    ("support", support_rule),
    ("lurker", lurker_rule),
    ("rotator", rotator_rule),
    ("trader", trader_rule),
    ("site_anchor", site_anchor_rule),
];

fn awper_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let p = input.player;
    let ratio = p.awp_ratio();
    (ratio >= input.cfg.awp_ratio_min && p.awp_kills >= input.cfg.awp_kills_min)
        .then(|| RoleCandidate::new(Role::AWPer, p.awp_kills as f64 * ratio))
}

fn entry_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let cfg = input.cfg;
    let p = input.player;
    let attempts = p.entry_attempts();
    if !input.roster.top_entry.contains(&input.index)
        || attempts < u64::from(cfg.entry_attempts_min)
    {
        return None;
    }

    let success = p.entry_success_rate();
    let quality = (success >= cfg.entry_success_min || p.entry_kills >= cfg.entry_kills_min)
        && p.kast_percentage >= cfg.entry_kast_min;
    if !quality {
        // Eligible but failed the gate: demote now, skipping the rest of the ladder.
        return Some(RoleCandidate::demoted());
    }

    let trade_bonus = if p.tradeable_ratio() >= cfg.entry_trade_ratio_min {
        cfg.entry_trade_bonus
    } else {
        0.0
    };
    let flash_bonus = if p.flashes_thrown >= cfg.entry_flashes_min {
        cfg.entry_flash_bonus
    } else {
        cfg.entry_flash_bonus_low
    };
    let score = success * p.entry_kills as f64 + trade_bonus + flash_bonus;
    Some(RoleCandidate::new(Role::Entry, score))
}

fn support_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let p = input.player;
    (p.flashes_thrown as f64 > input.roster.avg_flashes
        || p.enemies_blinded >= input.cfg.support_blinded_min)
        .then(|| {
            let score = p.flashes_thrown as f64 + 2.0 * p.enemies_blinded as f64;
            RoleCandidate::new(Role::Support, score)
        })
}

fn lurker_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let p = input.player;
    (p.avg_teammate_dist > input.cfg.lurker_dist_min)
        .then(|| RoleCandidate::new(Role::Lurker, p.avg_teammate_dist))
}

fn rotator_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let p = input.player;
    (p.swing_kills >= input.cfg.rotator_swing_kills_min
        && p.raw_impact >= input.cfg.rotator_impact_min)
        .then(|| RoleCandidate::new(Role::Rotator, p.swing_kills as f64 * 10.0))
}

fn trader_rule(input: &RuleInput<'_>) -> Option<RoleCandidate> {
    let ratio = input.player.tradeable_ratio();
    (ratio > input.cfg.trader_ratio_min).then(|| RoleCandidate::new(Role::Trader, ratio * 10.0))
}

fn site_anchor_rule(_: &RuleInput<'_>) -> Option<RoleCandidate> {
    Some(RoleCandidate::new(Role::SiteAnchor, 0.0))
}

fn run_ladder(input: &RuleInput<'_>) -> RoleCandidate {
    RULE_LADDER
        .iter()
        .find_map(|(name, rule)| {
            let candidate = rule(input)?;
            trace!(rule = *name, score = candidate.score, "rule matched");
            Some(candidate)
        })
        .unwrap_or_else(|| RoleCandidate::new(Role::SiteAnchor, 0.0))
}

struct Team<'a> {
    key: &'a str,
    members: Vec<usize>,
}

/// Groups roster indices by team id. Falls back to an even split by input order
/// when any id is missing or only one team is present.
fn partition_teams<'a>(players: &[(&'a str, &'a PlayerFeatures)]) -> Vec<Team<'a>> {
    let keys: Option<Vec<&str>> = players.iter().map(|&(_, p)| p.team_key()).collect();
    if let Some(keys) = keys {
        let mut teams: Vec<Team<'a>> = Vec::new();
        for (idx, key) in keys.into_iter().enumerate() {
            match teams.iter_mut().find(|t| t.key == key) {
                Some(team) => team.members.push(idx),
                None => teams.push(Team {
                    key,
                    members: vec![idx],
                }),
            }
        }
        if teams.len() >= 2 {
            return teams;
        }
    }

    debug!(players = players.len(), "team ids unusable, splitting roster by order");
    let half = players.len() / 2;
    vec![
        Team {
            key: "A",
            members: (0..half).collect(),
        },
        Team {
            key: "B",
            members: (half..players.len()).collect(),
        },
    ]
}

/// Keeps the `max` highest-scoring holders of `role` within one team and demotes the rest.
fn enforce_quota(
    candidates: &mut [RoleCandidate],
    members: &[usize],
    role: Role,
    max: usize,
) -> Vec<usize> {
    let mut holders: Vec<usize> = members
        .iter()
        .copied()
        .filter(|&idx| candidates[idx].role == role)
        .collect();
    if holders.len() <= max {
        return Vec::new();
    }
    holders.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));
    let demoted = holders.split_off(max);
    for &idx in &demoted {
        candidates[idx] = RoleCandidate::demoted();
    }
    demoted
}

#[derive(Debug, Clone, Default)]
pub struct RoleClassifier {
    cfg: RoleConfig,
}

impl RoleClassifier {
    pub fn new(cfg: RoleConfig) -> Self {
        Self { cfg }
    }

    /// Assigns exactly one role to every player. Iteration order matters: it breaks
    /// entry-attempt ties and drives the team split when team ids are unusable.
    pub fn classify_roles<'a, I>(&self, players: I) -> RoleAssignment
    where
        I: IntoIterator<Item = (&'a str, &'a PlayerFeatures)>,
    {
        let players: Vec<(&str, &PlayerFeatures)> = players.into_iter().collect();
        if players.is_empty() {
            return RoleAssignment::default();
        }

        let roster = RosterContext::build(&self.cfg, &players);
        let mut candidates: Vec<RoleCandidate> = players
            .iter()
            .enumerate()
            .map(|(index, (_, player))| {
                run_ladder(&RuleInput {
                    cfg: &self.cfg,
                    roster: &roster,
                    index,
                    player,
                })
            })
            .collect();

        let teams = partition_teams(&players);
        let quotas = [
            (Role::AWPer, self.cfg.max_awpers_per_team),
            (Role::Entry, self.cfg.max_entries_per_team),
        ];
        for (role, max) in quotas {
            for team in &teams {
                for idx in enforce_quota(&mut candidates, &team.members, role, max) {
                    debug!(
                        player = players[idx].0,
                        team = team.key,
                        from = %role,
                        "quota demotion to Trader"
                    );
                }
            }
        }

        RoleAssignment {
            entries: players
                .iter()
                .zip(candidates)
                .map(|((id, _), c)| RoleEntry {
                    player_id: (*id).to_string(),
                    role: c.role,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(players: &[(&str, &PlayerFeatures)]) -> RosterContext {
        RosterContext::build(&RoleConfig::default(), players)
    }

    fn ladder_for(player: &PlayerFeatures) -> RoleCandidate {
        let cfg = RoleConfig::default();
        let roster = ctx(&[("p", player)]);
        run_ladder(&RuleInput {
            cfg: &cfg,
            roster: &roster,
            index: 0,
            player,
        })
    }

    #[test]
    fn awper_rule_uses_kill_share() {
        let p = PlayerFeatures {
            kills: 10,
            awp_kills: 5,
            ..Default::default()
        };
        let c = ladder_for(&p);
        assert_eq!(c.role, Role::AWPer);
        assert!((c.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn single_awp_kill_is_not_awper() {
        let p = PlayerFeatures {
            kills: 2,
            awp_kills: 1,
            ..Default::default()
        };
        assert_ne!(ladder_for(&p).role, Role::AWPer);
    }

    #[test]
    fn entry_score_adds_trade_and_flash_bonus() {
        let p = PlayerFeatures {
            kills: 6,
            deaths: 5,
            entry_kills: 3,
            entry_deaths: 1,
            tradeable_deaths: 2,
            flashes_thrown: 2,
            kast_percentage: 0.7,
            ..Default::default()
        };
        let c = ladder_for(&p);
        assert_eq!(c.role, Role::Entry);
        // 0.75 * 3 + 1.5 + 1.0
        assert!((c.score - 4.75).abs() < 1e-9);
    }

    #[test]
    fn failed_entry_gate_demotes_to_trader_before_support() {
        let p = PlayerFeatures {
            entry_kills: 1,
            entry_deaths: 4,
            enemies_blinded: 9,
            kast_percentage: 0.8,
            ..Default::default()
        };
        assert_eq!(ladder_for(&p), RoleCandidate::demoted());
    }

    #[test]
    fn low_kast_fails_entry_gate() {
        let p = PlayerFeatures {
            entry_kills: 4,
            entry_deaths: 0,
            kast_percentage: 0.4,
            ..Default::default()
        };
        assert_eq!(ladder_for(&p).role, Role::Trader);
    }

    #[test]
    fn lurker_rotator_trader_and_default() {
        let lurker = PlayerFeatures {
            avg_teammate_dist: 700.0,
            ..Default::default()
        };
        assert_eq!(ladder_for(&lurker).role, Role::Lurker);

        let rotator = PlayerFeatures {
            swing_kills: 3,
            raw_impact: 45.0,
            ..Default::default()
        };
        let c = ladder_for(&rotator);
        assert_eq!(c.role, Role::Rotator);
        assert!((c.score - 30.0).abs() < 1e-9);

        let trader = PlayerFeatures {
            deaths: 10,
            tradeable_deaths: 4,
            ..Default::default()
        };
        assert_eq!(ladder_for(&trader).role, Role::Trader);

        assert_eq!(
            ladder_for(&PlayerFeatures::default()),
            RoleCandidate::new(Role::SiteAnchor, 0.0)
        );
    }

    #[test]
    fn quota_keeps_two_best_entries() {
        let mut candidates = vec![
            RoleCandidate::new(Role::Entry, 1.0),
            RoleCandidate::new(Role::Entry, 4.0),
            RoleCandidate::new(Role::Entry, 2.5),
        ];
        let demoted = enforce_quota(&mut candidates, &[0, 1, 2], Role::Entry, 2);
        assert_eq!(demoted, vec![0]);
        assert_eq!(candidates[0], RoleCandidate::demoted());
        assert_eq!(candidates[1].role, Role::Entry);
        assert_eq!(candidates[2].role, Role::Entry);
    }

    #[test]
    fn quota_ignores_other_teams() {
        let mut candidates = vec![
            RoleCandidate::new(Role::AWPer, 3.0),
            RoleCandidate::new(Role::AWPer, 2.0),
        ];
        assert!(enforce_quota(&mut candidates, &[0], Role::AWPer, 1).is_empty());
        assert!(enforce_quota(&mut candidates, &[1], Role::AWPer, 1).is_empty());
        assert_eq!(candidates[1].role, Role::AWPer);
    }

    #[test]
    fn partition_falls_back_to_half_split() {
        let a = PlayerFeatures {
            team_id: "ct".into(),
            ..Default::default()
        };
        let b = PlayerFeatures::default();
        let players = [("a", &a), ("b", &b), ("c", &a)];
        let teams = partition_teams(&players);
        assert_eq!(teams[0].members, vec![0]);
        assert_eq!(teams[1].members, vec![1, 2]);
    }

    #[test]
    fn role_parses_display_names_and_aliases() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("anchor".parse::<Role>().unwrap(), Role::SiteAnchor);
        assert!("igl".parse::<Role>().is_err());
    }

    #[test]
    fn default_config_validates() {
        assert!(RoleConfig::default().validate().is_ok());
        let bad = RoleConfig {
            max_entries_per_team: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
