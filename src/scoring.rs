use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// Utility score returned when a player has no utility data at all.
/// Callers hide the category; it is not a real zero.
pub const UTILITY_HIDDEN: i32 = -1;

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub min: f64,
    pub max: f64,
}

impl Window {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamped min-max scaling onto 0..=100, truncated.
    pub fn normalize(&self, value: f64) -> i32 {
        if value <= self.min {
            return 0;
        }
        if value >= self.max {
            return 100;
        }
        ((value - self.min) / (self.max - self.min) * 100.0) as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub percent: f64,
    pub multiplier: f64,
}

/// Piecewise-linear counter-strafe multiplier. Breakpoints are stored from the
/// highest percent down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterStrafeCurve {
    breakpoints: Vec<Breakpoint>,
}

impl Default for CounterStrafeCurve {
    fn default() -> Self {
        Self::new(vec![
            Breakpoint { percent: 95.0, multiplier: 1.00 },
            Breakpoint { percent: 85.0, multiplier: 0.92 },
            Breakpoint { percent: 75.0, multiplier: 0.82 },
            Breakpoint { percent: 65.0, multiplier: 0.72 },
            Breakpoint { percent: 60.0, multiplier: 0.60 },
        ])
    }
}

impl CounterStrafeCurve {
    pub fn new(breakpoints: Vec<Breakpoint>) -> Self {
        Self { breakpoints }
    }

    pub fn multiplier(&self, counter_strafe_percent: f64) -> f64 {
        let (Some(top), Some(bottom)) = (self.breakpoints.first(), self.breakpoints.last()) else {
            return 1.0;
        };
        if counter_strafe_percent >= top.percent {
            return top.multiplier;
        }
        if counter_strafe_percent < bottom.percent {
            return bottom.multiplier;
        }
        for pair in self.breakpoints.windows(2) {
            let (upper, lower) = (pair[0], pair[1]);
            if lower.percent <= counter_strafe_percent && counter_strafe_percent < upper.percent {
                let ratio = (counter_strafe_percent - lower.percent) / (upper.percent - lower.percent);
                return lower.multiplier + ratio * (upper.multiplier - lower.multiplier);
            }
        }
        1.0
    }

    fn validate(&self) -> Result<()> {
        if self.breakpoints.is_empty() {
            bail!("counter-strafe curve needs at least one breakpoint");
        }
        for bp in &self.breakpoints {
            if !bp.percent.is_finite() || !(bp.multiplier > 0.0 && bp.multiplier <= 1.0) {
                bail!(
                    "counter-strafe breakpoint {}% has multiplier {} outside (0, 1]",
                    bp.percent,
                    bp.multiplier
                );
            }
        }
        for pair in self.breakpoints.windows(2) {
            if pair[0].percent <= pair[1].percent {
                bail!(
                    "counter-strafe breakpoints must descend: {} then {}",
                    pair[0].percent,
                    pair[1].percent
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactCap {
    pub impact_max: i32,
    pub cap: f64,
}

/// Per-event weights of the impact sum. Penalties carry their sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactWeights {
    pub kill_won_round: f64,
    pub kill_lost_round: f64,
    pub exit_frag: f64,
    pub opening_kill_won: f64,
    pub opening_kill_lost: f64,
    pub entry_death: f64,
    pub clutch_1v1: f64,
    pub clutch_1vn: f64,
    pub multikill_round: f64,
    pub tradeable_death: f64,
    pub untradeable_death: f64,
    pub kill_floor: f64,
}

impl Default for ImpactWeights {
    fn default() -> Self {
        Self {
            kill_won_round: 6.0,
            kill_lost_round: 0.5,
            exit_frag: -5.0,
            opening_kill_won: 10.0,
            opening_kill_lost: 2.0,
            entry_death: -6.0,
            clutch_1v1: 15.0,
            clutch_1vn: 25.0,
            multikill_round: 5.0,
            tradeable_death: -1.0,
            untradeable_death: -6.0,
            kill_floor: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub hs_window: Window,
    pub kpr_window: Window,
    pub adr_window: Window,
    pub aim_weights: [f64; 3],
    pub counter_strafe: CounterStrafeCurve,

    pub positioning_base: f64,
    pub positioning_untradeable_penalty: f64,
    pub positioning_trade_bonus: f64,
    pub positioning_survival_bonus: f64,

    pub utility_blinded_target: f64,
    pub utility_damage_target: f64,
    pub utility_uses_target: f64,
    pub utility_weights: [f64; 3],

    pub impact: ImpactWeights,

    // aim, positioning, impact
    pub rating_weights: [f64; 3],
    pub missing_category: f64,
    pub death_tax: f64,
    // Ascending by impact_max; the first band the impact falls into applies.
    pub impact_caps: Vec<ImpactCap>,
    pub entry_kdr_min: f64,
    pub entry_low_kdr_mult: f64,
    pub awp_survival_min: f64,
    pub awp_survival_bonus: f64,
    pub awp_opening_kill_bonus: f64,
    pub awp_kdr_min: f64,
    pub awp_low_kdr_mult: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            hs_window: Window::new(0.35, 0.65),
            kpr_window: Window::new(0.5, 1.0),
            adr_window: Window::new(60.0, 120.0),
            aim_weights: [0.35, 0.35, 0.30],
            counter_strafe: CounterStrafeCurve::default(),
            positioning_base: 70.0,
            positioning_untradeable_penalty: 70.0,
            positioning_trade_bonus: 25.0,
            positioning_survival_bonus: 15.0,
            utility_blinded_target: 10.0,
            utility_damage_target: 200.0,
            utility_uses_target: 15.0,
            utility_weights: [0.4, 0.3, 0.3],
            impact: ImpactWeights::default(),
            rating_weights: [0.35, 0.25, 0.40],
            missing_category: 50.0,
            death_tax: 0.5,
            impact_caps: vec![
                ImpactCap {
                    impact_max: 15,
                    cap: 35.0,
                },
                ImpactCap {
                    impact_max: 40,
                    cap: 50.0,
                },
            ],
            entry_kdr_min: 0.8,
            entry_low_kdr_mult: 0.75,
            awp_survival_min: 0.5,
            awp_survival_bonus: 5.0,
            awp_opening_kill_bonus: 2.0,
            awp_kdr_min: 0.8,
            awp_low_kdr_mult: 0.80,
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("hs_window", self.hs_window),
            ("kpr_window", self.kpr_window),
            ("adr_window", self.adr_window),
        ] {
            if !(w.min.is_finite() && w.max.is_finite() && w.min < w.max) {
                bail!("score config {name} needs min < max, got {} .. {}", w.min, w.max);
            }
        }
        let targets = [
            ("utility_blinded_target", self.utility_blinded_target),
            ("utility_damage_target", self.utility_damage_target),
            ("utility_uses_target", self.utility_uses_target),
        ];
        for (name, value) in targets {
            if !value.is_finite() || value <= 0.0 {
                bail!("score config {name} must be positive, got {value}");
            }
        }
        let weights = self
            .aim_weights
            .iter()
            .chain(&self.utility_weights)
            .chain(&self.rating_weights);
        for w in weights {
            if !w.is_finite() || *w < 0.0 {
                bail!("score weights must be finite and non-negative, got {w}");
            }
        }
        for (name, mult) in [
            ("entry_low_kdr_mult", self.entry_low_kdr_mult),
            ("awp_low_kdr_mult", self.awp_low_kdr_mult),
        ] {
            if !(mult > 0.0 && mult <= 1.0) {
                bail!("score config {name} must be within (0, 1], got {mult}");
            }
        }
        for pair in self.impact_caps.windows(2) {
            if pair[0].impact_max >= pair[1].impact_max {
                bail!("impact caps must ascend by impact_max");
            }
        }
        self.counter_strafe.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryScores {
    pub aim: i32,
    pub positioning: i32,
    // UTILITY_HIDDEN when the player had no utility data.
    pub utility: i32,
    pub impact: i32,
}

impl CategoryScores {
    pub fn utility_visible(&self) -> Option<i32> {
        (self.utility != UTILITY_HIDDEN).then_some(self.utility)
    }
}

/// Categories feeding the final rating; a missing one counts as the configured neutral value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingCategories {
    pub aim: Option<i32>,
    pub positioning: Option<i32>,
    pub impact: Option<i32>,
}

impl From<&CategoryScores> for RatingCategories {
    fn from(s: &CategoryScores) -> Self {
        Self {
            aim: Some(s.aim),
            positioning: Some(s.positioning),
            impact: Some(s.impact),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingContext {
    pub role: Role,
    pub kdr: f64,
    pub untradeable_deaths: u32,
    pub survival_rate: f64,
    pub opening_kills: u32,
}

/// Round-context counters for the impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactCounters {
    pub opening_kills_won: u32,
    pub opening_kills_lost: u32,
    pub entry_deaths: u32,
    pub kills_in_won_rounds: u32,
    pub kills_in_lost_rounds: u32,
    pub exit_frags: u32,
    pub multikill_rounds: u32,
    pub clutches_1v1: u32,
    pub clutches_1vn: u32,
    pub untradeable_deaths: u32,
    pub tradeable_deaths: u32,
    pub total_kills: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactBand {
    Idle,
    LowImpact,
    Contributor,
    Carry,
}

impl ImpactBand {
    pub fn classify(impact: i32) -> Self {
        match impact {
            i32::MIN..=10 => ImpactBand::Idle,
            11..=30 => ImpactBand::LowImpact,
            31..=60 => ImpactBand::Contributor,
            _ => ImpactBand::Carry,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImpactBand::Idle => "Idle",
            ImpactBand::LowImpact => "Low Impact",
            ImpactBand::Contributor => "Contributor",
            ImpactBand::Carry => "Carry",
        }
    }
}

fn clamp_score(value: f64) -> i32 {
    value.clamp(SCORE_MIN, SCORE_MAX) as i32
}

#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    cfg: ScoreConfig,
}

impl ScoreEngine {
    pub fn new(cfg: ScoreConfig) -> Self {
        Self { cfg }
    }

    /// Returns `(raw_aim, effective_aim)`; the effective value carries the counter-strafe penalty.
    pub fn compute_aim_score(
        &self,
        hs_percent: f64,
        kpr: f64,
        adr: f64,
        counter_strafe_percent: f64,
    ) -> (i32, i32) {
        let cfg = &self.cfg;
        let [w_hs, w_kpr, w_adr] = cfg.aim_weights;
        let raw_score = w_hs * cfg.hs_window.normalize(hs_percent) as f64
            + w_kpr * cfg.kpr_window.normalize(kpr) as f64
            + w_adr * cfg.adr_window.normalize(adr) as f64;
        let raw_aim = clamp_score(raw_score);

        let multiplier = cfg.counter_strafe.multiplier(counter_strafe_percent);
        let effective_aim = clamp_score(raw_score * multiplier);
        (raw_aim, effective_aim)
    }

    pub fn compute_positioning_score(
        &self,
        untradeable_ratio: f64,
        trade_success_rate: f64,
        survival_rate: f64,
    ) -> i32 {
        let cfg = &self.cfg;
        let score = cfg.positioning_base - untradeable_ratio * cfg.positioning_untradeable_penalty
            + trade_success_rate * cfg.positioning_trade_bonus
            + survival_rate * cfg.positioning_survival_bonus;
        clamp_score(score)
    }

    /// Returns [`UTILITY_HIDDEN`] when every input is zero.
    pub fn compute_utility_score(
        &self,
        enemies_blinded: u32,
        utility_damage: u32,
        flashes_thrown: u32,
    ) -> i32 {
        if enemies_blinded == 0 && utility_damage == 0 && flashes_thrown == 0 {
            return UTILITY_HIDDEN;
        }
        let cfg = &self.cfg;
        let blinded = Window::new(0.0, cfg.utility_blinded_target).normalize(enemies_blinded as f64);
        let damage = Window::new(0.0, cfg.utility_damage_target).normalize(utility_damage as f64);
        let uses = Window::new(0.0, cfg.utility_uses_target).normalize(flashes_thrown as f64);
        let [w_blind, w_dmg, w_use] = cfg.utility_weights;
        clamp_score(w_blind * blinded as f64 + w_dmg * damage as f64 + w_use * uses as f64)
    }

    pub fn compute_impact_score(&self, c: &ImpactCounters) -> i32 {
        let w = &self.cfg.impact;
        let terms = [
            (c.kills_in_won_rounds, w.kill_won_round),
            (c.kills_in_lost_rounds, w.kill_lost_round),
            (c.exit_frags, w.exit_frag),
            (c.opening_kills_won, w.opening_kill_won),
            (c.opening_kills_lost, w.opening_kill_lost),
            (c.entry_deaths, w.entry_death),
            (c.clutches_1v1, w.clutch_1v1),
            (c.clutches_1vn, w.clutch_1vn),
            (c.multikill_rounds, w.multikill_round),
            (c.tradeable_deaths, w.tradeable_death),
            (c.untradeable_deaths, w.untradeable_death),
        ];
        let mut impact: f64 = terms.iter().map(|&(n, weight)| n as f64 * weight).sum();

        // Anyone with a kill keeps a small floor; zero-kill players may sit at 0.
        if c.total_kills > 0 && impact < 0.0 {
            impact = impact.max(w.kill_floor);
        }
        clamp_score(impact)
    }

    /// Weighted sum, then death tax and impact-band cap, then the role adjustment.
    pub fn compute_final_rating(&self, scores: RatingCategories, ctx: &RatingContext) -> i32 {
        let cfg = &self.cfg;
        let category = |v: Option<i32>| v.map(f64::from).unwrap_or(cfg.missing_category);
        let aim = category(scores.aim);
        let positioning = category(scores.positioning);
        let impact = category(scores.impact);

        let [w_aim, w_pos, w_imp] = cfg.rating_weights;
        let mut rating = aim * w_aim + positioning * w_pos + impact * w_imp;

        rating -= ctx.untradeable_deaths as f64 * cfg.death_tax;

        if let Some(band) = cfg
            .impact_caps
            .iter()
            .find(|band| impact <= band.impact_max as f64)
        {
            rating = rating.min(band.cap);
        }

        match ctx.role {
            Role::Entry => {
                if ctx.kdr < cfg.entry_kdr_min {
                    rating *= cfg.entry_low_kdr_mult;
                }
            }
            Role::AWPer => {
                if ctx.survival_rate > cfg.awp_survival_min {
                    rating += cfg.awp_survival_bonus;
                }
                rating += ctx.opening_kills as f64 * cfg.awp_opening_kill_bonus;
                if ctx.kdr < cfg.awp_kdr_min {
                    rating *= cfg.awp_low_kdr_mult;
                }
            }
            _ => {}
        }

        clamp_score(rating)
    }
}
