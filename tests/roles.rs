use std::collections::HashMap;

use proptest::prelude::*;

use frag_rating::{PlayerFeatures, Role, RoleAssignment, RoleClassifier, RoleConfig};

fn classify(roster: &[(String, PlayerFeatures)]) -> RoleAssignment {
    RoleClassifier::default().classify_roles(roster.iter().map(|(id, p)| (id.as_str(), p)))
}

fn entry_fragger(team: &str, entry_kills: u32, entry_deaths: u32) -> PlayerFeatures {
    PlayerFeatures {
        kills: 12,
        deaths: 10,
        entry_kills,
        entry_deaths,
        kast_percentage: 0.75,
        team_id: team.to_string(),
        ..Default::default()
    }
}

fn awper(team: &str, kills: u32, awp_kills: u32) -> PlayerFeatures {
    PlayerFeatures {
        kills,
        deaths: 10,
        awp_kills,
        kast_percentage: 0.7,
        team_id: team.to_string(),
        ..Default::default()
    }
}

fn filler(team: &str) -> PlayerFeatures {
    PlayerFeatures {
        kills: 8,
        deaths: 12,
        tradeable_deaths: 2,
        avg_teammate_dist: 300.0,
        kast_percentage: 0.6,
        team_id: team.to_string(),
        ..Default::default()
    }
}

fn per_team_counts(
    roster: &[(String, PlayerFeatures)],
    roles: &RoleAssignment,
) -> HashMap<String, HashMap<Role, usize>> {
    let mut out: HashMap<String, HashMap<Role, usize>> = HashMap::new();
    for (id, p) in roster {
        let role = roles.get(id).expect("every player has a role");
        *out.entry(p.team_id.clone())
            .or_default()
            .entry(role)
            .or_insert(0) += 1;
    }
    out
}

#[test]
fn empty_roster_yields_empty_assignment() {
    assert!(classify(&[]).is_empty());
}

#[test]
fn awp_share_makes_awper() {
    let roster = vec![("sniper".to_string(), awper("A", 10, 5))];
    assert_eq!(classify(&roster).get("sniper"), Some(Role::AWPer));
}

#[test]
fn zero_stat_player_is_site_anchor() {
    let roster = vec![("idle".to_string(), PlayerFeatures::default())];
    assert_eq!(classify(&roster).get("idle"), Some(Role::SiteAnchor));
}

#[test]
fn extreme_entry_counts_do_not_overflow() {
    let roster = vec![(
        "a".to_string(),
        PlayerFeatures {
            entry_kills: u32::MAX,
            entry_deaths: 1,
            ..Default::default()
        },
    )];
    let roles = classify(&roster);
    assert_eq!(roles.len(), 1);
    assert!(roles.get("a").is_some());
}

#[test]
fn third_entry_on_a_team_is_demoted_to_trader() {
    // Scores 3 + 0.5, 2.25 + 0.5 and 1.33 + 0.5: the last one loses the slot.
    let roster = vec![
        ("a".to_string(), entry_fragger("T", 3, 0)),
        ("b".to_string(), entry_fragger("T", 3, 1)),
        ("c".to_string(), entry_fragger("T", 2, 1)),
        ("d".to_string(), filler("CT")),
        ("e".to_string(), filler("CT")),
    ];
    let roles = classify(&roster);
    assert_eq!(roles.get("a"), Some(Role::Entry));
    assert_eq!(roles.get("b"), Some(Role::Entry));
    assert_eq!(roles.get("c"), Some(Role::Trader));
}

#[test]
fn awper_quota_is_per_team() {
    let roster = vec![
        ("t_awp_main".to_string(), awper("T", 20, 10)),
        ("t_awp_alt".to_string(), awper("T", 10, 4)),
        ("ct_awp".to_string(), awper("CT", 8, 3)),
        ("ct_rifle".to_string(), filler("CT")),
    ];
    let roles = classify(&roster);
    assert_eq!(roles.get("t_awp_main"), Some(Role::AWPer));
    assert_eq!(roles.get("t_awp_alt"), Some(Role::Trader));
    assert_eq!(roles.get("ct_awp"), Some(Role::AWPer));
}

#[test]
fn missing_team_ids_split_roster_by_order() {
    // No usable team ids, so p0..p1 and p2..p4 form the two teams.
    let mut roster: Vec<(String, PlayerFeatures)> = (0..4)
        .map(|i| (format!("p{i}"), awper("", 10, 5 + i)))
        .collect();
    roster.push(("p4".to_string(), filler("unknown")));
    let roles = classify(&roster);

    assert_eq!(roles.get("p0"), Some(Role::Trader));
    assert_eq!(roles.get("p1"), Some(Role::AWPer));
    assert_eq!(roles.get("p2"), Some(Role::Trader));
    assert_eq!(roles.get("p3"), Some(Role::AWPer));
}

#[test]
fn team_ids_are_trimmed_before_grouping() {
    let roster = vec![
        ("padded".to_string(), awper(" CT", 10, 5)),
        ("plain".to_string(), awper("CT", 10, 8)),
        ("t_rifle".to_string(), filler("T")),
    ];
    let roles = classify(&roster);
    assert_eq!(roles.get("plain"), Some(Role::AWPer));
    assert_eq!(roles.get("padded"), Some(Role::Trader));
}

#[test]
fn unknown_team_id_in_any_case_forces_half_split() {
    // Grouped by id, p1 would lose to p3. The split pairs p0 with p1 and p2 with p3.
    let teams = ["T", "Unknown", "T", "UNKNOWN"];
    let roster: Vec<(String, PlayerFeatures)> = teams
        .iter()
        .zip(0u32..)
        .map(|(team, i)| (format!("p{i}"), awper(team, 10, 5 + i)))
        .collect();
    let roles = classify(&roster);
    assert_eq!(roles.get("p0"), Some(Role::Trader));
    assert_eq!(roles.get("p1"), Some(Role::AWPer));
    assert_eq!(roles.get("p2"), Some(Role::Trader));
    assert_eq!(roles.get("p3"), Some(Role::AWPer));
}

#[test]
fn support_threshold_uses_roster_wide_average() {
    let mut heavy = filler("T");
    heavy.flashes_thrown = 6;
    let mut light = filler("CT");
    light.flashes_thrown = 2;
    let roster = vec![
        ("heavy".to_string(), heavy),
        ("light".to_string(), light),
        ("none".to_string(), filler("CT")),
    ];
    let roles = classify(&roster);
    assert_eq!(roles.get("heavy"), Some(Role::Support));
    // 2 < 8 / 3 and no blinds.
    assert_ne!(roles.get("light"), Some(Role::Support));
}

#[test]
fn alternate_tuning_changes_lurker_cutoff() {
    let mut p = filler("T");
    p.avg_teammate_dist = 700.0;
    let roster = vec![("roamer".to_string(), p)];
    assert_eq!(classify(&roster).get("roamer"), Some(Role::Lurker));

    let strict = RoleClassifier::new(RoleConfig {
        lurker_dist_min: 800.0,
        ..Default::default()
    });
    let roles = strict.classify_roles(roster.iter().map(|(id, p)| (id.as_str(), p)));
    assert_eq!(roles.get("roamer"), Some(Role::SiteAnchor));
}

#[test]
fn distribution_counts_every_player() {
    let roster = vec![
        ("a".to_string(), awper("T", 10, 5)),
        ("b".to_string(), filler("T")),
        ("c".to_string(), filler("CT")),
    ];
    let dist = classify(&roster).distribution();
    assert_eq!(dist.values().sum::<usize>(), 3);
    assert_eq!(dist.get(&Role::AWPer), Some(&1));
}

fn arb_features() -> impl Strategy<Value = PlayerFeatures> {
    (
        (0u32..30, 0u32..30, 0u32..15, 0u32..6, 0u32..6, 0u32..15),
        (0u32..10, 0u32..15, 0.0f64..1200.0, 0u32..5, 0.0f64..1.0, 0.0f64..80.0),
        prop::sample::select(vec!["T", "CT", "", "unknown"]),
    )
        .prop_map(
            |(
                (kills, deaths, awp_kills, entry_kills, entry_deaths, flashes_thrown),
                (enemies_blinded, tradeable_deaths, avg_teammate_dist, swing_kills, kast, raw_impact),
                team,
            )| PlayerFeatures {
                kills,
                deaths,
                awp_kills,
                entry_kills,
                entry_deaths,
                flashes_thrown,
                enemies_blinded,
                tradeable_deaths,
                avg_teammate_dist,
                swing_kills,
                kast_percentage: kast,
                raw_impact,
                team_id: team.to_string(),
            },
        )
}

fn arb_roster() -> impl Strategy<Value = Vec<(String, PlayerFeatures)>> {
    prop::collection::vec(arb_features(), 1..12).prop_map(|players| {
        players
            .into_iter()
            .enumerate()
            .map(|(i, p)| (format!("player{i}"), p))
            .collect()
    })
}

proptest! {
    #[test]
    fn every_player_gets_exactly_one_role(roster in arb_roster()) {
        let roles = classify(&roster);
        prop_assert_eq!(roles.len(), roster.len());
        for ((id, _), (assigned, role)) in roster.iter().zip(roles.iter()) {
            prop_assert_eq!(id.as_str(), assigned);
            prop_assert!(Role::ALL.contains(&role));
        }
    }

    #[test]
    fn quotas_hold_for_explicit_teams(
        players in prop::collection::vec(arb_features(), 2..12)
    ) {
        let roster: Vec<(String, PlayerFeatures)> = players
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.team_id = if i % 2 == 0 { "T".into() } else { "CT".into() };
                (format!("player{i}"), p)
            })
            .collect();
        let roles = classify(&roster);
        for counts in per_team_counts(&roster, &roles).values() {
            prop_assert!(counts.get(&Role::AWPer).copied().unwrap_or(0) <= 1);
            prop_assert!(counts.get(&Role::Entry).copied().unwrap_or(0) <= 2);
        }
    }

    #[test]
    fn classification_is_deterministic(roster in arb_roster()) {
        let first = serde_json::to_string(&classify(&roster)).unwrap();
        let second = serde_json::to_string(&classify(&roster)).unwrap();
        prop_assert_eq!(first, second);
    }
}
