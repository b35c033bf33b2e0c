use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use frag_rating::report::MatchInput;
use frag_rating::{load_tuning, rate_match};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/match_case.json"));

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let input: MatchInput =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    let tuning = load_tuning()?;

    // One snapshot in, roles and ratings out. Handy when adjusting a tuning file.
    let report = rate_match(&tuning, &input);

    println!("Match: {}", report.match_id.as_deref().unwrap_or("-"));
    for (role, count) in &report.role_distribution {
        println!("  {role:<10} x{count}");
    }
    println!();
    println!(
        "{:<16} {:<10} {:>4} {:>4} {:>4} {:>4} {:>6}  {}",
        "player", "role", "aim", "pos", "util", "imp", "rating", "band"
    );
    for row in &report.players {
        let util = row
            .scores
            .utility_visible()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<10} {:>4} {:>4} {:>4} {:>4} {:>6}  {}",
            row.player_id,
            row.role.as_str(),
            row.scores.aim,
            row.scores.positioning,
            util,
            row.scores.impact,
            row.final_rating,
            row.impact_band.label()
        );
    }

    Ok(())
}
