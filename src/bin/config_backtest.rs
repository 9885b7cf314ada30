use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Utc;

use xgar::config::{AdjrpVariant, configuration_by_name, engine_config};
use xgar::pipeline;
use xgar::rating_store::{self, PrimaryConfigRow};
use xgar::shot_store;
use xgar::validation::INDEPENDENCE_TARGET;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg().unwrap_or_else(shot_store::default_db_path);
    let mut conn = shot_store::open_db(&db_path)?;

    let Some(season) = parse_i64_arg("--season") else {
        bail!("pass --season <year>");
    };
    let season = season as i32;

    let mut cfg = engine_config()?.clone();
    if let Some(seed) = parse_i64_arg("--seed") {
        cfg.split_seed = seed as u64;
    }
    if let Some(min) = parse_i64_arg("--min-shots") {
        cfg.split_min_shots = min.max(0) as usize;
    }
    cfg.validate()?;

    eprintln!("[INFO] split-half backtest for season {season} (seed {})", cfg.split_seed);
    let computation = pipeline::compute_season(&conn, season, &cfg)?;
    let report = pipeline::validation_report(&computation, &cfg)?;

    println!(
        "season {season}: {} goalies sampled (>= {} shots faced)",
        report.sampled_goalies, cfg.split_min_shots
    );
    println!("baseline gsax-only: {}", fmt_r(report.baseline_stability));
    for c in &report.configs {
        let marker = if c.name == report.selected { "  <- primary" } else { "" };
        println!(
            "  {:<14} stability {}  pairs {}{}",
            c.name,
            fmt_r(c.stability),
            c.pairs,
            marker
        );
    }
    for (variant, r) in ["raw", "c5000", "c10000"].iter().zip(report.independence.iter()) {
        println!("independence adjrp_{variant} vs gsax: {}", fmt_r(*r));
        if let Some(r) = r
            && r.abs() >= INDEPENDENCE_TARGET
        {
            eprintln!(
                "[WARN] adjrp_{variant} correlates with gsax at {r:.3}; the components overlap"
            );
        }
    }
    if report.below_target {
        eprintln!("[WARN] no configuration beat the gsax-only baseline; selection is flagged");
    }

    let stability = report
        .configs
        .iter()
        .find(|c| c.name == report.selected)
        .and_then(|c| c.stability);
    let independence_slot = configuration_by_name(report.selected)
        .map(|c| match c.adjrp {
            AdjrpVariant::Raw => 0,
            AdjrpVariant::Shrunk5000 => 1,
            AdjrpVariant::Shrunk10000 => 2,
        })
        .unwrap_or(1);
    rating_store::set_primary_config(
        &mut conn,
        &PrimaryConfigRow {
            season,
            config: report.selected.to_string(),
            stability_r: stability,
            baseline_r: report.baseline_stability,
            independence_r: report.independence[independence_slot],
            below_target: report.below_target,
            selected_at: Utc::now().to_rfc3339(),
        },
    )?;
    println!("primary configuration for {season}: {}", report.selected);
    Ok(())
}

fn fmt_r(r: Option<f64>) -> String {
    match r {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    }
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn parse_i64_arg(flag: &str) -> Option<i64> {
    let prefix = format!("{flag}=");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            if let Ok(v) = raw.trim().parse() {
                return Some(v);
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if let Ok(v) = next.trim().parse() {
                return Some(v);
            }
        }
    }
    None
}
