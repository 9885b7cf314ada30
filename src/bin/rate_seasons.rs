use std::path::PathBuf;

use anyhow::{Result, bail};

use xgar::config::engine_config;
use xgar::pipeline;
use xgar::shot_store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg().unwrap_or_else(shot_store::default_db_path);
    let mut conn = shot_store::open_db(&db_path)?;
    let cfg = engine_config()?;

    let seasons = match parse_seasons_arg() {
        Some(list) => list,
        None => shot_store::list_seasons(&conn)?,
    };
    if seasons.is_empty() {
        bail!("no seasons to rate; ingest shot events first or pass --seasons <year,year,...>");
    }

    let mut failures = 0usize;
    for &season in &seasons {
        match pipeline::run_season(&mut conn, season, cfg) {
            Ok(summary) => {
                println!(
                    "season {}: {} games, {} shots, {} rebounds, {} chains frozen, {} unmatchable",
                    summary.season,
                    summary.games,
                    summary.shots,
                    summary.rebounds,
                    summary.frozen_chains,
                    summary.unmatchable
                );
                println!(
                    "  rated {} skaters and {} goalies (primary {})",
                    summary.skaters_rated, summary.goalies_rated, summary.primary_config
                );
                for warning in &summary.warnings {
                    eprintln!("[WARN] season {season}: {warning}");
                }
            }
            Err(err) => {
                failures += 1;
                eprintln!("[WARN] season {season} failed: {err}");
            }
        }
    }
    if failures == seasons.len() {
        bail!("all {failures} seasons failed");
    }
    println!("DB: {}", db_path.display());
    Ok(())
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

fn parse_seasons_arg() -> Option<Vec<i32>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        let raw = if let Some(raw) = arg.strip_prefix("--seasons=") {
            Some(raw.to_string())
        } else if arg == "--seasons" {
            args.get(idx + 1).cloned()
        } else {
            None
        };
        let Some(raw) = raw else { continue };
        let seasons: Vec<i32> = raw
            .split(',')
            .filter_map(|part| part.trim().parse::<i32>().ok())
            .collect();
        if !seasons.is_empty() {
            return Some(seasons);
        }
    }
    None
}
