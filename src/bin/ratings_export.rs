use std::path::PathBuf;

use anyhow::{Result, bail};

use xgar::export;
use xgar::shot_store;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg().unwrap_or_else(shot_store::default_db_path);
    let conn = shot_store::open_db(&db_path)?;

    let Some(season) = parse_season_arg() else {
        bail!("pass --season <year>");
    };
    let out = parse_out_arg().unwrap_or_else(|| PathBuf::from(format!("xgar_{season}.xlsx")));

    let report = export::export_season(&conn, season, &out)?;
    println!("exported season {season} to {}", out.display());
    println!(
        "  {} rating rows (primary {}), {} component rates, {} replacement levels",
        report.ratings, report.primary_config, report.component_rates, report.replacement_levels
    );
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

fn parse_out_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--out=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--out" {
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

fn parse_season_arg() -> Option<i32> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--season=") {
            if let Ok(v) = raw.trim().parse() {
                return Some(v);
            }
        }
        if arg == "--season" {
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
