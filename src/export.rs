use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::config::CONFIGURATIONS;
use crate::rating_store::{self, PlayerKind, PlayerRatingRow};

pub struct ExportReport {
    pub ratings: usize,
    pub component_rates: usize,
    pub replacement_levels: usize,
    pub primary_config: String,
}

/// Write one season's stored artifacts to a workbook: the rating table ranked
/// by the primary number, the raw/regressed component rates, and the
/// replacement levels behind them.
pub fn export_season(conn: &Connection, season: i32, path: &Path) -> Result<ExportReport> {
    let ratings = rating_store::load_season_ratings(conn, season)?;
    let rates = rating_store::load_season_component_rates(conn, season)?;
    let replacement = rating_store::load_season_replacement(conn, season)?;
    let primary = rating_store::effective_primary_config(conn, season)?;

    let mut ranked: Vec<&PlayerRatingRow> = ratings.iter().collect();
    ranked.sort_by(|a, b| match (a.rating_primary, b.rating_primary) {
        (Some(x), Some(y)) => y
            .partial_cmp(&x)
            .unwrap_or(Ordering::Equal)
            .then(a.player_id.cmp(&b.player_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.player_id.cmp(&b.player_id),
    });

    let mut rating_rows = vec![rating_header(&primary)];
    for row in &ranked {
        rating_rows.push(rating_row(row));
    }

    let mut component_rows = vec![vec![
        "Player ID".to_string(),
        "Component".to_string(),
        "Raw Rate".to_string(),
        "Denominator".to_string(),
        "Regressed Rate".to_string(),
    ]];
    for rate in &rates {
        component_rows.push(vec![
            rate.player_id.to_string(),
            rate.component.as_str().to_string(),
            num_cell(rate.raw, 6),
            format!("{:.2}", rate.denominator),
            num_cell(Some(rate.regressed), 6),
        ]);
    }

    let mut replacement_rows = vec![vec![
        "Component".to_string(),
        "Percentile".to_string(),
        "Replacement Rate".to_string(),
        "Eligible Players".to_string(),
    ]];
    for level in &replacement {
        replacement_rows.push(vec![
            level.component.as_str().to_string(),
            format!("{:.1}", level.percentile),
            num_cell(Some(level.value), 6),
            level.eligible_players.to_string(),
        ]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ratings")?;
        write_rows(sheet, &rating_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Components")?;
        write_rows(sheet, &component_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Replacement")?;
        write_rows(sheet, &replacement_rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        ratings: rating_rows.len().saturating_sub(1),
        component_rates: component_rows.len().saturating_sub(1),
        replacement_levels: replacement_rows.len().saturating_sub(1),
        primary_config: primary,
    })
}

fn rating_header(primary: &str) -> Vec<String> {
    let mut header = vec![
        "Player ID".to_string(),
        "Kind".to_string(),
        format!("Primary ({primary})"),
        "Skater Total".to_string(),
        "EV Offense".to_string(),
        "EV Defense".to_string(),
        "PP Offense".to_string(),
        "PP Defense".to_string(),
        "Penalty".to_string(),
        "GSAx Goals".to_string(),
        "AdjRP Raw".to_string(),
        "AdjRP c5000".to_string(),
        "AdjRP c10000".to_string(),
    ];
    for c in &CONFIGURATIONS {
        header.push(format!("Rating {}", c.name));
    }
    header
}

fn rating_row(row: &PlayerRatingRow) -> Vec<String> {
    let kind = match row.kind {
        Some(PlayerKind::Skater) => "skater",
        Some(PlayerKind::Goalie) => "goalie",
        None => "",
    };
    let mut cells = vec![
        row.player_id.to_string(),
        kind.to_string(),
        num_cell(row.rating_primary, 4),
        num_cell(row.skater_total, 4),
        num_cell(row.score_ev_offense, 4),
        num_cell(row.score_ev_defense, 4),
        num_cell(row.score_pp_offense, 4),
        num_cell(row.score_pp_defense, 4),
        num_cell(row.score_penalty, 4),
        num_cell(row.gsax_goals, 4),
        num_cell(row.score_adjrp_raw, 4),
        num_cell(row.score_adjrp_c5000, 4),
        num_cell(row.score_adjrp_c10000, 4),
    ];
    for rating in row.ratings {
        cells.push(num_cell(rating, 4));
    }
    cells
}

fn num_cell(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::GoalieScores;
    use crate::config::DEFAULT_PRIMARY_CONFIG;
    use crate::rating_store::{ComponentRateRow, SeasonReplacementRow, persist_season};
    use crate::shot_store::open_in_memory;
    use crate::shots::Component;

    #[test]
    fn export_writes_all_three_sheets() {
        let mut conn = open_in_memory().unwrap();
        let scores = GoalieScores {
            player_id: 900,
            gsax_goals: Some(6.5),
            adjrp_scores: [None, Some(0.4), Some(0.3)],
            ratings: [None, Some(5.0), Some(5.5), Some(5.8), Some(4.9), Some(5.4), Some(5.7)],
        };
        let ratings = vec![PlayerRatingRow::goalie(2024, &scores, DEFAULT_PRIMARY_CONFIG)];
        let rates = vec![ComponentRateRow {
            player_id: 900,
            season: 2024,
            component: Component::Gsax,
            raw: Some(0.011),
            denominator: 620.0,
            regressed: 0.0095,
        }];
        let repl = vec![SeasonReplacementRow {
            season: 2024,
            component: Component::Gsax,
            percentile: 75.0,
            value: -0.003,
            eligible_players: 28,
        }];
        persist_season(&mut conn, 2024, &rates, &repl, &ratings).unwrap();

        let out = std::env::temp_dir().join("xgar_export_test.xlsx");
        let report = export_season(&conn, 2024, &out).unwrap();
        assert_eq!(report.ratings, 1);
        assert_eq!(report.component_rates, 1);
        assert_eq!(report.replacement_levels, 1);
        assert_eq!(report.primary_config, DEFAULT_PRIMARY_CONFIG);
        assert!(out.exists());
        let _ = std::fs::remove_file(out);
    }

    #[test]
    fn missing_values_export_as_blank_cells() {
        assert_eq!(num_cell(None, 4), "");
        assert_eq!(num_cell(Some(1.25), 4), "1.2500");
        assert_eq!(num_cell(Some(-0.0031), 6), "-0.003100");
    }
}
