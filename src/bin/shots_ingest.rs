use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::RowAccessor;

use xgar::shot_store;
use xgar::shots::{FreezeEvent, PenaltyTotals, ShiftInterval, ShotEvent, Strength, ToiTotals};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let db_path = parse_db_path_arg().unwrap_or_else(shot_store::default_db_path);
    let mut conn = shot_store::open_db(&db_path)?;

    let mut ingested_any = false;
    if let Some(path) = parse_file_arg("--shots") {
        let rows = read_shots(&path)?;
        let n = shot_store::upsert_shots(&mut conn, &rows)?;
        println!("shots: {n} rows from {}", path.display());
        ingested_any = true;
    }
    if let Some(path) = parse_file_arg("--freezes") {
        let rows = read_freezes(&path)?;
        let n = shot_store::upsert_freezes(&mut conn, &rows)?;
        println!("freezes: {n} rows from {}", path.display());
        ingested_any = true;
    }
    if let Some(path) = parse_file_arg("--shifts") {
        let rows = read_shifts(&path)?;
        let n = shot_store::upsert_shifts(&mut conn, &rows)?;
        println!("shifts: {n} rows from {}", path.display());
        ingested_any = true;
    }
    if let Some(path) = parse_file_arg("--toi") {
        let rows = read_toi(&path)?;
        let n = shot_store::upsert_toi(&mut conn, &rows)?;
        println!("toi totals: {n} rows from {}", path.display());
        ingested_any = true;
    }
    if let Some(path) = parse_file_arg("--penalties") {
        let rows = read_penalties(&path)?;
        let n = shot_store::upsert_penalties(&mut conn, &rows)?;
        println!("penalty totals: {n} rows from {}", path.display());
        ingested_any = true;
    }

    if !ingested_any {
        bail!(
            "nothing to ingest; pass any of --shots/--freezes/--shifts/--toi/--penalties <file.parquet>"
        );
    }
    println!("DB: {}", db_path.display());
    Ok(())
}

/// Lower-cased leaf column names of a flat parquet file, for lookup by any of
/// the names feeds are known to use.
struct Columns(Vec<String>);

impl Columns {
    fn from_reader(reader: &SerializedFileReader<fs::File>) -> Columns {
        let schema = reader.metadata().file_metadata().schema_descr();
        Columns(
            (0..schema.num_columns())
                .map(|i| schema.column(i).name().to_ascii_lowercase())
                .collect(),
        )
    }

    fn any(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.0.iter().position(|c| c == name))
    }

    fn require(&self, names: &[&str]) -> Result<usize> {
        self.any(names)
            .ok_or_else(|| anyhow!("missing column {} (accepted names: {names:?})", names[0]))
    }
}

fn open_reader(path: &Path) -> Result<SerializedFileReader<fs::File>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    SerializedFileReader::new(file).with_context(|| format!("read parquet {}", path.display()))
}

fn read_shots(path: &Path) -> Result<Vec<ShotEvent>> {
    let reader = open_reader(path)?;
    let cols = Columns::from_reader(&reader);
    let game_id = cols.require(&["game_id"])?;
    let event_idx = cols.require(&["event_idx", "event_id", "event_number"])?;
    let season = cols.require(&["season"])?;
    let team_id = cols.require(&["team_id", "shooting_team_id"])?;
    let shooter_id = cols.require(&["shooter_id", "shooter_player_id", "player_id"])?;
    let is_goal = cols.require(&["is_goal", "goal"])?;
    let period = cols.any(&["period", "period_number"]);
    let period_seconds = cols.any(&["period_seconds", "time_in_period", "seconds_elapsed"]);
    let goalie_id = cols.any(&["goalie_id", "goalie_id_for_shot"]);
    let xg = cols.any(&["xg", "x_goal", "xgoal", "expected_goals"]);
    let on_goal = cols.any(&["on_goal", "shot_was_on_goal", "on_net"]);
    let strength = cols.any(&["strength", "strength_state", "situation"]);

    let iter = reader.get_row_iter(None).context("iterate shot rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let (Some(game_id), Some(event_idx), Some(season), Some(team_id), Some(shooter_id)) = (
            read_i64(&row, game_id),
            read_i64(&row, event_idx),
            read_i64(&row, season),
            read_i64(&row, team_id),
            read_i64(&row, shooter_id),
        ) else {
            skipped += 1;
            continue;
        };
        let is_goal = read_bool(&row, is_goal);
        out.push(ShotEvent {
            game_id,
            event_idx,
            season: season as i32,
            period: period.and_then(|i| read_i64(&row, i)).map(|p| p as i32),
            period_seconds: period_seconds.and_then(|i| read_f64(&row, i)),
            team_id,
            shooter_id,
            // Empty nets show up as null or zero ids.
            goalie_id: goalie_id.and_then(|i| read_i64(&row, i)).filter(|id| *id > 0),
            xg: xg.and_then(|i| read_f64(&row, i)).filter(|v| v.is_finite()),
            is_goal,
            // A goal always counts as on goal, whatever the feed says.
            on_goal: is_goal || on_goal.map(|i| read_bool(&row, i)).unwrap_or(false),
            strength: strength
                .and_then(|i| read_string(&row, i))
                .map(|s| Strength::parse(&s))
                .unwrap_or(Strength::Other),
        });
    }
    if skipped > 0 {
        eprintln!("[WARN] {skipped} shot rows skipped (missing required fields)");
    }
    Ok(out)
}

fn read_freezes(path: &Path) -> Result<Vec<FreezeEvent>> {
    let reader = open_reader(path)?;
    let cols = Columns::from_reader(&reader);
    let game_id = cols.require(&["game_id"])?;
    let event_idx = cols.require(&["event_idx", "event_id", "event_number"])?;
    let season = cols.require(&["season"])?;
    let team_id = cols.require(&["team_id", "defending_team_id"])?;
    let period = cols.any(&["period", "period_number"]);
    let period_seconds = cols.any(&["period_seconds", "time_in_period", "seconds_elapsed"]);
    let goalie_id = cols.any(&["goalie_id"]);

    let iter = reader.get_row_iter(None).context("iterate freeze rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let (Some(game_id), Some(event_idx), Some(season), Some(team_id)) = (
            read_i64(&row, game_id),
            read_i64(&row, event_idx),
            read_i64(&row, season),
            read_i64(&row, team_id),
        ) else {
            skipped += 1;
            continue;
        };
        out.push(FreezeEvent {
            game_id,
            event_idx,
            season: season as i32,
            period: period.and_then(|i| read_i64(&row, i)).map(|p| p as i32),
            period_seconds: period_seconds.and_then(|i| read_f64(&row, i)),
            team_id,
            goalie_id: goalie_id.and_then(|i| read_i64(&row, i)).filter(|id| *id > 0),
        });
    }
    if skipped > 0 {
        eprintln!("[WARN] {skipped} freeze rows skipped (missing required fields)");
    }
    Ok(out)
}

fn read_shifts(path: &Path) -> Result<Vec<ShiftInterval>> {
    let reader = open_reader(path)?;
    let cols = Columns::from_reader(&reader);
    let game_id = cols.require(&["game_id"])?;
    let season = cols.require(&["season"])?;
    let player_id = cols.require(&["player_id"])?;
    let team_id = cols.require(&["team_id"])?;
    let period = cols.require(&["period", "period_number"])?;
    let start_seconds = cols.require(&["start_seconds", "shift_start", "start"])?;
    let end_seconds = cols.require(&["end_seconds", "shift_end", "end"])?;

    let iter = reader.get_row_iter(None).context("iterate shift rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let fields = (
            read_i64(&row, game_id),
            read_i64(&row, season),
            read_i64(&row, player_id),
            read_i64(&row, team_id),
            read_i64(&row, period),
            read_f64(&row, start_seconds),
            read_f64(&row, end_seconds),
        );
        let (
            Some(game_id),
            Some(season),
            Some(player_id),
            Some(team_id),
            Some(period),
            Some(start),
            Some(end),
        ) = fields
        else {
            skipped += 1;
            continue;
        };
        if !(start.is_finite() && end.is_finite()) || end <= start {
            skipped += 1;
            continue;
        }
        out.push(ShiftInterval {
            game_id,
            season: season as i32,
            player_id,
            team_id,
            period: period as i32,
            start_seconds: start,
            end_seconds: end,
        });
    }
    if skipped > 0 {
        eprintln!("[WARN] {skipped} shift rows skipped (missing or inverted intervals)");
    }
    Ok(out)
}

fn read_toi(path: &Path) -> Result<Vec<ToiTotals>> {
    let reader = open_reader(path)?;
    let cols = Columns::from_reader(&reader);
    let player_id = cols.require(&["player_id"])?;
    let season = cols.require(&["season"])?;
    let ev_minutes = cols.require(&["ev_minutes", "ev_toi", "even_minutes"])?;
    let pp_minutes = cols.require(&["pp_minutes", "pp_toi"])?;
    let pk_minutes = cols.require(&["pk_minutes", "pk_toi", "sh_minutes"])?;
    let total_minutes = cols.require(&["total_minutes", "toi_minutes", "toi"])?;

    let iter = reader.get_row_iter(None).context("iterate toi rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let (Some(player_id), Some(season)) =
            (read_i64(&row, player_id), read_i64(&row, season))
        else {
            skipped += 1;
            continue;
        };
        out.push(ToiTotals {
            player_id,
            season: season as i32,
            ev_minutes: read_f64(&row, ev_minutes).unwrap_or(0.0),
            pp_minutes: read_f64(&row, pp_minutes).unwrap_or(0.0),
            pk_minutes: read_f64(&row, pk_minutes).unwrap_or(0.0),
            total_minutes: read_f64(&row, total_minutes).unwrap_or(0.0),
        });
    }
    if skipped > 0 {
        eprintln!("[WARN] {skipped} toi rows skipped (missing required fields)");
    }
    Ok(out)
}

fn read_penalties(path: &Path) -> Result<Vec<PenaltyTotals>> {
    let reader = open_reader(path)?;
    let cols = Columns::from_reader(&reader);
    let player_id = cols.require(&["player_id"])?;
    let season = cols.require(&["season"])?;
    let drawn = cols.require(&["drawn", "penalties_drawn"])?;
    let taken = cols.require(&["taken", "penalties_taken"])?;

    let iter = reader.get_row_iter(None).context("iterate penalty rows")?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for row in iter {
        let Ok(row) = row else {
            skipped += 1;
            continue;
        };
        let (Some(player_id), Some(season)) =
            (read_i64(&row, player_id), read_i64(&row, season))
        else {
            skipped += 1;
            continue;
        };
        out.push(PenaltyTotals {
            player_id,
            season: season as i32,
            drawn: read_i64(&row, drawn).unwrap_or(0),
            taken: read_i64(&row, taken).unwrap_or(0),
        });
    }
    if skipped > 0 {
        eprintln!("[WARN] {skipped} penalty rows skipped (missing required fields)");
    }
    Ok(out)
}

fn read_f64(row: &parquet::record::Row, idx: usize) -> Option<f64> {
    if let Ok(v) = row.get_double(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_float(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as f64);
    }
    None
}

fn read_i64(row: &parquet::record::Row, idx: usize) -> Option<i64> {
    if let Ok(v) = row.get_long(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as i64);
    }
    None
}

fn read_bool(row: &parquet::record::Row, idx: usize) -> bool {
    if let Ok(v) = row.get_bool(idx) {
        return v;
    }
    if let Ok(v) = row.get_long(idx) {
        return v != 0;
    }
    if let Ok(v) = row.get_int(idx) {
        return v != 0;
    }
    false
}

fn read_string(row: &parquet::record::Row, idx: usize) -> Option<String> {
    row.get_string(idx).ok().map(|s| s.to_string())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    parse_file_arg("--db")
}

fn parse_file_arg(flag: &str) -> Option<PathBuf> {
    let prefix = format!("{flag}=");
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&prefix) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
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
