use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::shots::{FreezeEvent, PenaltyTotals, ShiftInterval, ShotEvent, Strength, ToiTotals};

pub fn default_db_path() -> PathBuf {
    std::env::var("XGAR_DB")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("xgar.sqlite"))
}

/// Open (or create) the engine database with both the event and the rating
/// schema in place.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    crate::rating_store::init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    crate::rating_store::init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS shot_events (
            game_id INTEGER NOT NULL,
            event_idx INTEGER NOT NULL,
            season INTEGER NOT NULL,
            period INTEGER NULL,
            period_seconds REAL NULL,
            team_id INTEGER NOT NULL,
            shooter_id INTEGER NOT NULL,
            goalie_id INTEGER NULL,
            xg REAL NULL,
            is_goal INTEGER NOT NULL,
            on_goal INTEGER NOT NULL,
            strength TEXT NOT NULL,
            PRIMARY KEY (game_id, event_idx)
        );
        CREATE INDEX IF NOT EXISTS idx_shot_events_season ON shot_events(season);

        CREATE TABLE IF NOT EXISTS freeze_events (
            game_id INTEGER NOT NULL,
            event_idx INTEGER NOT NULL,
            season INTEGER NOT NULL,
            period INTEGER NULL,
            period_seconds REAL NULL,
            team_id INTEGER NOT NULL,
            goalie_id INTEGER NULL,
            PRIMARY KEY (game_id, event_idx)
        );
        CREATE INDEX IF NOT EXISTS idx_freeze_events_season ON freeze_events(season);

        CREATE TABLE IF NOT EXISTS shift_intervals (
            game_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            player_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            period INTEGER NOT NULL,
            start_seconds REAL NOT NULL,
            end_seconds REAL NOT NULL,
            PRIMARY KEY (game_id, player_id, period, start_seconds)
        );
        CREATE INDEX IF NOT EXISTS idx_shift_intervals_season ON shift_intervals(season);

        CREATE TABLE IF NOT EXISTS toi_totals (
            player_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            ev_minutes REAL NOT NULL,
            pp_minutes REAL NOT NULL,
            pk_minutes REAL NOT NULL,
            total_minutes REAL NOT NULL,
            PRIMARY KEY (player_id, season)
        );

        CREATE TABLE IF NOT EXISTS penalty_totals (
            player_id INTEGER NOT NULL,
            season INTEGER NOT NULL,
            drawn INTEGER NOT NULL,
            taken INTEGER NOT NULL,
            PRIMARY KEY (player_id, season)
        );
        "#,
    )
    .context("create event schema")?;
    Ok(())
}

pub fn upsert_shots(conn: &mut Connection, shots: &[ShotEvent]) -> Result<usize> {
    let tx = conn.transaction().context("begin shot upsert")?;
    for shot in shots {
        upsert_shot(&tx, shot)?;
    }
    tx.commit().context("commit shot upsert")?;
    Ok(shots.len())
}

fn upsert_shot(tx: &rusqlite::Transaction<'_>, s: &ShotEvent) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO shot_events (
            game_id, event_idx, season, period, period_seconds,
            team_id, shooter_id, goalie_id, xg, is_goal, on_goal, strength
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(game_id, event_idx) DO UPDATE SET
            season = excluded.season,
            period = excluded.period,
            period_seconds = excluded.period_seconds,
            team_id = excluded.team_id,
            shooter_id = excluded.shooter_id,
            goalie_id = excluded.goalie_id,
            xg = excluded.xg,
            is_goal = excluded.is_goal,
            on_goal = excluded.on_goal,
            strength = excluded.strength
        "#,
        params![
            s.game_id,
            s.event_idx,
            s.season,
            s.period,
            s.period_seconds,
            s.team_id,
            s.shooter_id,
            s.goalie_id,
            s.xg,
            bool_to_i64(s.is_goal),
            bool_to_i64(s.on_goal),
            s.strength.as_str(),
        ],
    )
    .context("upsert shot event")?;
    Ok(())
}

pub fn upsert_freezes(conn: &mut Connection, freezes: &[FreezeEvent]) -> Result<usize> {
    let tx = conn.transaction().context("begin freeze upsert")?;
    for f in freezes {
        tx.execute(
            r#"
            INSERT INTO freeze_events (
                game_id, event_idx, season, period, period_seconds, team_id, goalie_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(game_id, event_idx) DO UPDATE SET
                season = excluded.season,
                period = excluded.period,
                period_seconds = excluded.period_seconds,
                team_id = excluded.team_id,
                goalie_id = excluded.goalie_id
            "#,
            params![
                f.game_id,
                f.event_idx,
                f.season,
                f.period,
                f.period_seconds,
                f.team_id,
                f.goalie_id,
            ],
        )
        .context("upsert freeze event")?;
    }
    tx.commit().context("commit freeze upsert")?;
    Ok(freezes.len())
}

pub fn upsert_shifts(conn: &mut Connection, shifts: &[ShiftInterval]) -> Result<usize> {
    let tx = conn.transaction().context("begin shift upsert")?;
    for sh in shifts {
        tx.execute(
            r#"
            INSERT INTO shift_intervals (
                game_id, season, player_id, team_id, period, start_seconds, end_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(game_id, player_id, period, start_seconds) DO UPDATE SET
                season = excluded.season,
                team_id = excluded.team_id,
                end_seconds = excluded.end_seconds
            "#,
            params![
                sh.game_id,
                sh.season,
                sh.player_id,
                sh.team_id,
                sh.period,
                sh.start_seconds,
                sh.end_seconds,
            ],
        )
        .context("upsert shift interval")?;
    }
    tx.commit().context("commit shift upsert")?;
    Ok(shifts.len())
}

pub fn upsert_toi(conn: &mut Connection, totals: &[ToiTotals]) -> Result<usize> {
    let tx = conn.transaction().context("begin toi upsert")?;
    for t in totals {
        tx.execute(
            r#"
            INSERT INTO toi_totals (
                player_id, season, ev_minutes, pp_minutes, pk_minutes, total_minutes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(player_id, season) DO UPDATE SET
                ev_minutes = excluded.ev_minutes,
                pp_minutes = excluded.pp_minutes,
                pk_minutes = excluded.pk_minutes,
                total_minutes = excluded.total_minutes
            "#,
            params![
                t.player_id,
                t.season,
                t.ev_minutes,
                t.pp_minutes,
                t.pk_minutes,
                t.total_minutes,
            ],
        )
        .context("upsert toi totals")?;
    }
    tx.commit().context("commit toi upsert")?;
    Ok(totals.len())
}

pub fn upsert_penalties(conn: &mut Connection, totals: &[PenaltyTotals]) -> Result<usize> {
    let tx = conn.transaction().context("begin penalty upsert")?;
    for p in totals {
        tx.execute(
            r#"
            INSERT INTO penalty_totals (player_id, season, drawn, taken)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(player_id, season) DO UPDATE SET
                drawn = excluded.drawn,
                taken = excluded.taken
            "#,
            params![p.player_id, p.season, p.drawn, p.taken],
        )
        .context("upsert penalty totals")?;
    }
    tx.commit().context("commit penalty upsert")?;
    Ok(totals.len())
}

/// Seasons with any shot data, ascending.
pub fn list_seasons(conn: &Connection) -> Result<Vec<i32>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT season FROM shot_events ORDER BY season ASC")
        .context("prepare season list query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i32>(0))
        .context("query season list")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode season row")?);
    }
    Ok(out)
}

/// Shots for one season in feed order. The `(game_id, event_idx)` ordering is
/// what the sequencer's stream-order guarantees rest on.
pub fn load_season_shots(conn: &Connection, season: i32) -> Result<Vec<ShotEvent>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                game_id, event_idx, season, period, period_seconds,
                team_id, shooter_id, goalie_id, xg, is_goal, on_goal, strength
            FROM shot_events
            WHERE season = ?1
            ORDER BY game_id ASC, event_idx ASC
            "#,
        )
        .context("prepare shot load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            let strength: String = row.get(11)?;
            Ok(ShotEvent {
                game_id: row.get(0)?,
                event_idx: row.get(1)?,
                season: row.get(2)?,
                period: row.get(3)?,
                period_seconds: row.get(4)?,
                team_id: row.get(5)?,
                shooter_id: row.get(6)?,
                goalie_id: row.get(7)?,
                xg: row.get(8)?,
                is_goal: row.get::<_, i64>(9)? != 0,
                on_goal: row.get::<_, i64>(10)? != 0,
                strength: Strength::parse(&strength),
            })
        })
        .context("query shot load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode shot row")?);
    }
    Ok(out)
}

pub fn load_season_freezes(conn: &Connection, season: i32) -> Result<Vec<FreezeEvent>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT game_id, event_idx, season, period, period_seconds, team_id, goalie_id
            FROM freeze_events
            WHERE season = ?1
            ORDER BY game_id ASC, event_idx ASC
            "#,
        )
        .context("prepare freeze load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok(FreezeEvent {
                game_id: row.get(0)?,
                event_idx: row.get(1)?,
                season: row.get(2)?,
                period: row.get(3)?,
                period_seconds: row.get(4)?,
                team_id: row.get(5)?,
                goalie_id: row.get(6)?,
            })
        })
        .context("query freeze load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode freeze row")?);
    }
    Ok(out)
}

pub fn load_season_shifts(conn: &Connection, season: i32) -> Result<Vec<ShiftInterval>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT game_id, season, player_id, team_id, period, start_seconds, end_seconds
            FROM shift_intervals
            WHERE season = ?1
            ORDER BY game_id ASC, period ASC, start_seconds ASC, player_id ASC
            "#,
        )
        .context("prepare shift load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok(ShiftInterval {
                game_id: row.get(0)?,
                season: row.get(1)?,
                player_id: row.get(2)?,
                team_id: row.get(3)?,
                period: row.get(4)?,
                start_seconds: row.get(5)?,
                end_seconds: row.get(6)?,
            })
        })
        .context("query shift load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode shift row")?);
    }
    Ok(out)
}

pub fn load_season_toi(conn: &Connection, season: i32) -> Result<Vec<ToiTotals>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT player_id, season, ev_minutes, pp_minutes, pk_minutes, total_minutes
            FROM toi_totals
            WHERE season = ?1
            ORDER BY player_id ASC
            "#,
        )
        .context("prepare toi load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok(ToiTotals {
                player_id: row.get(0)?,
                season: row.get(1)?,
                ev_minutes: row.get(2)?,
                pp_minutes: row.get(3)?,
                pk_minutes: row.get(4)?,
                total_minutes: row.get(5)?,
            })
        })
        .context("query toi load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode toi row")?);
    }
    Ok(out)
}

pub fn load_season_penalties(conn: &Connection, season: i32) -> Result<Vec<PenaltyTotals>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT player_id, season, drawn, taken
            FROM penalty_totals
            WHERE season = ?1
            ORDER BY player_id ASC
            "#,
        )
        .context("prepare penalty load query")?;
    let rows = stmt
        .query_map(params![season], |row| {
            Ok(PenaltyTotals {
                player_id: row.get(0)?,
                season: row.get(1)?,
                drawn: row.get(2)?,
                taken: row.get(3)?,
            })
        })
        .context("query penalty load")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode penalty row")?);
    }
    Ok(out)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
