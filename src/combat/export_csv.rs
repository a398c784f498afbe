//! CSV export of battle logs, histograms and per-unit team summaries for charting tools.
//!
//! Every writer emits a header row, then one row per record. Absent optional values are empty
//! cells so each row has the same column count.

use std::io::Write;

use serde::Serialize;

use crate::analysis::monte_carlo::TeamUnitSummary;
use crate::analysis::statistics::HistogramBin;
use crate::combat::engine::{BattleAction, BattleLogEntry};
use crate::combat::stats::TeamSide;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    time: f64,
    actor: &'a str,
    action: BattleAction,
    target: Option<&'a str>,
    damage: Option<f64>,
    is_crit: Option<bool>,
    is_miss: Option<bool>,
    skill_name: Option<&'a str>,
    remaining_hp: Option<f64>,
}

impl<'a> From<&'a BattleLogEntry> for LogRow<'a> {
    fn from(entry: &'a BattleLogEntry) -> Self {
        Self {
            time: entry.time,
            actor: &entry.actor,
            action: entry.action,
            target: entry.target.as_deref(),
            damage: entry.damage,
            is_crit: entry.is_crit,
            is_miss: entry.is_miss,
            skill_name: entry.skill_name.as_deref(),
            remaining_hp: entry.remaining_hp,
        }
    }
}

#[derive(Debug, Serialize)]
struct UnitRow<'a> {
    id: &'a str,
    name: &'a str,
    team: TeamSide,
    avg_damage_dealt: f64,
    avg_damage_taken: f64,
    avg_dps: f64,
    avg_kills: f64,
    survival_rate: f64,
}

fn write_rows<W, R, I>(writer: W, rows: I) -> Result<()>
where
    W: Write,
    R: Serialize,
    I: IntoIterator<Item = R>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// One row per log entry: time, actor, action, target, damage, is_crit, is_miss, skill_name,
/// remaining_hp.
pub fn write_battle_log_csv<W: Write>(writer: W, log: &[BattleLogEntry]) -> Result<()> {
    write_rows(writer, log.iter().map(LogRow::from))
}

/// One row per bin: start, end, count.
pub fn write_histogram_csv<W: Write>(writer: W, bins: &[HistogramBin]) -> Result<()> {
    write_rows(writer, bins)
}

pub fn write_team_units_csv<W: Write>(writer: W, units: &[TeamUnitSummary]) -> Result<()> {
    write_rows(
        writer,
        units.iter().map(|unit| UnitRow {
            id: &unit.id,
            name: &unit.name,
            team: unit.team,
            avg_damage_dealt: unit.avg_damage_dealt,
            avg_damage_taken: unit.avg_damage_taken,
            avg_dps: unit.avg_dps,
            avg_kills: unit.avg_kills,
            survival_rate: unit.survival_rate,
        }),
    )
}

pub fn battle_log_to_csv(log: &[BattleLogEntry]) -> Result<String> {
    let mut buffer = Vec::new();
    write_battle_log_csv(&mut buffer, log)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn histogram_to_csv(bins: &[HistogramBin]) -> Result<String> {
    let mut buffer = Vec::new();
    write_histogram_csv(&mut buffer, bins)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
