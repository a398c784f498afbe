//! Roster-wide conditional buffs.
//!
//! A synergy is active when every unit id it requires is present in the roster. Buffs from all
//! active synergies are gathered per unit and applied once, in the order gathered: percent buffs
//! multiply the current value by `1 + value`, flat buffs add `value`.

use std::collections::{BTreeMap, HashSet};

use crate::combat::stats::{Buff, StatKey, Synergy, UnitStats};

/// A buff resolved to a numeric stat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatContribution {
    pub key: StatKey,
    pub value: f64,
    pub is_percent: bool,
}

impl StatContribution {
    /// `None` for buffs that name a non-numeric or unknown stat.
    pub fn from_buff(buff: &Buff) -> Option<Self> {
        StatKey::parse(&buff.stat).map(|key| Self {
            key,
            value: buff.value,
            is_percent: buff.is_percent,
        })
    }

    pub fn apply_to(&self, current: f64) -> f64 {
        if self.is_percent {
            current * (1.0 + self.value)
        } else {
            current + self.value
        }
    }
}

pub fn is_synergy_active(synergy: &Synergy, roster_ids: &HashSet<&str>) -> bool {
    synergy
        .required_units
        .iter()
        .all(|id| roster_ids.contains(id.as_str()))
}

/// Ids of the synergies active for `roster`, in input order.
pub fn active_synergies<'s>(roster: &[UnitStats], synergies: &'s [Synergy]) -> Vec<&'s str> {
    let ids: HashSet<&str> = roster.iter().map(|unit| unit.id.as_str()).collect();
    synergies
        .iter()
        .filter(|synergy| is_synergy_active(synergy, &ids))
        .map(|synergy| synergy.id.as_str())
        .collect()
}

/// Gathers buff contributions for each roster index.
pub fn gather_contributions(
    roster: &[UnitStats],
    synergies: &[Synergy],
) -> BTreeMap<usize, Vec<StatContribution>> {
    let ids: HashSet<&str> = roster.iter().map(|unit| unit.id.as_str()).collect();
    let mut per_unit: BTreeMap<usize, Vec<StatContribution>> = BTreeMap::new();
    for synergy in synergies.iter().filter(|s| is_synergy_active(s, &ids)) {
        let contributions: Vec<StatContribution> =
            synergy.buffs.iter().filter_map(StatContribution::from_buff).collect();
        if contributions.is_empty() {
            continue;
        }
        for index in 0..roster.len() {
            per_unit
                .entry(index)
                .or_default()
                .extend(contributions.iter().copied());
        }
    }
    per_unit
}

/// Returns a buffed copy of `roster`. The input is left untouched.
pub fn apply_synergies(roster: &[UnitStats], synergies: &[Synergy]) -> Vec<UnitStats> {
    let contributions = gather_contributions(roster, synergies);
    roster
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            let mut buffed = unit.clone();
            if let Some(list) = contributions.get(&index) {
                for contribution in list {
                    let current = buffed.stat(contribution.key);
                    buffed.set_stat(contribution.key, contribution.apply_to(current));
                }
            }
            buffed
        })
        .collect()
}
