use serde::Serialize;

use crate::combat::rng::Rng;
use crate::combat::stats::{SkillTrigger, TriggerKind, TriggerSubject};

/// Battle state a trigger is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggerContext {
    pub caster_hp_ratio: f64,
    pub target_hp_ratio: f64,
    /// Basic attacks the caster has made so far, including the current one.
    pub turn_count: u32,
    pub last_action_was_hit: bool,
    pub last_action_was_crit: bool,
}

impl TriggerContext {
    fn ratio_for(&self, subject: TriggerSubject) -> f64 {
        match subject {
            TriggerSubject::Caster => self.caster_hp_ratio,
            TriggerSubject::Target => self.target_hp_ratio,
        }
    }
}

/// Whether a skill with `trigger` fires. The chance roll comes first and short-circuits.
///
/// Cooldown gating is the caller's job: a skill still on cooldown must not reach this function,
/// since evaluating it would consume a draw from `rng`.
pub fn should_trigger(trigger: &SkillTrigger, context: &TriggerContext, rng: &mut Rng) -> bool {
    if rng.next_f64() >= trigger.chance() {
        return false;
    }
    condition_met(trigger, context)
}

fn condition_met(trigger: &SkillTrigger, context: &TriggerContext) -> bool {
    match trigger.kind {
        TriggerKind::HpBelow => context.ratio_for(trigger.subject) < trigger.value,
        TriggerKind::HpAbove => context.ratio_for(trigger.subject) > trigger.value,
        TriggerKind::Turn => {
            let period = trigger.value.round();
            period >= 1.0 && u64::from(context.turn_count) % (period as u64) == 0
        }
        TriggerKind::OnHit => context.last_action_was_hit,
        TriggerKind::OnCrit => context.last_action_was_crit,
        TriggerKind::Always => true,
    }
}
