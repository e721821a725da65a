use crate::dice::DiceRoller;

/// Bucketed result of an attack roll against an effective AC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    CritFail,
    Failure,
    Success,
    CritSuccess,
}

/// The fully resolved result of one attack: the roll, the outcome bucket,
/// and the damage dealt (already adjusted for crits and penalties).
#[derive(Debug, Clone, Copy)]
pub struct AttackResolution {
    pub d20: u32,
    pub total: i32,
    pub effective_ac: i32,
    pub outcome: AttackOutcome,
    pub damage: i32,
}

/// Resolve one attack: `d20 + attacker_str_mod` against `defender_ac -
/// defender_ac_penalty` (the defender's active-condition AC penalties make
/// them easier to hit). `weapon_damage_sides` is the base weapon damage die;
/// `attacker_damage_penalty` is the sum of the attacker's active-condition
/// attack penalties, subtracted from the final damage (floored at zero).
pub fn resolve_attack(
    dice: &mut dyn DiceRoller,
    attacker_str_mod: i32,
    defender_ac: i32,
    defender_ac_penalty: i32,
    attacker_damage_penalty: i32,
    weapon_damage_sides: u32,
) -> AttackResolution {
    let d20 = dice.roll_d20();
    let total = d20 as i32 + attacker_str_mod;
    let effective_ac = defender_ac - defender_ac_penalty;

    let outcome = if d20 == 1 || total <= effective_ac - 10 {
        AttackOutcome::CritFail
    } else if d20 == 20 || total >= effective_ac + 10 {
        AttackOutcome::CritSuccess
    } else if total >= effective_ac {
        AttackOutcome::Success
    } else {
        AttackOutcome::Failure
    };

    let damage = match outcome {
        AttackOutcome::CritFail | AttackOutcome::Failure => 0,
        AttackOutcome::Success => dice.roll(weapon_damage_sides) as i32,
        AttackOutcome::CritSuccess => dice.roll(weapon_damage_sides) as i32 * 2,
    };
    let damage = (damage - attacker_damage_penalty).max(0);

    AttackResolution {
        d20,
        total,
        effective_ac,
        outcome,
        damage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDiceRoller;

    #[test]
    fn natural_one_is_always_crit_fail() {
        let mut dice = ScriptedDiceRoller::new(vec![1]);
        let res = resolve_attack(&mut dice, 10, 5, 0, 0, 6);
        assert_eq!(res.outcome, AttackOutcome::CritFail);
        assert_eq!(res.damage, 0);
    }

    #[test]
    fn natural_twenty_is_always_crit_success_and_doubles_damage() {
        let mut dice = ScriptedDiceRoller::new(vec![20, 4]);
        let res = resolve_attack(&mut dice, 0, 30, 0, 0, 6);
        assert_eq!(res.outcome, AttackOutcome::CritSuccess);
        assert_eq!(res.damage, 8);
    }

    #[test]
    fn success_bucket_rolls_damage_once() {
        let mut dice = ScriptedDiceRoller::new(vec![15, 5]);
        let res = resolve_attack(&mut dice, 2, 12, 0, 0, 8);
        assert_eq!(res.total, 17);
        assert_eq!(res.outcome, AttackOutcome::Success);
        assert_eq!(res.damage, 5);
    }

    #[test]
    fn defender_condition_penalty_lowers_effective_ac() {
        let mut dice = ScriptedDiceRoller::new(vec![10, 3]);
        let res = resolve_attack(&mut dice, 0, 12, 3, 0, 6);
        assert_eq!(res.effective_ac, 9);
        assert_eq!(res.outcome, AttackOutcome::Success);
    }

    #[test]
    fn attacker_condition_penalty_reduces_damage_floored_at_zero() {
        let mut dice = ScriptedDiceRoller::new(vec![15, 2]);
        let res = resolve_attack(&mut dice, 2, 10, 0, 5, 6);
        assert_eq!(res.outcome, AttackOutcome::Success);
        assert_eq!(res.damage, 0);
    }
}
