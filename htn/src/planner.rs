use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::domain::Domain;
use crate::hook::PreconditionHook;
use crate::world_state::WorldState;

const MAX_EXPANSION_STEPS: u32 = 32;
const ROOT_TASK: &str = "behave";

/// One resolved primitive action in a plan: an action name plus its already
/// resolved target (a display name, or empty when no target applies).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub action: String,
    pub target: String,
}

/// Depth-bounded HTN decomposition. Stateless across calls: every call takes
/// the domain, a precondition evaluator, and the zone id it runs in.
pub struct Planner;

impl Planner {
    /// Produce an ordered plan for `state` in `zone_id` under `domain`.
    /// Never returns an error: hook evaluation failures and methods with no
    /// applicable branch simply drop the task being decomposed.
    pub fn plan(
        domain: &Domain,
        hooks: &dyn PreconditionHook,
        zone_id: &str,
        state: &WorldState,
    ) -> Vec<PlannedAction> {
        let mut pending: VecDeque<String> = VecDeque::new();
        pending.push_back(ROOT_TASK.to_string());
        let mut actions = Vec::new();
        let mut steps = 0u32;

        while let Some(id) = pending.pop_front() {
            if steps >= MAX_EXPANSION_STEPS {
                warn!(domain = %domain.id, "htn expansion step bound reached, truncating plan");
                break;
            }
            steps += 1;

            if let Some(operator) = domain.operator_by_id(&id) {
                let target = state.resolve_target(&operator.target);
                trace!(action = %operator.action, %target, "htn operator resolved");
                actions.push(PlannedAction {
                    action: operator.action.clone(),
                    target,
                });
                continue;
            }

            if !domain.is_task(&id) {
                warn!(task = %id, "htn pending id resolves to neither task nor operator, dropping");
                continue;
            }

            match Self::first_applicable_method(domain, hooks, zone_id, state, &id) {
                Some(method) => {
                    for subtask in method.subtasks.iter().rev() {
                        pending.push_front(subtask.clone());
                    }
                }
                None => trace!(task = %id, "no applicable method, dropping task"),
            }
        }

        actions
    }

    fn first_applicable_method<'d>(
        domain: &'d Domain,
        hooks: &dyn PreconditionHook,
        zone_id: &str,
        state: &WorldState,
        task_id: &str,
    ) -> Option<&'d crate::domain::Method> {
        domain.methods_for(task_id).find(|method| match &method.precondition {
            None => true,
            Some(hook_name) => hooks
                .evaluate(zone_id, hook_name, state)
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Method, Operator, Task};
    use crate::hook::StaticHookTable;
    use crate::world_state::{CombatantFact, CombatantKind};

    fn ganger_combat_domain() -> Domain {
        Domain::new(
            "ganger_combat".into(),
            String::new(),
            vec![
                Task { id: "behave".into() },
                Task { id: "fight".into() },
            ],
            vec![
                Method {
                    id: "combat_mode".into(),
                    task: "behave".into(),
                    precondition: Some("has_enemy".into()),
                    subtasks: vec!["fight".into()],
                },
                Method {
                    id: "attack_any".into(),
                    task: "fight".into(),
                    precondition: None,
                    subtasks: vec!["attack_enemy".into()],
                },
            ],
            vec![Operator {
                id: "attack_enemy".into(),
                action: "attack".into(),
                target: "nearest_enemy".into(),
            }],
        )
        .unwrap()
    }

    fn npc_vs_player_state() -> WorldState {
        WorldState::new("n1").with_combatants(vec![
            CombatantFact {
                uid: "n1".into(),
                name: "n1".into(),
                kind: CombatantKind::Npc,
                current_hp: 10,
                dead: false,
            },
            CombatantFact {
                uid: "p1".into(),
                name: "Player".into(),
                kind: CombatantKind::Player,
                current_hp: 20,
                dead: false,
            },
        ])
    }

    #[test]
    fn attack_sequence_resolves_nearest_enemy_name() {
        let domain = ganger_combat_domain();
        let hooks = StaticHookTable::with_builtin_predicates();
        let plan = Planner::plan(&domain, &hooks, "z1", &npc_vs_player_state());
        assert_eq!(
            plan,
            vec![PlannedAction {
                action: "attack".into(),
                target: "Player".into(),
            }]
        );
    }

    #[test]
    fn idle_fallback_drops_task_with_no_applicable_method() {
        let domain = ganger_combat_domain();
        let hooks = StaticHookTable::with_builtin_predicates();
        let state = WorldState::new("n1").with_combatants(vec![CombatantFact {
            uid: "n1".into(),
            name: "n1".into(),
            kind: CombatantKind::Npc,
            current_hp: 10,
            dead: false,
        }]);
        let plan = Planner::plan(&domain, &hooks, "z1", &state);
        assert!(plan.is_empty());
    }

    #[test]
    fn idle_mode_method_produces_pass_when_present() {
        let domain = Domain::new(
            "ganger_combat".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![
                Method {
                    id: "combat_mode".into(),
                    task: "behave".into(),
                    precondition: Some("has_enemy".into()),
                    subtasks: vec!["attack_enemy".into()],
                },
                Method {
                    id: "idle_mode".into(),
                    task: "behave".into(),
                    precondition: None,
                    subtasks: vec!["pass_op".into()],
                },
            ],
            vec![
                Operator {
                    id: "attack_enemy".into(),
                    action: "attack".into(),
                    target: "nearest_enemy".into(),
                },
                Operator {
                    id: "pass_op".into(),
                    action: "pass".into(),
                    target: "".into(),
                },
            ],
        )
        .unwrap();
        let hooks = StaticHookTable::with_builtin_predicates();
        let state = WorldState::new("n1").with_combatants(vec![CombatantFact {
            uid: "n1".into(),
            name: "n1".into(),
            kind: CombatantKind::Npc,
            current_hp: 10,
            dead: false,
        }]);
        let plan = Planner::plan(&domain, &hooks, "z1", &state);
        assert_eq!(
            plan,
            vec![PlannedAction {
                action: "pass".into(),
                target: "".into(),
            }]
        );
    }

    #[test]
    fn plan_is_never_empty_vec_missing_even_on_runaway_cycle() {
        let domain = Domain::new(
            "cyclic".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "self_loop".into(),
                task: "behave".into(),
                precondition: None,
                subtasks: vec!["behave".into()],
            }],
            vec![],
        )
        .unwrap();
        let hooks = StaticHookTable::new();
        let state = WorldState::new("n1");
        // Must terminate (bounded at 32 steps) rather than looping forever.
        let plan = Planner::plan(&domain, &hooks, "z1", &state);
        assert!(plan.is_empty());
    }

    #[test]
    fn subtask_order_is_preserved_across_decomposition() {
        let domain = Domain::new(
            "ordered".into(),
            String::new(),
            vec![Task { id: "behave".into() }],
            vec![Method {
                id: "m".into(),
                task: "behave".into(),
                precondition: None,
                subtasks: vec!["op_a".into(), "op_b".into()],
            }],
            vec![
                Operator {
                    id: "op_a".into(),
                    action: "first".into(),
                    target: "self".into(),
                },
                Operator {
                    id: "op_b".into(),
                    action: "second".into(),
                    target: "self".into(),
                },
            ],
        )
        .unwrap();
        let hooks = StaticHookTable::new();
        let state = WorldState::new("n1");
        let plan = Planner::plan(&domain, &hooks, "z1", &state);
        assert_eq!(plan[0].action, "first");
        assert_eq!(plan[1].action, "second");
    }
}
