use thiserror::Error;

#[derive(Debug, Error)]
pub enum CombatError {
    #[error("combat already active in room {0}")]
    AlreadyActive(String),

    #[error("no combat active in room {0}")]
    NotFound(String),

    #[error("combatant {0} is not part of this combat")]
    UnknownCombatant(String),

    #[error("combatant {0} has already submitted a full round of actions")]
    InsufficientAp(String),

    #[error("action {action} is restricted by an active condition on {combatant}")]
    ActionRestricted { combatant: String, action: String },

    #[error("condition {0} is not registered")]
    UnknownCondition(String),
}
