use thiserror::Error;

/// Error taxonomy used across the engine, independent of the concrete
/// error type raised. The orchestrator inspects `kind()` to decide how a
/// failure propagates: most kinds surface to the caller as an error event,
/// `Fatal` terminates the session, and `Validation` is only ever raised
/// during content loading (handled before any session exists).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Precondition,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("content failed validation: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("unrecoverable: {0}")]
    Fatal(String),

    #[error(transparent)]
    World(#[from] world::WorldError),

    #[error(transparent)]
    Htn(#[from] htn::HtnError),

    #[error(transparent)]
    Combat(#[from] combat::CombatError),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) => ErrorKind::Validation,
            GameError::NotFound(_) => ErrorKind::NotFound,
            GameError::Conflict(_) => ErrorKind::Conflict,
            GameError::Precondition(_) => ErrorKind::Precondition,
            GameError::Transient(_) => ErrorKind::Transient,
            GameError::Fatal(_) => ErrorKind::Fatal,
            GameError::World(_) => ErrorKind::Validation,
            GameError::Htn(_) => ErrorKind::Validation,
            GameError::Combat(e) => match e {
                combat::CombatError::AlreadyActive(_) => ErrorKind::Conflict,
                combat::CombatError::NotFound(_) => ErrorKind::NotFound,
                combat::CombatError::UnknownCombatant(_) => ErrorKind::NotFound,
                combat::CombatError::InsufficientAp(_) => ErrorKind::Precondition,
                combat::CombatError::ActionRestricted { .. } => ErrorKind::Precondition,
                combat::CombatError::UnknownCondition(_) => ErrorKind::NotFound,
            },
        }
    }
}

/// Sentinel pseudo-error a command handler returns to unwind a session
/// cleanly: the orchestrator emits `Disconnected` and tears the session
/// down instead of converting it to an `Error` event.
#[derive(Debug, Error)]
#[error("session requested to quit")]
pub struct Quit;
