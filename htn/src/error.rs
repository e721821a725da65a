use thiserror::Error;

#[derive(Debug, Error)]
pub enum HtnError {
    #[error("duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("duplicate method id: {0}")]
    DuplicateMethod(String),

    #[error("duplicate operator id: {0}")]
    DuplicateOperator(String),

    #[error("method {method} references unknown task {task}")]
    UnknownTask { method: String, task: String },

    #[error("method {method} has an empty subtask list")]
    EmptySubtasks { method: String },

    #[error("method {method} references unknown subtask {subtask}")]
    UnknownSubtask { method: String, subtask: String },

    #[error("domain {0} is already registered")]
    DuplicateDomain(String),

    #[error("failed to parse domain file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read domain file: {0}")]
    Io(#[from] std::io::Error),
}
