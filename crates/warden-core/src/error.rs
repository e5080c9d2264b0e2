use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("malformed hook envelope: {0}")]
    EnvelopeMalformed(String),

    #[error("invalid session id '{0}': must be alphanumeric with dots, dashes, underscores")]
    InvalidSessionId(String),

    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    #[error("no DAG state for session: {0}")]
    DagNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
