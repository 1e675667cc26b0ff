use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("No session bound: ambient accessor used outside of run_as/parallel in multiremote mode")]
    NoSessionBound,

    #[error("Session already registered: {0}")]
    DuplicateSession(String),

    #[error("Rebinder install failed: {0}")]
    RebinderInstall(String),

    #[error("Global slot {0} is sealed and cannot be redefined")]
    SlotSealed(String),

    #[error("Global slot {0} is not defined")]
    SlotUndefined(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("No page available")]
    NoPage,

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
