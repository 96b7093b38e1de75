use thiserror::Error;

/// Burrow error types
#[derive(Error, Debug)]
pub enum BurrowError {
    /// Transport-level failure talking to the registry or auth service
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or malformed bearer token
    #[error("Auth error: {0}")]
    Auth(String),

    /// Unexpected HTTP status from the registry
    #[error("Protocol error: {url} -> {status}")]
    Protocol { url: String, status: u16 },

    /// Manifest or manifest list could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Temp dir, chdir, chroot, rename or extraction failure
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// Fork, pipe, wait or exec failure
    #[error("Process error: {0}")]
    Process(String),

    /// Invalid user input or configuration override
    #[error("Configuration error: {0}")]
    Config(String),

    /// First failure of the image pipeline, tagged with the stage it hit
    #[error("Image pull failed during {stage}: {source}")]
    PullFailed {
        stage: String,
        #[source]
        source: Box<BurrowError>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BurrowError {
    /// Wrap an error with the pipeline stage in which it occurred.
    pub fn at_stage(self, stage: impl ToString) -> Self {
        BurrowError::PullFailed {
            stage: stage.to_string(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for Burrow operations
pub type Result<T> = std::result::Result<T, BurrowError>;
