use thiserror::Error;

#[derive(Error, Debug)]
pub enum GemmaError {
    #[error("Failed to load engine library '{library}': {reason}")]
    LibraryLoad { library: String, reason: String },

    #[error("Failed to create context: {0}")]
    Initialization(String),

    #[error("Context is closed")]
    InvalidState,

    #[error("Generation failed with code {0}")]
    Generation(i32),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, GemmaError>;
