pub type TilawahResult<T> = Result<T, TilawahError>;

#[derive(thiserror::Error, Debug)]
pub enum TilawahError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("timing error: {0}")]
    Timing(String),

    #[error("fetch error for {unit}: {message}")]
    Fetch { unit: String, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("reel assembly cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TilawahError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn timing(msg: impl Into<String>) -> Self {
        Self::Timing(msg.into())
    }

    pub fn fetch(unit: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            unit: unit.into(),
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}
