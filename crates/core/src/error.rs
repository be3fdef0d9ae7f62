use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown {kind} value: {value}")]
    UnknownEnum { kind: &'static str, value: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialize(e.to_string())
    }
}
