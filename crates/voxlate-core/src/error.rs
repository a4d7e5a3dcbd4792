use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoxlateError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoxlateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_lists_every_option() {
        let err = VoxlateError::MissingCredentials(vec![
            "speech.api_key".into(),
            "translator.endpoint".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("speech.api_key"));
        assert!(msg.contains("translator.endpoint"));
    }
}
