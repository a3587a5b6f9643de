use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Discord API error: {0}")]
    Discord(String),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        let err: AppError = "something broke".to_string().into();
        assert!(matches!(err, AppError::Other(_)));
        assert_eq!(err.to_string(), "something broke");
    }

    #[test]
    fn test_from_str() {
        let err: AppError = "bad input".into();
        assert!(matches!(err, AppError::Other(_)));
        assert_eq!(err.to_string(), "bad input");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file gone");
        let err: AppError = io_err.into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains("file gone"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json{").unwrap_err();
        let err: AppError = json_err.into();
        assert!(matches!(err, AppError::Json(_)));
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_display_discord_variant() {
        let err = AppError::Discord("send failed".to_string());
        assert_eq!(err.to_string(), "Discord API error: send failed");
    }

    #[test]
    fn test_display_llm_variant() {
        let err = AppError::Llm("missing content".to_string());
        assert_eq!(err.to_string(), "LLM error: missing content");
    }
}
