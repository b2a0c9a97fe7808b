use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstralError {
    // Collaborator errors
    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Template match failed: {template}: {message}")]
    TemplateMatch { template: String, message: String },

    #[error("Input action failed: {0}")]
    Input(String),

    #[error("Screen area not found: {screen}.{area}")]
    AreaNotFound { screen: String, area: String },

    // Engine errors
    #[error("Invalid operation graph '{operation}': {message}")]
    Graph { operation: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Domain configuration errors
    #[error("Unknown mission: {0}")]
    UnknownMission(String),

    #[error("Invalid plan: {0}")]
    Plan(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl AstralError {
    /// Whether retrying the same step could plausibly succeed.
    ///
    /// Recognition and capture hiccups are transient; lookups of
    /// statically configured data are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AstralError::Capture(_)
                | AstralError::Recognition(_)
                | AstralError::TemplateMatch { .. }
                | AstralError::Input(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AstralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AstralError::Capture("black frame".into()).is_transient());
        assert!(AstralError::Recognition("timeout".into()).is_transient());
        assert!(!AstralError::AreaNotFound {
            screen: "guide".into(),
            area: "power".into()
        }
        .is_transient());
        assert!(!AstralError::UnknownMission("x".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let e = AstralError::Graph {
            operation: "guide".into(),
            message: "no start node".into(),
        };
        assert_eq!(e.to_string(), "Invalid operation graph 'guide': no start node");
    }
}
