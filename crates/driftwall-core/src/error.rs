use crate::model::ResourceKind;
use thiserror::Error;

/// Result alias for core operations.
pub type DriftwallResult<T> = Result<T, DriftwallError>;

#[derive(Error, Debug)]
pub enum DriftwallError {
    #[error("[DW1000] io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[DW1001] toml config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("[DW1002] yaml config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("[DW1003] json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("[DW1100] configuration error: {0}")]
    InvalidConfig(String),

    #[error("[DW1200] parse error: line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("[DW1201] schema error:\n  - {}", .0.join("\n  - "))]
    Schema(Vec<String>),

    #[error("[DW1202] validation errors:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),

    #[error("[DW2000] plan contains BLOCKED items that require explicit approval: {kind} `{name}`: {reason}")]
    HasBlocked {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("[DW2001] SAFETY ABORT: {0}")]
    SafetyAbort(String),

    #[error("[DW2002] {action} {kind} `{name}` failed: {source}")]
    Operation {
        action: &'static str,
        kind: ResourceKind,
        name: String,
        #[source]
        source: Box<DriftwallError>,
    },

    #[error("[DW2003] another apply is already running against this engine")]
    ApplyInProgress,

    #[error("[DW2004] apply lock {path} is held by {holder}; remove it only if that process is gone")]
    ApplyLocked { path: String, holder: String },

    #[error("[DW3000] provider error: {0}")]
    Provider(String),
}

impl DriftwallError {
    pub fn code(&self) -> &'static str {
        match self {
            DriftwallError::Io(_) => "DW1000",
            DriftwallError::Toml(_) => "DW1001",
            DriftwallError::Yaml(_) => "DW1002",
            DriftwallError::Json(_) => "DW1003",
            DriftwallError::InvalidConfig(_) => "DW1100",
            DriftwallError::Parse { .. } => "DW1200",
            DriftwallError::Schema(_) => "DW1201",
            DriftwallError::Validation(_) => "DW1202",
            DriftwallError::HasBlocked { .. } => "DW2000",
            DriftwallError::SafetyAbort(_) => "DW2001",
            DriftwallError::Operation { .. } => "DW2002",
            DriftwallError::ApplyInProgress => "DW2003",
            DriftwallError::ApplyLocked { .. } => "DW2004",
            DriftwallError::Provider(_) => "DW3000",
        }
    }

    /// Walk through `Operation` wrappers to the error that actually stopped the work.
    pub fn root(&self) -> &DriftwallError {
        match self {
            DriftwallError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Execute-time safety aborts are the "should have been caught earlier"
    /// class and get reported loudly.
    pub fn is_safety_abort(&self) -> bool {
        matches!(self.root(), DriftwallError::SafetyAbort(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_problem() {
        let err = DriftwallError::Validation(vec!["first".into(), "second".into()]);
        let text = err.to_string();
        assert!(text.contains("  - first"));
        assert!(text.contains("  - second"));
        assert_eq!(err.code(), "DW1202");
    }

    #[test]
    fn root_unwraps_operation_context() {
        let err = DriftwallError::Operation {
            action: "deleting",
            kind: ResourceKind::Dataset,
            name: "tank/old".into(),
            source: Box::new(DriftwallError::SafetyAbort("still has data".into())),
        };
        assert!(err.is_safety_abort());
        assert!(err.to_string().contains("tank/old"));
    }
}
