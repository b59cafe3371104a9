//! Shared error taxonomy for the Sluice pipeline configuration engine.
//!
//! Every other Sluice crate reports failures through [`SluiceError`]:
//! - parser and evaluation errors from `sluice-lang`
//! - resolution errors (unresolved references, duplicate declarations) from `sluice-config`
//! - registry errors (missing resources, capability mismatches) from `sluice-plugin`

/// Unified error type for all Sluice subsystems.
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    // === Parser Errors ===
    #[error("parse error in {file} at line {line}, col {col}: {message}")]
    ParseError {
        file: String,
        line: usize,
        col: usize,
        message: String,
        source_snippet: Option<String>,
    },

    #[error("invalid '{block}' block: {message}")]
    InvalidBlock { block: String, message: String },

    // === Evaluation Errors ===
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{function}' failed: {message}")]
    FunctionError { function: String, message: String },

    #[error("cannot evaluate expression: {0}")]
    EvaluationError(String),

    // === Resolution Errors ===
    #[error("pipeline '{pipeline}' references unresolved resource '{reference}'")]
    UnresolvedReference { pipeline: String, reference: String },

    #[error("'{name}' is declared more than once")]
    DuplicateDeclaration { name: String },

    #[error("invalid config for {context}: attribute '{attribute}' {message}")]
    ConfigDecodeError {
        context: String,
        attribute: String,
        message: String,
    },

    // === Library Errors ===
    #[error("can't find resource '{name}'")]
    ResourceNotFound { name: String },

    #[error("resource '{name}' doesn't provide a {capability}")]
    CapabilityMismatch { name: String, capability: String },

    #[error("resource '{name}' declares a {capability} but registers no provider for it")]
    MissingProvider { name: String, capability: String },

    // === Validation ===
    #[error("Pipeline validation failed: {0}")]
    ValidationError(String),

    // === Annotations ===
    #[error("failed to resolve {phase} in {file}: {source}")]
    Phase {
        file: String,
        phase: &'static str,
        /// Variable names visible in the scope active at failure time.
        scope: Vec<String>,
        source: Box<SluiceError>,
    },

    #[error("failed to resolve group member {fragment}: {source}")]
    Fragment {
        fragment: String,
        source: Box<SluiceError>,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SluiceError {
    /// Strips phase and fragment annotations, returning the underlying error.
    pub fn root(&self) -> &SluiceError {
        match self {
            SluiceError::Phase { source, .. } | SluiceError::Fragment { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// The group member this error originated from, if it was raised while
    /// resolving a group.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            SluiceError::Fragment { fragment, .. } => Some(fragment),
            _ => None,
        }
    }

    /// Names visible in the evaluation scope when a resolution phase failed.
    pub fn scope_at_failure(&self) -> Option<&[String]> {
        match self {
            SluiceError::Phase { scope, .. } => Some(scope),
            SluiceError::Fragment { source, .. } => source.scope_at_failure(),
            _ => None,
        }
    }

    /// Returns `true` if the error stems from the user's source text rather
    /// than from the environment (I/O, serialization).
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self.root(),
            SluiceError::Io(_) | SluiceError::Json(_) | SluiceError::Other(_)
        )
    }
}

/// A convenience alias for `Result<T, SluiceError>`.
pub type Result<T> = std::result::Result<T, SluiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_parse_error() {
        let err = SluiceError::ParseError {
            file: "main.sluice".into(),
            line: 10,
            col: 5,
            message: "unexpected token".into(),
            source_snippet: Some("produce {".into()),
        };
        assert_eq!(
            err.to_string(),
            "parse error in main.sluice at line 10, col 5: unexpected token"
        );
    }

    #[test]
    fn error_display_unresolved_reference() {
        let err = SluiceError::UnresolvedReference {
            pipeline: "p".into(),
            reference: "produce.http.zzz".into(),
        };
        assert_eq!(
            err.to_string(),
            "pipeline 'p' references unresolved resource 'produce.http.zzz'"
        );
    }

    #[test]
    fn error_display_capability_mismatch() {
        let err = SluiceError::CapabilityMismatch {
            name: "trash".into(),
            capability: "producer".into(),
        };
        assert_eq!(err.to_string(), "resource 'trash' doesn't provide a producer");
    }

    #[test]
    fn error_display_config_decode() {
        let err = SluiceError::ConfigDecodeError {
            context: "resource 'constant'".into(),
            attribute: "value".into(),
            message: "is required".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config for resource 'constant': attribute 'value' is required"
        );
    }

    #[test]
    fn root_unwraps_nested_annotations() {
        let err = SluiceError::Fragment {
            fragment: "b.sluice".into(),
            source: Box::new(SluiceError::Phase {
                file: "b.sluice".into(),
                phase: "pipelines",
                scope: vec!["produce".into(), "value".into()],
                source: Box::new(SluiceError::DuplicateDeclaration {
                    name: "produce.http.a".into(),
                }),
            }),
        };
        assert!(matches!(
            err.root(),
            SluiceError::DuplicateDeclaration { name } if name == "produce.http.a"
        ));
        assert_eq!(err.fragment(), Some("b.sluice"));
        assert_eq!(
            err.scope_at_failure(),
            Some(&["produce".to_string(), "value".to_string()][..])
        );
        assert!(err.is_user_error());
    }

    #[test]
    fn io_errors_are_not_user_errors() {
        let err: SluiceError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(!err.is_user_error());
        assert!(err.fragment().is_none());
    }
}
