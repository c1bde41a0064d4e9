use thiserror::Error;

/// Represents the different types of errors that can occur while serving a classification.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// One or more required request fields were absent
    #[error("Missing required parameters: {}", .0.join(","))]
    MissingFields(Vec<String>),
    /// The tokenizer failed to segment the input text
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// The classification model raised a runtime fault
    #[error("Inference error: {0}")]
    Inference(String),
    /// An internal invariant was violated; this is always a bug
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),
    /// The label set does not match the classifier output dimensionality
    #[error("Label set has {label_count} classes but the classifier outputs {output_size} scores")]
    StartupInvariant {
        label_count: usize,
        output_size: usize,
    },
    /// Error occurred while assembling the service
    #[error("Build error: {0}")]
    Build(String),
}

/// The externally visible category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller can fix the request and retry
    ClientError,
    /// The fault is on our side; the caller only gets a generic message
    ServerError,
}

impl ClassifierError {
    /// Returns the category used when surfacing this error to a caller.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingFields(_) => ErrorCategory::ClientError,
            _ => ErrorCategory::ServerError,
        }
    }
}

impl From<ort::Error> for ClassifierError {
    fn from(err: ort::Error) -> Self {
        ClassifierError::Inference(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message() {
        let err = ClassifierError::MissingFields(vec!["gloss".into(), "lang".into()]);
        assert_eq!(err.to_string(), "Missing required parameters: gloss,lang");
        assert_eq!(err.category(), ErrorCategory::ClientError);
    }

    #[test]
    fn test_everything_else_is_server_side() {
        let errors = [
            ClassifierError::Tokenizer("boom".into()),
            ClassifierError::Inference("boom".into()),
            ClassifierError::InternalConsistency("boom".into()),
            ClassifierError::StartupInvariant { label_count: 2, output_size: 3 },
            ClassifierError::Build("boom".into()),
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::ServerError);
        }
    }
}
