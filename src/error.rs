use serde::{Deserialize, Serialize};

/// An error carrying what the crate was trying to do when it failed and, if any, the
/// message of the error that caused the failure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContextError {
    pub context: String,
    pub source_error: Option<String>,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_error {
            Some(source_error) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source_error),
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for ContextError {}

impl ContextError {
    /// Create a new `ContextError` with the given context.
    pub fn with_context<S: Into<String>>(context: S) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: None,
        }
    }

    /// Create a new `ContextError` with the given context and source error.
    pub fn with_error<S: Into<String>>(context: S, error: &dyn std::error::Error) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: Some(error.to_string()),
        }
    }
}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
fn minimize_first_letter(string: &str) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_is_chained_after_the_context() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file");
        let error = ContextError::with_error("Failed to read the logo", &source);

        assert_eq!(error.to_string(), "Failed to read the logo: no such file");
    }

    #[test]
    fn context_only_error_displays_the_context() {
        let error = ContextError::with_context("Unable to find the page with index 3");

        assert_eq!(error.to_string(), "Unable to find the page with index 3");
        assert!(error.source_error.is_none());
    }
}
