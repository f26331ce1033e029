//! Error handling for the heatmap CLI

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for heatmap CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Parsing error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Pyramid error: {message}")]
    Pyramid { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn parse<S: Into<String>, M: Into<String>>(file: S, message: M) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn pyramid<S: Into<String>>(message: S) -> Self {
        Self::Pyramid { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::Parse { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Point files hold one 'latitude,longitude' pair per line\n\
                 • Lines starting with '#' and a leading header line are ignored",
            );
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your heatmap.toml configuration file\n\
                 • Use 'heatmap config --example' to generate a sample configuration\n\
                 • Colors are written as #RRGGBB or #RRGGBBAA",
            );
        }

        CliError::Pyramid { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the pyramid file is not truncated or corrupted\n\
                 • Rebuild it with 'heatmap build'",
            );
        }

        CliError::Validation { .. } => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("points.csv"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the file path is correct"));

        let err = CliError::parse("points.csv", "line 3: expected 2 fields");
        assert!(format_error_with_suggestions(&err).contains("latitude,longitude"));
    }

    #[test]
    fn test_validation_has_no_suggestions() {
        let err = CliError::validation("--x requires --y");
        assert_eq!(format_error_with_suggestions(&err), "Validation error: --x requires --y");
    }
}
