use log::{debug, error, warn};
use serde::Serialize;

use super::types::KSLine;

/// External facing representation of a parser error
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SetsailError {
    pub line: KSLine,
    pub error: SetsailErrorType,
}

/// External facing representation of a parser error type
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub enum SetsailErrorType {
    MismatchedQuotes,
    SyntaxError(String),
    IncludeError(String),
    UnexpectedEndOfFile(String),
    SemanticError(String),
    SemanticWarning(String),
}

impl SetsailError {
    pub fn log(&self, verbose: bool) {
        if !verbose {
            debug!("{}", self);
        } else if self.is_warning() {
            warn!("{}", self);
        } else {
            error!("{}", self);
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.error, SetsailErrorType::SemanticWarning(_))
    }

    /// The bare message, without the location of the offending line.
    pub fn message(&self) -> String {
        match &self.error {
            SetsailErrorType::MismatchedQuotes => "Mismatched quotes".into(),
            SetsailErrorType::SyntaxError(e)
            | SetsailErrorType::IncludeError(e)
            | SetsailErrorType::UnexpectedEndOfFile(e)
            | SetsailErrorType::SemanticError(e)
            | SetsailErrorType::SemanticWarning(e) => e.clone(),
        }
    }

    pub fn new_mismatched_quotes(line: KSLine) -> Self {
        Self {
            line,
            error: SetsailErrorType::MismatchedQuotes,
        }
    }

    pub fn new_syntax(line: KSLine, error: String) -> Self {
        Self {
            line,
            error: SetsailErrorType::SyntaxError(error),
        }
    }

    pub fn new_include(line: KSLine, error: String) -> Self {
        Self {
            line,
            error: SetsailErrorType::IncludeError(error),
        }
    }

    pub fn new_unexpected_eof(line: KSLine, error: String) -> Self {
        Self {
            line,
            error: SetsailErrorType::UnexpectedEndOfFile(error),
        }
    }

    pub fn new_semantic(line: KSLine, error: String) -> Self {
        Self {
            line,
            error: SetsailErrorType::SemanticError(error),
        }
    }

    pub fn new_sem_warn(line: KSLine, error: String) -> Self {
        Self {
            line,
            error: SetsailErrorType::SemanticWarning(error),
        }
    }

    pub fn from_clap(line: KSLine, mut error: clap::Error) -> Self {
        // Suppress usage info
        error.insert(
            clap::error::ContextKind::Usage,
            clap::error::ContextValue::None,
        );

        // Suppress help info
        error.insert(
            clap::error::ContextKind::Suggested,
            clap::error::ContextValue::None,
        );

        let string = error
            .to_string()
            .replace("For more information, try '--help'.", "")
            .trim()
            .trim_start_matches("error: ")
            .to_owned();

        Self::new_syntax(line, string)
    }
}

impl std::fmt::Display for SetsailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            SetsailErrorType::MismatchedQuotes => write!(f, "Mismatched quotes"),
            SetsailErrorType::SyntaxError(e) => write!(f, "Syntax error: {e}"),
            SetsailErrorType::IncludeError(e) => write!(f, "Include error: {e}"),
            SetsailErrorType::UnexpectedEndOfFile(e) => write!(f, "Unexpected end of file: {e}"),
            SetsailErrorType::SemanticError(e) => write!(f, "Semantic error: {e}"),
            SetsailErrorType::SemanticWarning(e) => write!(f, "Semantic warning: {e}"),
        }?;
        write!(
            f,
            " at {}:{}\n    {}",
            self.line.source, self.line.lineno, self.line.raw
        )
    }
}

/// A useful trait to convert any arbitrary Result into a Result<_, SetsailError>
pub trait ToResultSetsailError<T> {
    fn to_result_parser_error(self, line: &KSLine) -> Result<T, SetsailError>;
}

impl<T> ToResultSetsailError<T> for Result<T, clap::Error> {
    fn to_result_parser_error(self, line: &KSLine) -> Result<T, SetsailError> {
        self.map_err(|e| SetsailError::from_clap(line.clone(), e))
    }
}

impl<T> ToResultSetsailError<T> for Result<T, shellwords::MismatchedQuotes> {
    fn to_result_parser_error(self, line: &KSLine) -> Result<T, SetsailError> {
        self.map_err(|_| SetsailError::new_mismatched_quotes(line.clone()))
    }
}

#[derive(Debug)]
pub struct SetsailErrorList(pub Vec<SetsailError>);
impl std::error::Error for SetsailErrorList {}
impl std::fmt::Display for SetsailErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.0 {
            writeln!(f, "{error}")?;
        }
        Ok(())
    }
}
