use std::fmt;

/// Errors that can occur while loading, saving or validating macros.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    /// The macro file could not be read.
    #[error("failed to load macro: {0}")]
    LoadFailed(String),

    /// The macro file could not be written.
    #[error("failed to save macro: {0}")]
    SaveFailed(String),

    /// A line is not a row or a loop count.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// One or more rows failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

pub type Result<T> = std::result::Result<T, MacroError>;

/// Macro table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Access,
    Channel,
    Action,
    Delay,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Column::Access => "access",
            Column::Channel => "channel",
            Column::Action => "action",
            Column::Delay => "delay",
        })
    }
}

/// A single row violation. Rows are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub row: usize,
    /// `None` when the violation concerns the row as a whole.
    pub column: Option<Column>,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "row {} {}: {}", self.row, column, self.reason),
            None => write!(f, "row {}: {}", self.row, self.reason),
        }
    }
}

/// Every violation found in a macro, in row order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} invalid cell(s): {}", .0.len(), join(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
