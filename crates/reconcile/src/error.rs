use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Store unreachable, or credentials rejected before any query ran.
    Connection {
        operation: &'static str,
        message: String,
    },
    /// Store reachable but rejected the operation or answered with
    /// something other than what was asked for.
    Query {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
}

impl ReconcileError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Connection { operation, .. } | Self::Query { operation, .. } => operation,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { operation, message } => {
                write!(f, "{operation}: cannot reach store: {message}")
            }
            Self::Query { operation, status: Some(status), detail } => {
                write!(f, "{operation}: store rejected request (HTTP {status}): {detail}")
            }
            Self::Query { operation, status: None, detail } => {
                write!(f, "{operation}: {detail}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
