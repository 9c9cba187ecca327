//! Guest fault records — abort and assertion-failure diagnostics.
//!
//! A fault is terminal: once a guest reports one, the bridge session is
//! `Faulted` and never returns to `Ready`. The `Display` impl composes the
//! single diagnostic line surfaced through the host's observability channel.

use std::fmt;

/// A fatal diagnostic reported by the guest through the fixed import set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultRecord {
    /// The guest called `abort` with a message and an exit code.
    Abort {
        /// Decoded abort message.
        message: String,
        /// Guest-chosen exit code, passed through unchanged.
        exit_code: i32,
    },

    /// The guest called `assertFailure` with source-location context.
    AssertFailure {
        /// Source file of the failed assertion.
        file: String,
        /// Line number within `file`.
        line: u32,
        /// Enclosing function name.
        function: String,
        /// Text of the condition that did not hold.
        condition: String,
        /// Optional extra message; `None` when the guest passed a NUL
        /// message pointer.
        message: Option<String>,
    },
}

impl FaultRecord {
    /// The free-text message carried by the record, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Abort { message, .. } => Some(message),
            Self::AssertFailure { message, .. } => message.as_deref(),
        }
    }

    /// True for abort faults, false for assertion failures.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort { .. })
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort { message, exit_code } => {
                write!(f, "Abort [{}]: {}", exit_code, message)
            }
            Self::AssertFailure { file, line, function, condition, message } => {
                match message {
                    Some(msg) => write!(
                        f,
                        "Assertion failed, {} ({}) is not true! In {}:{} {}(...)",
                        msg, condition, file, line, function
                    ),
                    None => write!(
                        f,
                        "Assertion failed! ({}) is not true! In {}:{} {}(...)",
                        condition, file, line, function
                    ),
                }
            }
        }
    }
}
