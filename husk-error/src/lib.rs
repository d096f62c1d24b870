//! Error handling for the husk toolkit.
//!
//! Every crate in the workspace reports failures through the [`Error`] type
//! defined here: a category, a stable numeric code, and a message carrying
//! the dynamic context (offending offset, missing import pair, and so on).
//!
//! Helper constructors for the common error kinds live in [`kinds`]; the
//! code constants live in [`codes`].
//!
//! ```
//! use husk_error::{codes, kinds, ErrorCategory};
//!
//! let err = kinds::missing_import("wbg", "__wbg_now_8c2d62e8295e7bdf");
//! assert_eq!(err.category, ErrorCategory::Link);
//! assert_eq!(err.code, codes::MISSING_IMPORT);
//! ```

#![forbid(unsafe_code)]

use core::fmt;

pub mod codes;
pub mod kinds;

/// Error categories for husk operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    /// Structurally invalid module bytes.
    Parse = 1,
    /// Syntactically valid construct this toolkit deliberately does not
    /// interpret.
    Unsupported = 2,
    /// Import resolution failures at instance build time.
    Link = 3,
    /// Failures signalled by the guest module itself.
    Guest = 4,
    /// A pointer/length pair that did not decode as valid UTF-8.
    Encoding = 5,
    /// A value that crossed the boundary in the wrong shape.
    Validation = 6,
    /// Linear-memory access outside the current bounds.
    Memory = 7,
    /// Host-side runtime bookkeeping failures.
    Runtime = 8,
}

/// Husk `Error` type.
///
/// Categorized errors with stable codes and an owned message. Messages are
/// owned rather than static because several kinds are required to name
/// dynamic context, such as the exact `module.field` pair of a missing
/// import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// Error category.
    pub category: ErrorCategory,
    /// Error code.
    pub code: u16,
    /// Error message.
    pub message: String,
}

impl Error {
    /// Create a new error with the given category, code, and message.
    pub fn new(category: ErrorCategory, code: u16, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}:{}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for Error {}

/// Result alias used across the workspace.
pub type Result<T> = core::result::Result<T, Error>;
