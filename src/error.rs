use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::MalformedBytecode {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedBytecode {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Only a small part of the taxonomy is fatal to a method: anything classified by
/// [`Error::is_malformed`] aborts the analysis of the method that produced it. Structuring
/// problems never surface as errors, they are attached to the result as
/// [`crate::compiler::DecompilerComment`]s instead.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::MalformedBytecode`] - Invalid opcode, misaligned jump, truncated instruction,
///   stack mismatch at a merge point or a broken constant-pool reference
/// - [`Error::OutOfBounds`] - Attempted to read beyond the code buffer
/// - [`Error::NotSupported`] - Valid bytecode the core does not handle (`jsr`/`ret`)
///
/// ## Assembler Errors
/// - [`Error::DuplicateLabel`] - A label was defined twice
/// - [`Error::UndefinedLabel`] - A branch references a label that was never defined
/// - [`Error::InvalidBranch`] - A branch helper was used with a non-branch opcode
///
/// ## Internal Errors
/// - [`Error::GraphError`] - Misuse of a graph or statement arena
///
/// # Examples
///
/// ```rust,no_run
/// use jvmscope::{Error, MethodBody, MethodDecompiler, ConstantPoolMap};
///
/// let pool = ConstantPoolMap::new();
/// let method = MethodBody::new("broken", "()V", vec![0xff]);
///
/// match MethodDecompiler::new(&pool).decompile(&method) {
///     Ok(result) => println!("{}", result.dump()),
///     Err(Error::MalformedBytecode { message, file, line }) => {
///         eprintln!("Malformed method: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The method body is damaged or invalid.
    ///
    /// Raised for unknown opcodes, jump targets that do not land on an instruction boundary,
    /// instructions running past the declared code length, operand stack underflow or shape
    /// mismatches at merge points, and unusable constant-pool references.
    #[error("Malformed - {file}:{line}: {message}")]
    MalformedBytecode {
        /// The message to be printed for the error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the code buffer.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The bytecode uses a construct this library does not structure.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// A label was defined twice in an [`crate::assembly::InstructionAssembler`].
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),

    /// A branch referenced a label that was never defined.
    #[error("Undefined label - {0}")]
    UndefinedLabel(String),

    /// A branch helper was used with an opcode that is not a branch.
    #[error("Invalid branch - {0}")]
    InvalidBranch(String),

    /// Errors from graph or statement arena operations.
    ///
    /// Raised when an edge references a node outside the arena.
    #[error("{0}")]
    GraphError(String),
}

impl Error {
    /// Returns `true` if this error means the input method itself is invalid.
    ///
    /// These are the errors that abort a single method while leaving its siblings in a batch
    /// unaffected.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::MalformedBytecode { .. } | Error::OutOfBounds { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_macro_captures_location() {
        let err = malformed_error!("bad opcode {:X}", 0xFF);
        match &err {
            Error::MalformedBytecode {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad opcode FF");
                assert!(file.ends_with("error.rs"));
                assert!(*line > 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_malformed());
    }

    #[test]
    fn not_supported_is_not_malformed() {
        let err = Error::NotSupported("jsr".to_string());
        assert!(!err.is_malformed());
        assert_eq!(err.to_string(), "Not supported - jsr");
    }
}
