use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
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
/// An `Error` always means that a scan could not be *performed*: the file could not be read, its
/// metadata is malformed, or the policy document is unusable. Sandbox violations found in a
/// well-formed assembly are not errors, they are reported as
/// [`crate::sandbox::Violation`] values inside a [`crate::sandbox::ScanReport`]. Callers are
/// expected to treat an `Err` exactly like a rejected assembly.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond buffer boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::RecursionLimit`] - Signature nesting exceeded the decoder limit
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
///
/// ## Sandbox Errors
/// - [`Error::AssemblyNotFound`] - The resolver has no file for an assembly name
/// - [`Error::PolicyJson`] - The policy document is not valid JSON of the expected shape
/// - [`Error::PolicyField`] - A field whitelist rule failed to parse
/// - [`Error::Whitelist`] - A whitelist declaration failed to parse
/// - [`Error::ManagedDirNotFound`] - An installation has no managed assembly directory
/// - [`Error::Cancelled`] - An installation scan was cancelled between assemblies
///
/// # Examples
///
/// ```rust,no_run
/// use dotsandbox::{Error, sandbox::SandboxPolicy};
/// use std::path::Path;
///
/// match SandboxPolicy::from_file(Path::new("sandbox.json")) {
///     Ok(policy) => println!("{} namespaces", policy.types().len()),
///     Err(Error::PolicyField { rule, reason }) => eprintln!("bad field rule '{rule}': {reason}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// Carries the source location that detected the problem, which makes it
    /// possible to pin down which structure was rejected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate while parsing the PE container.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Reached the maximum recursion level allowed while decoding signatures.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// No file in the managed directory matches the requested assembly name.
    #[error("Could not find assembly '{0}' in the managed directory")]
    AssemblyNotFound(String),

    /// The policy document could not be deserialized.
    #[error("Unable to deserialize sandbox policy - {0}")]
    PolicyJson(#[from] serde_json::Error),

    /// A field whitelist rule failed to parse, which invalidates the whole policy.
    #[error("Failed to parse field rule '{rule}' - {reason}")]
    PolicyField {
        /// The raw rule text
        rule: String,
        /// The underlying grammar error
        reason: Box<Error>,
    },

    /// A whitelist member declaration does not follow the declaration grammar.
    #[error("Invalid whitelist declaration '{input}' at {position}: {reason}")]
    Whitelist {
        /// The declaration text
        input: String,
        /// Byte offset of the failure
        position: usize,
        /// What the parser expected
        reason: String,
    },

    /// No managed assembly directory was found below an installation root.
    #[error("No managed assembly directory below {0}")]
    ManagedDirNotFound(PathBuf),

    /// The scan was cancelled between two assemblies.
    #[error("The scan was cancelled")]
    Cancelled,
}
