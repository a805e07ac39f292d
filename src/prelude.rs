//! # dotsandbox Prelude
//!
//! The types needed to load a policy and scan assemblies or whole installations.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotsandbox operations
pub use crate::Error;

/// The result type used throughout dotsandbox
pub use crate::Result;

// ================================================================================================
// Binary Image
// ================================================================================================

/// A loaded managed assembly
pub use crate::metadata::image::BinaryImage;

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

// ================================================================================================
// Policy
// ================================================================================================

/// The whitelist and its per-type configuration
pub use crate::sandbox::{InheritMode, SandboxPolicy, TypeAccess, TypeConfig};

/// Parsed whitelist member declarations
pub use crate::sandbox::policy::{parse_field, parse_method, FieldRule, MethodRule, RuleType};

// ================================================================================================
// Scanning
// ================================================================================================

/// Single assembly scans
pub use crate::sandbox::{
    check_assembly_types, AssemblyChecker, ScanOptions, ScanReport, ScanStage,
};

/// Installation scans
pub use crate::sandbox::{
    find_managed_dir, scan_installation, InstallationReport, InstallationScanOptions,
};

/// Collaborators of a scan
pub use crate::sandbox::{
    AssemblyResolver, IlVerifier, NoIlVerification, ScanLog, ScanLogKind, ScanLogSink,
    VerificationIssue,
};

// ================================================================================================
// Facts
// ================================================================================================

/// Types, signatures and member references as the sandbox sees them
pub use crate::sandbox::{
    InheritanceEdge, MemberReference, Primitive, ResolutionScope, SigType, TypeDescriptor,
    Violation,
};
