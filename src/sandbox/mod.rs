//! Static sandbox verification of untrusted assemblies.
//!
//! The sandbox decides whether an assembly may be loaded by reading its metadata only, without
//! executing any of it. An assembly is rejected when it contains native code, when its IL does
//! not verify, or when it references a type or member, or inherits from a type, that the
//! [`SandboxPolicy`] does not allow.
//!
//! # Architecture
//!
//! - [`model`] - types, signatures and member references as the sandbox sees them
//! - [`decoder`] - translation of metadata rows and signature blobs into the model
//! - [`extract`] - collection of the facts the evaluators need
//! - [`policy`] - the whitelist tree and its member rule grammar
//! - [`evaluate`] - the five evaluators producing violations
//! - [`checker`] - the per-assembly pipeline and its log sequence
//! - [`installation`] - scanning every untrusted assembly of a game build
//! - [`resolver`], [`verify`], [`scanlog`] - collaborators of the pipeline
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::sandbox::{AssemblyChecker, AssemblyResolver, SandboxPolicy, ScanLog};
//! use std::path::Path;
//!
//! let policy = SandboxPolicy::from_json(r#"{ "System": { "Object": { "all": true } } }"#)?;
//! let resolver = AssemblyResolver::new("Game_Data/Managed");
//!
//! let report = AssemblyChecker::new(&policy).check_file(
//!     Path::new("Game_Data/Managed/Content.Client.dll"),
//!     &resolver,
//!     &[],
//!     &mut |entry: ScanLog| eprintln!("{entry}"),
//! )?;
//! for violation in &report.violations {
//!     println!("{violation}");
//! }
//! # Ok::<(), dotsandbox::Error>(())
//! ```

pub mod checker;
pub mod decoder;
pub mod evaluate;
pub mod extract;
pub mod installation;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod scanlog;
pub mod verify;

pub use checker::{check_assembly_types, AssemblyChecker, ScanOptions, ScanReport, ScanStage};
pub use installation::{
    find_managed_dir, good_file_names, scan_installation, InstallationReport,
    InstallationScanOptions,
};
pub use model::{
    InheritanceEdge, MemberReference, Primitive, ResolutionScope, SigType, TypeDescriptor,
    Violation,
};
pub use policy::{InheritMode, SandboxPolicy, TypeAccess, TypeConfig};
pub use resolver::AssemblyResolver;
pub use scanlog::{ScanLog, ScanLogKind, ScanLogSink};
pub use verify::{IlVerifier, NoIlVerification, VerificationIssue};
