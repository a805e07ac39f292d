// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # dotsandbox
//!
//! Static sandbox verification of untrusted .NET assemblies.
//!
//! Community-built game content ships as managed assemblies that a launcher loads into the game
//! process. `dotsandbox` decides whether such an assembly may be loaded by inspecting its binary
//! metadata against a declarative whitelist of types and members, without executing any of it.
//!
//! ## Features
//!
//! - **Memory-mapped loading** - PE and ECMA-335 metadata parsing over borrowed bytes
//! - **Complete violation sets** - every disallowed type, member and base type of an assembly is
//!   reported in one scan
//! - **Declarative policy** - a JSON namespace tree with C#-like member declarations
//! - **Parallel extraction** - member references are decoded with `rayon`
//! - **Installation scans** - every untrusted assembly of a game build with a shared resolver
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotsandbox::prelude::*;
//! use std::path::Path;
//!
//! let policy = SandboxPolicy::from_file(Path::new("CodeScanList.json"))?;
//! let report = scan_installation(
//!     Path::new("builds/1234"),
//!     &policy,
//!     &InstallationScanOptions::new(),
//!     &mut |entry: ScanLog| println!("{entry}"),
//! )?;
//!
//! if !report.passed {
//!     println!("installation rejected");
//! }
//! # Ok::<(), dotsandbox::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - PE container access (`goblin` over `memmap2`)
//! - [`metadata`] - CLI header, metadata root, heaps, tables and signatures
//! - [`sandbox`] - fact extraction, the policy and its evaluators, the scan pipeline
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber. Progress meant for
//! operators is delivered to a [`sandbox::ScanLogSink`] and mirrored to `tracing`.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. A scan that returns an error could not be
//! performed at all; callers must treat it like a rejection. Sandbox violations are not errors,
//! they are part of the [`sandbox::ScanReport`].

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types
pub mod prelude;

/// Access to the PE container of an assembly
pub mod file;

/// ECMA-335 metadata parsing
pub mod metadata;

/// Static sandbox verification
pub mod sandbox;

#[cfg(test)]
mod test;

/// `dotsandbox` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotsandbox` Error type
///
/// Every error that loading, policy parsing or scanning can produce.
///
/// # Example
///
/// ```rust,no_run
/// use dotsandbox::{sandbox::SandboxPolicy, Error};
/// match SandboxPolicy::from_json("{ \"System\": 3 }") {
///     Ok(_) => println!("loaded"),
///     Err(Error::PolicyJson(e)) => println!("invalid document: {e}"),
///     Err(e) => println!("error: {e}"),
/// }
/// ```
pub use error::Error;

/// Low-level parsing utilities
pub use file::{parser::Parser, File};
