//! Metadata streams of a .NET assembly.
//!
//! The metadata root lists up to five streams. The sandbox needs three of them:
//!
//! - **`#Strings`** - UTF-8 identifiers such as type, namespace and member names
//! - **`#Blob`** - signatures of fields, methods and type specifications
//! - **`#~`** / **`#-`** - the metadata tables
//!
//! `#GUID` and `#US` are accepted in the stream directory but never read.
//!
//! # References
//!
//! - ECMA-335 6th Edition, Partition II, Section 24.2.2 - Stream Headers
//! - ECMA-335 6th Edition, Partition II, Section 22 - Metadata Tables

mod blob;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tablesheader::TablesHeader;
