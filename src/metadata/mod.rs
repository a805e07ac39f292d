//! Metadata parsing for .NET assemblies.
//!
//! This module contains the binary layer the sandbox checks are built on. It follows the layout
//! described by ECMA-335 Partition II: the CLI header points at the metadata root, which lists the
//! streams, of which the `#~` tables stream and the `#Strings` and `#Blob` heaps are decoded.
//!
//! # Key Components
//!
//! - [`image`] - A loaded assembly with its header, heaps and tables
//! - [`tables`] - Typed rows of the metadata tables the sandbox inspects
//! - [`signatures`] - Method, field and type specification signature decoding
//! - [`streams`] - Heaps and the tables stream header
//! - [`token`] - Metadata table row references
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::metadata::{image::BinaryImage, tables::TableId};
//! use std::path::Path;
//!
//! let image = BinaryImage::from_file(Path::new("Content.Client.dll"))?;
//! println!(
//!     "{}: {} member references",
//!     image.name(),
//!     image.tables().table_row_count(TableId::MemberRef)
//! );
//! # Ok::<(), dotsandbox::Error>(())
//! ```

/// Implementation of the Header of CIL
pub mod cor20header;
/// A loaded managed image
pub mod image;
/// Implementation of the metadata root
pub mod root;
/// Implementation of the signature blob decoder
pub mod signatures;
/// Implementation of the metadata streams
pub mod streams;
/// Implementation of the metadata tables
pub mod tables;
/// Metadata tokens
pub mod token;
