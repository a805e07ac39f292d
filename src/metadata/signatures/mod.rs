//! Signature blob decoding (ECMA-335 II.23.2).
//!
//! Member references and type specifications describe their shape through signature blobs in
//! the `#Blob` heap. This module decodes those blobs into [`TypeSignature`] trees that still refer
//! to other metadata rows by [`crate::metadata::token::Token`].

mod parser;
mod types;

pub use parser::*;
pub use types::*;

use crate::Result;

/// Parse a method signature blob
///
/// # Errors
/// Returns an error if the blob is not a valid method signature.
pub fn parse_method_signature(data: &[u8]) -> Result<SignatureMethod> {
    SignatureParser::new(data).parse_method_signature()
}

/// Parse a field signature blob
///
/// # Errors
/// Returns an error if the blob is not a valid field signature.
pub fn parse_field_signature(data: &[u8]) -> Result<SignatureField> {
    SignatureParser::new(data).parse_field_signature()
}

/// Parse a type specification blob
///
/// # Errors
/// Returns an error if the blob is not a valid type.
pub fn parse_type_spec_signature(data: &[u8]) -> Result<SignatureTypeSpec> {
    SignatureParser::new(data).parse_type_spec_signature()
}

/// Parse the signature blob of a `MemberRef`
///
/// # Errors
/// Returns an error if the blob is neither a valid field nor method signature.
pub fn parse_member_ref_signature(data: &[u8]) -> Result<MemberRefSignature> {
    SignatureParser::new(data).parse_member_ref_signature()
}
