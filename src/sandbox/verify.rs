//! Seam for the bytecode-validity verifier.
//!
//! Verifying IL soundness is delegated to an external verifier behind the [`IlVerifier`] trait.
//! The orchestrator only filters the findings through the policy's allowed verifier error codes
//! and decides whether the stage passes.

use std::fmt;

use crate::{metadata::image::BinaryImage, sandbox::resolver::AssemblyResolver, Result};

/// A single finding of an IL verifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationIssue {
    /// Verifier error code, compared against the policy's allowed verifier errors
    pub code: String,
    /// Human readable description, including the offending method
    pub message: String,
}

impl VerificationIssue {
    /// Create a new issue
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        VerificationIssue {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ILVerify: {}: {}", self.code, self.message)
    }
}

/// Verifies the bytecode of every method body of an image
pub trait IlVerifier: Send + Sync {
    /// Verify `image`, resolving referenced assemblies through `resolver`
    ///
    /// # Errors
    /// Returns an error if verification could not be performed at all. Invalid IL is reported as
    /// issues, not as an error.
    fn verify(
        &self,
        image: &BinaryImage,
        resolver: &AssemblyResolver,
    ) -> Result<Vec<VerificationIssue>>;
}

/// Verifier that accepts every image
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIlVerification;

impl IlVerifier for NoIlVerification {
    fn verify(
        &self,
        _image: &BinaryImage,
        _resolver: &AssemblyResolver,
    ) -> Result<Vec<VerificationIssue>> {
        Ok(Vec::new())
    }
}
