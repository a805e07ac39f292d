//! Policy evaluators.
//!
//! Every evaluator inspects one kind of fact and returns the violations it found. None of them
//! short-circuits: the orchestrator runs all five and combines their results, so a single scan
//! reports the complete violation set of an assembly.
//!
//! | Evaluator                   | Input                        | Policy driven |
//! |-----------------------------|------------------------------|---------------|
//! | [`check_type_access`]       | referenced types             | yes           |
//! | [`check_inheritance`]       | inheritance edges            | yes           |
//! | [`check_unmanaged_methods`] | the image's method defs      | no            |
//! | [`check_type_abuse`]        | the image's type defs        | no            |
//! | [`check_member_references`] | member references            | yes           |

mod inheritance;
mod members;
mod type_abuse;
mod type_access;
mod unmanaged;

pub use inheritance::check_inheritance;
pub use members::check_member_references;
pub use type_abuse::check_type_abuse;
pub use type_access::check_type_access;
pub use unmanaged::check_unmanaged_methods;

use crate::sandbox::{
    model::TypeDescriptor,
    policy::{SandboxPolicy, TypeAccess},
};

/// The policy together with the assemblies bundled next to the scanned one
#[derive(Clone, Copy, Debug)]
pub struct PolicyScope<'p> {
    /// The loaded policy
    pub policy: &'p SandboxPolicy,
    /// Simple names of the other assemblies of the same installation
    pub other_assemblies: &'p [String],
}

impl<'p> PolicyScope<'p> {
    /// Create a new scope
    #[must_use]
    pub fn new(policy: &'p SandboxPolicy, other_assemblies: &'p [String]) -> Self {
        PolicyScope {
            policy,
            other_assemblies,
        }
    }

    /// Look up a type, treating the bundled assemblies as trusted
    #[must_use]
    pub fn access(&self, ty: &TypeDescriptor) -> TypeAccess<'p> {
        self.policy.type_access(ty, self.other_assemblies)
    }
}
