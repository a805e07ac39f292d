use crate::sandbox::{
    evaluate::PolicyScope,
    model::{TypeDescriptor, Violation},
};

/// Report every referenced type the policy does not allow
///
/// ## Arguments
/// * 'scope'    - The policy and bundled assemblies
/// * 'types'    - Referenced types of the scanned assembly
/// * 'assembly' - Name of the scanned assembly, included in the messages
#[must_use]
pub fn check_type_access(
    scope: &PolicyScope,
    types: &[TypeDescriptor],
    assembly: &str,
) -> Vec<Violation> {
    types
        .iter()
        .filter(|ty| !scope.access(ty).is_allowed())
        .map(|ty| Violation::new(format!("Access to type not allowed: {ty} asmName {assembly}")))
        .collect()
}
