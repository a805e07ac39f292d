use crate::sandbox::{
    evaluate::PolicyScope,
    model::{MemberReference, SigType, Violation},
    policy::TypeAccess,
};

/// Report member references that no rule of the declaring type's config allows
///
/// Members of arrays and of types declared by the scanned assembly are not checked. A declaring
/// type that is not listed at all is reported once per member reference, without a member rule
/// lookup.
#[must_use]
pub fn check_member_references(scope: &PolicyScope, members: &[MemberReference]) -> Vec<Violation> {
    members
        .iter()
        .filter_map(|member| check_member(scope, member))
        .collect()
}

fn check_member(scope: &PolicyScope, member: &MemberReference) -> Option<Violation> {
    let declaring = match member.parent().root() {
        SigType::Named(named) if named.is_defined() => return None,
        SigType::Named(named) => named,
        SigType::SzArray(_) | SigType::Array { .. } => return None,
        other => {
            return Some(Violation::new(format!(
                "Invalid baseType in memberRef: {other}"
            )))
        }
    };

    let config = match scope.access(declaring) {
        TypeAccess::Denied => {
            return Some(Violation::new(format!(
                "Access to type not allowed: {declaring}"
            )))
        }
        TypeAccess::Everything => return None,
        TypeAccess::Listed(config) if config.all() => return None,
        TypeAccess::Listed(config) => config,
    };

    match member {
        MemberReference::Field { .. } => {
            if config.fields().iter().any(|rule| rule.matches(member)) {
                return None;
            }
            Some(Violation::new(format!("Access to field not allowed: {member}")))
        }
        MemberReference::Method { .. } => {
            if config.methods().iter().any(|rule| rule.matches(member)) {
                return None;
            }
            Some(Violation::new(format!("Access to method not allowed: {member}")))
        }
    }
}
