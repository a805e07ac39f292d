use crate::sandbox::{
    evaluate::PolicyScope,
    model::{InheritanceEdge, SigType, Violation},
};

/// Report base types and interfaces the policy does not allow to be inherited
///
/// Inheriting is a stronger grant than referencing: a type that may be referenced is only
/// inheritable when its config is `all` or explicitly allows inheritance, and never when it
/// blocks it.
#[must_use]
pub fn check_inheritance(scope: &PolicyScope, edges: &[InheritanceEdge]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for edge in edges {
        if let Some(parent) = &edge.parent {
            if !can_inherit(scope, parent) {
                violations.push(Violation::new(format!(
                    "Inheriting of type not allowed: {parent}"
                )));
            }
        }

        for interface in &edge.interfaces {
            if !can_inherit(scope, interface) {
                violations.push(Violation::new(format!(
                    "Implementing of interface not allowed: {interface}"
                )));
            }
        }
    }

    violations
}

fn can_inherit(scope: &PolicyScope, ty: &SigType) -> bool {
    match ty.root() {
        SigType::Named(named) => named.is_defined() || scope.access(named).can_inherit(),
        _ => false,
    }
}
