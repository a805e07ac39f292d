use crate::{
    metadata::tables::{MethodDefRaw, MethodImplCodeType, MethodImplManagement, MethodModifiers},
    sandbox::{decoder::MetadataDecoder, model::Violation},
    Result,
};

/// Report method definitions of the scanned assembly that are implemented natively
///
/// Unmanaged or native implementations and platform invoke declarations are rejected regardless
/// of the policy.
///
/// # Errors
/// Returns an error if a `MethodDef` row or its signature cannot be decoded.
pub fn check_unmanaged_methods(decoder: &MetadataDecoder) -> Result<Vec<Violation>> {
    let Some(methods) = decoder.image().tables().table::<MethodDefRaw>() else {
        return Ok(Vec::new());
    };
    let owners = decoder.method_owners()?;

    let mut violations = Vec::new();
    for method in &methods {
        let method = method?;
        let owner = owners.get(method.rid as usize).copied().unwrap_or(0);

        let code_type = MethodImplCodeType::from_impl_flags(method.impl_flags);
        let illegal_impl = MethodImplManagement::from_impl_flags(method.impl_flags)
            .contains(MethodImplManagement::UNMANAGED)
            || (code_type != MethodImplCodeType::IL && code_type != MethodImplCodeType::RUNTIME);
        if illegal_impl {
            violations.push(Violation::new(format!(
                "Method has illegal MethodImplAttributes: {}",
                decoder.method_definition(&method, owner)?
            )));
        }

        let modifiers = MethodModifiers::from_method_flags(method.flags);
        if modifiers.intersects(MethodModifiers::PINVOKE_IMPL | MethodModifiers::UNMANAGED_EXPORT) {
            violations.push(Violation::new(format!(
                "Method has illegal MethodAttributes: {}",
                decoder.method_definition(&method, owner)?
            )));
        }
    }

    Ok(violations)
}
