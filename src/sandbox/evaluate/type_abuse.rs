use crate::{
    metadata::tables::{TypeAttributes, TypeDefRaw},
    sandbox::{decoder::MetadataDecoder, model::Violation},
    Result,
};

/// Report explicit layout types that declare fields
///
/// Overlapping fields of an explicit layout allow reinterpreting references as plain data, so
/// such types are rejected regardless of the policy.
///
/// # Errors
/// Returns an error if a `TypeDef` row cannot be decoded.
pub fn check_type_abuse(decoder: &MetadataDecoder) -> Result<Vec<Violation>> {
    let Some(typedefs) = decoder.image().tables().table::<TypeDefRaw>() else {
        return Ok(Vec::new());
    };

    let mut violations = Vec::new();
    for row in &typedefs {
        let row = row?;
        if TypeAttributes::layout(row.flags) != TypeAttributes::EXPLICIT_LAYOUT {
            continue;
        }

        if decoder.field_count(row.rid)? > 0 {
            violations.push(Violation::new(format!(
                "Explicit layout type {} may not have fields.",
                decoder.type_def(row.rid)?
            )));
        }
    }

    Ok(violations)
}
