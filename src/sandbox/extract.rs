//! Extraction of referenced types, member references and inheritance edges.
//!
//! Extraction never stops at the first problem. Metadata shapes the sandbox does not follow, such
//! as forwarded types or module-level members, become [`Violation`]s in [`Facts::violations`] and
//! the walk continues. Only metadata that cannot be decoded at all is returned as an error.

use std::collections::HashMap;

use rayon::iter::ParallelIterator;

use crate::{
    metadata::{
        signatures::{parse_member_ref_signature, MemberRefSignature},
        tables::{CodedIndex, InterfaceImplRaw, MemberRefRaw, TableId, TypeDefRaw, TypeRefRaw},
    },
    sandbox::{
        decoder::MetadataDecoder,
        model::{InheritanceEdge, MemberReference, ResolutionScope, SigType, TypeDescriptor, Violation},
    },
    Result,
};

/// Assemblies that may define the core library
const CORE_ASSEMBLIES: &[&str] = &[
    "System.Runtime",
    "mscorlib",
    "netstandard",
    "System.Private.CoreLib",
];

/// Base types every type implicitly derives from, never checked for inheritance
const ROOT_TYPES: &[&str] = &["Object", "ValueType", "Enum", "MulticastDelegate", "Delegate"];

/// Everything the evaluators need to know about an assembly
#[derive(Debug, Default)]
pub struct Facts {
    /// Every followed `TypeRef`, in row order
    pub types: Vec<TypeDescriptor>,
    /// Every member reference with a checked parent, in row order
    pub members: Vec<MemberReference>,
    /// Types with an externally declared base type or interface
    pub inheritance: Vec<InheritanceEdge>,
    /// Unsupported metadata found while extracting
    pub violations: Vec<Violation>,
}

enum MemberOutcome {
    Fact(MemberReference),
    Violation(Violation),
    Skipped,
}

/// Extract all facts of the decoded image
///
/// ## Arguments
/// * 'decoder'         - Decoder over the scanned image
/// * 'system_assembly' - Name of the core library assembly configured by the policy
///
/// # Errors
/// Returns an error if a table row, heap entry or signature cannot be decoded.
pub fn extract_facts(decoder: &MetadataDecoder, system_assembly: &str) -> Result<Facts> {
    let mut facts = Facts::default();

    facts.types = referenced_types(decoder, &mut facts.violations)?;
    facts.members = referenced_members(decoder, &mut facts.violations)?;
    facts.inheritance = inherited_types(decoder, system_assembly, &mut facts.violations)?;

    Ok(facts)
}

/// Describe every `TypeRef` row, reporting rows with an unsupported resolution scope
///
/// # Errors
/// Returns an error if a row cannot be decoded.
pub fn referenced_types(
    decoder: &MetadataDecoder,
    violations: &mut Vec<Violation>,
) -> Result<Vec<TypeDescriptor>> {
    let Some(table) = decoder.image().tables().table::<TypeRefRaw>() else {
        return Ok(Vec::new());
    };

    let mut types = Vec::with_capacity(table.row_count() as usize);
    for row in &table {
        let descriptor = decoder.type_ref(row?.rid)?;
        match descriptor.unsupported() {
            Some(reason) => violations.push(Violation::new(reason)),
            None => types.push(descriptor),
        }
    }

    Ok(types)
}

/// Describe every `MemberRef` row
///
/// Rows are decoded in parallel. The outcomes are collected in row order and folded afterwards,
/// so the resulting facts and violations do not depend on scheduling.
///
/// # Errors
/// Returns the error of the first row, in row order, that cannot be decoded.
pub fn referenced_members(
    decoder: &MetadataDecoder,
    violations: &mut Vec<Violation>,
) -> Result<Vec<MemberReference>> {
    let Some(table) = decoder.image().tables().table::<MemberRefRaw>() else {
        return Ok(Vec::new());
    };

    let outcomes: Vec<Result<MemberOutcome>> = table
        .par_iter()
        .map(|row| row.and_then(|row| member_outcome(decoder, &row)))
        .collect();

    let mut members = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome? {
            MemberOutcome::Fact(member) => members.push(member),
            MemberOutcome::Violation(violation) => violations.push(violation),
            MemberOutcome::Skipped => {}
        }
    }

    Ok(members)
}

fn member_outcome(decoder: &MetadataDecoder, row: &MemberRefRaw) -> Result<MemberOutcome> {
    let name = decoder.string(row.name)?;

    let parent = match row.class.tag {
        TableId::TypeRef => SigType::Named(decoder.type_ref(row.class.row)?),
        TableId::TypeDef => SigType::Named(decoder.type_def(row.class.row)?),
        TableId::TypeSpec => {
            let parent = decoder.type_spec(row.class.row)?;
            if parent.is_defined_root() {
                return Ok(MemberOutcome::Skipped);
            }
            parent
        }
        TableId::ModuleRef => {
            return Ok(MemberOutcome::Violation(Violation::new(format!(
                "Module global variables and methods are unsupported. Name: {name}"
            ))));
        }
        TableId::MethodDef => {
            return Ok(MemberOutcome::Violation(Violation::new(format!(
                "Vararg calls are unsupported. Name: {name}"
            ))));
        }
        kind => {
            return Ok(MemberOutcome::Violation(Violation::new(format!(
                "Unsupported member ref parent type: {kind}. Name: {name}"
            ))));
        }
    };

    let blob = decoder.image().blobs().get(row.signature as usize)?;
    let member = match parse_member_ref_signature(blob)? {
        MemberRefSignature::Method(signature) => MemberReference::Method {
            parent,
            name,
            return_type: decoder.sig_type(&signature.return_type)?,
            generic_arity: signature.generic_param_count,
            params: signature
                .params
                .iter()
                .chain(&signature.varargs)
                .map(|param| decoder.sig_type(param))
                .collect::<Result<Vec<_>>>()?,
        },
        MemberRefSignature::Field(signature) => MemberReference::Field {
            parent,
            name,
            field_type: decoder.sig_type(&signature.base)?,
        },
    };

    if let Some(reason) = member_unsupported(&member) {
        return Ok(MemberOutcome::Violation(Violation::new(reason)));
    }

    Ok(MemberOutcome::Fact(member))
}

fn member_unsupported(member: &MemberReference) -> Option<&str> {
    match member {
        MemberReference::Method {
            parent,
            return_type,
            params,
            ..
        } => parent
            .unsupported()
            .or_else(|| return_type.unsupported())
            .or_else(|| params.iter().find_map(SigType::unsupported)),
        MemberReference::Field {
            parent, field_type, ..
        } => parent.unsupported().or_else(|| field_type.unsupported()),
    }
}

/// Collect the base type and interfaces of every type definition
///
/// Bases and interfaces declared by the scanned assembly, including generic instantiations of
/// them, are not recorded. Neither are the implicit root types of the core library.
///
/// # Errors
/// Returns an error if a row cannot be decoded.
pub fn inherited_types(
    decoder: &MetadataDecoder,
    system_assembly: &str,
    violations: &mut Vec<Violation>,
) -> Result<Vec<InheritanceEdge>> {
    let tables = decoder.image().tables();
    let Some(typedefs) = tables.table::<TypeDefRaw>() else {
        return Ok(Vec::new());
    };

    let mut interfaces_by_class: HashMap<u32, Vec<CodedIndex>> = HashMap::new();
    if let Some(impls) = tables.table::<InterfaceImplRaw>() {
        for row in &impls {
            let row = row?;
            interfaces_by_class
                .entry(row.class)
                .or_default()
                .push(row.interface);
        }
    }

    let mut edges = Vec::new();
    for row in &typedefs {
        let row = row?;
        let defined = decoder.type_def(row.rid)?;

        let parent = if row.extends.is_null() {
            None
        } else {
            inherit_type(decoder, &row.extends, &defined, system_assembly, violations)?
        };

        let mut interfaces = Vec::new();
        for interface in interfaces_by_class.get(&row.rid).into_iter().flatten() {
            if let Some(implemented) =
                inherit_type(decoder, interface, &defined, system_assembly, violations)?
            {
                interfaces.push(implemented);
            }
        }

        if parent.is_some() || !interfaces.is_empty() {
            edges.push(InheritanceEdge {
                defined,
                parent,
                interfaces,
            });
        }
    }

    Ok(edges)
}

fn inherit_type(
    decoder: &MetadataDecoder,
    index: &CodedIndex,
    owner: &TypeDescriptor,
    system_assembly: &str,
    violations: &mut Vec<Violation>,
) -> Result<Option<SigType>> {
    let inherited = match index.tag {
        TableId::TypeDef => return Ok(None),
        TableId::TypeRef => {
            let ty = decoder.type_ref(index.row)?;
            if is_root_type(&ty, system_assembly) {
                return Ok(None);
            }
            SigType::Named(ty)
        }
        TableId::TypeSpec => {
            let ty = decoder.type_spec(index.row)?;
            if ty.is_defined_root() {
                return Ok(None);
            }
            ty
        }
        kind => {
            violations.push(Violation::new(format!(
                "Unsupported BaseType of kind {kind} on type {owner}"
            )));
            return Ok(None);
        }
    };

    if let Some(reason) = inherited.unsupported() {
        violations.push(Violation::new(reason));
        return Ok(None);
    }

    if !matches!(inherited.root(), SigType::Named(_)) {
        violations.push(Violation::new(format!(
            "Unsupported BaseType of kind {inherited} on type {owner}"
        )));
        return Ok(None);
    }

    Ok(Some(inherited))
}

fn is_root_type(ty: &TypeDescriptor, system_assembly: &str) -> bool {
    let TypeDescriptor::Referenced {
        namespace,
        name,
        scope: ResolutionScope::Assembly(assembly),
    } = ty
    else {
        return false;
    };

    namespace == "System"
        && ROOT_TYPES.contains(&name.as_str())
        && (assembly == system_assembly || CORE_ASSEMBLIES.contains(&assembly.as_str()))
}
