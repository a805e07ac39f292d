//! Structural facts extracted from an assembly.
//!
//! Every type that shows up in a check is described by a [`TypeDescriptor`] or, inside member
//! signatures, by a [`SigType`]. Both are plain values with structural equality. Their `Display`
//! output is what ends up in violation messages, so the formatting here is part of the report.

use std::fmt;

use strum::{Display, EnumIter, EnumString};

/// Built-in types that signatures encode with a dedicated element type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[allow(missing_docs)]
pub enum Primitive {
    #[strum(to_string = "Void", serialize = "void", serialize = "System.Void")]
    Void,
    #[strum(to_string = "Boolean", serialize = "bool", serialize = "System.Boolean")]
    Boolean,
    #[strum(to_string = "Char", serialize = "char", serialize = "System.Char")]
    Char,
    #[strum(to_string = "SByte", serialize = "sbyte", serialize = "System.SByte")]
    SByte,
    #[strum(to_string = "Byte", serialize = "byte", serialize = "System.Byte")]
    Byte,
    #[strum(to_string = "Int16", serialize = "short", serialize = "System.Int16")]
    Int16,
    #[strum(to_string = "UInt16", serialize = "ushort", serialize = "System.UInt16")]
    UInt16,
    #[strum(to_string = "Int32", serialize = "int", serialize = "System.Int32")]
    Int32,
    #[strum(to_string = "UInt32", serialize = "uint", serialize = "System.UInt32")]
    UInt32,
    #[strum(to_string = "Int64", serialize = "long", serialize = "System.Int64")]
    Int64,
    #[strum(to_string = "UInt64", serialize = "ulong", serialize = "System.UInt64")]
    UInt64,
    #[strum(to_string = "Single", serialize = "float", serialize = "System.Single")]
    Single,
    #[strum(to_string = "Double", serialize = "double", serialize = "System.Double")]
    Double,
    #[strum(to_string = "String", serialize = "string", serialize = "System.String")]
    String,
    #[strum(to_string = "Object", serialize = "object", serialize = "System.Object")]
    Object,
    #[strum(to_string = "IntPtr", serialize = "nint", serialize = "System.IntPtr")]
    IntPtr,
    #[strum(to_string = "UIntPtr", serialize = "nuint", serialize = "System.UIntPtr")]
    UIntPtr,
    #[strum(
        to_string = "TypedReference",
        serialize = "typedref",
        serialize = "System.TypedReference"
    )]
    TypedReference,
}

/// Where a referenced type lives
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// Top-level type of another assembly
    Assembly(String),
    /// Nested type, scoped by its enclosing type
    EnclosingType(Box<TypeDescriptor>),
    /// A scope the sandbox does not follow, with the reason reported as a violation
    Unsupported(String),
}

/// Identity of a type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// A type declared by the scanned assembly
    Defined {
        /// Namespace, empty for nested types and the global namespace
        namespace: String,
        /// Simple name
        name: String,
        /// The declaring type of a nested type
        enclosing: Option<Box<TypeDescriptor>>,
    },
    /// A type declared somewhere else
    Referenced {
        /// Namespace, empty for nested types and the global namespace
        namespace: String,
        /// Simple name
        name: String,
        /// Where the type is resolved from
        scope: ResolutionScope,
    },
}

impl TypeDescriptor {
    /// Simple name of the type
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Defined { name, .. } | TypeDescriptor::Referenced { name, .. } => name,
        }
    }

    /// Namespace of the type as written in its row, empty for nested types
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            TypeDescriptor::Defined { namespace, .. }
            | TypeDescriptor::Referenced { namespace, .. } => namespace,
        }
    }

    /// Returns true if the scanned assembly declares this type
    #[must_use]
    pub fn is_defined(&self) -> bool {
        matches!(self, TypeDescriptor::Defined { .. })
    }

    /// The enclosing type of a nested type
    #[must_use]
    pub fn enclosing(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Defined { enclosing, .. } => enclosing.as_deref(),
            TypeDescriptor::Referenced {
                scope: ResolutionScope::EnclosingType(enclosing),
                ..
            } => Some(enclosing),
            TypeDescriptor::Referenced { .. } => None,
        }
    }

    /// The outermost type of a nesting chain, `self` for top-level types
    #[must_use]
    pub fn outermost(&self) -> &TypeDescriptor {
        let mut current = self;
        while let Some(enclosing) = current.enclosing() {
            current = enclosing;
        }
        current
    }

    /// Name of the assembly a referenced type resolves to
    #[must_use]
    pub fn assembly(&self) -> Option<&str> {
        match self.outermost() {
            TypeDescriptor::Referenced {
                scope: ResolutionScope::Assembly(assembly),
                ..
            } => Some(assembly),
            _ => None,
        }
    }

    /// Namespace of the outermost type followed by the names from the outermost to this type
    #[must_use]
    pub fn path(&self) -> (&str, Vec<&str>) {
        let mut names = vec![self.name()];
        let mut current = self;
        while let Some(enclosing) = current.enclosing() {
            names.push(enclosing.name());
            current = enclosing;
        }
        names.reverse();
        (current.namespace(), names)
    }

    /// The reason this type cannot be followed, if any scope of its chain is unsupported
    #[must_use]
    pub fn unsupported(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Defined { enclosing, .. } => {
                enclosing.as_deref().and_then(TypeDescriptor::unsupported)
            }
            TypeDescriptor::Referenced { scope, .. } => match scope {
                ResolutionScope::Assembly(_) => None,
                ResolutionScope::EnclosingType(enclosing) => enclosing.unsupported(),
                ResolutionScope::Unsupported(reason) => Some(reason),
            },
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(enclosing) = self.enclosing() {
            return write!(f, "{}/{}", enclosing, self.name());
        }

        if let TypeDescriptor::Referenced { scope, .. } = self {
            match scope {
                ResolutionScope::Assembly(assembly) => write!(f, "[{assembly}]")?,
                ResolutionScope::Unsupported(_) => write!(f, "[?]")?,
                ResolutionScope::EnclosingType(_) => {}
            }
        }

        if self.namespace().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}.{}", self.namespace(), self.name())
        }
    }
}

/// A type as it appears inside a member signature
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SigType {
    /// A built-in type
    Primitive(Primitive),
    /// A class or value type
    Named(TypeDescriptor),
    /// Instantiation of a generic type
    Generic {
        /// The open generic type
        base: Box<SigType>,
        /// Type arguments
        args: Vec<SigType>,
    },
    /// Generic parameter of the declaring type, `!n`
    TypeParam(u32),
    /// Generic parameter of the method, `!!n`
    MethodParam(u32),
    /// Zero-based single dimensional array
    SzArray(Box<SigType>),
    /// Multi dimensional array
    Array {
        /// Element type
        element: Box<SigType>,
        /// Number of dimensions
        rank: u32,
    },
    /// Unmanaged pointer
    Pointer(Box<SigType>),
    /// Managed reference
    ByRef(Box<SigType>),
    /// Function pointer
    FnPtr,
    /// A type with a custom modifier attached
    Modified {
        /// The type without the modifier
        base: Box<SigType>,
        /// The modifier type
        modifier: Box<SigType>,
        /// `modreq` if set, `modopt` otherwise
        required: bool,
    },
}

impl SigType {
    /// The type with all custom modifiers removed
    #[must_use]
    pub fn unmodified(&self) -> &SigType {
        let mut current = self;
        while let SigType::Modified { base, .. } = current {
            current = base;
        }
        current
    }

    /// The named type at the root of a generic instantiation, or the type itself
    #[must_use]
    pub fn root(&self) -> &SigType {
        match self.unmodified() {
            SigType::Generic { base, .. } => base.root(),
            other => other,
        }
    }

    /// Returns true if the root type is declared by the scanned assembly
    #[must_use]
    pub fn is_defined_root(&self) -> bool {
        matches!(self.root(), SigType::Named(named) if named.is_defined())
    }

    /// The first unsupported scope found anywhere inside this type
    #[must_use]
    pub fn unsupported(&self) -> Option<&str> {
        match self {
            SigType::Named(named) => named.unsupported(),
            SigType::Generic { base, args } => base
                .unsupported()
                .or_else(|| args.iter().find_map(SigType::unsupported)),
            SigType::SzArray(inner) | SigType::Pointer(inner) | SigType::ByRef(inner) => {
                inner.unsupported()
            }
            SigType::Array { element, .. } => element.unsupported(),
            SigType::Modified { base, modifier, .. } => {
                base.unsupported().or_else(|| modifier.unsupported())
            }
            SigType::Primitive(_) | SigType::TypeParam(_) | SigType::MethodParam(_) | SigType::FnPtr => None,
        }
    }
}

impl fmt::Display for SigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigType::Primitive(primitive) => write!(f, "{primitive}"),
            SigType::Named(named) => write!(f, "{named}"),
            SigType::Generic { base, args } => {
                write!(f, "{base}<{}>", join(args))
            }
            SigType::TypeParam(index) => write!(f, "!{index}"),
            SigType::MethodParam(index) => write!(f, "!!{index}"),
            SigType::SzArray(inner) => write!(f, "{inner}[]"),
            SigType::Array { element, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                write!(f, "{element}[{commas}]")
            }
            SigType::Pointer(inner) => write!(f, "{inner}*"),
            SigType::ByRef(inner) => write!(f, "ref {inner}"),
            SigType::FnPtr => write!(f, "method *(..)"),
            SigType::Modified {
                base,
                modifier,
                required,
            } => {
                let kind = if *required { "modreq" } else { "modopt" };
                write!(f, "{base} {kind}({modifier})")
            }
        }
    }
}

/// A reference from the scanned assembly to a member of another type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberReference {
    /// A referenced method
    Method {
        /// Declaring type
        parent: SigType,
        /// Method name
        name: String,
        /// Return type
        return_type: SigType,
        /// Number of generic parameters
        generic_arity: u32,
        /// Parameter types in declaration order
        params: Vec<SigType>,
    },
    /// A referenced field
    Field {
        /// Declaring type
        parent: SigType,
        /// Field name
        name: String,
        /// Type of the field
        field_type: SigType,
    },
}

impl MemberReference {
    /// The declaring type
    #[must_use]
    pub fn parent(&self) -> &SigType {
        match self {
            MemberReference::Method { parent, .. } | MemberReference::Field { parent, .. } => {
                parent
            }
        }
    }

    /// The member name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MemberReference::Method { name, .. } | MemberReference::Field { name, .. } => name,
        }
    }
}

impl fmt::Display for MemberReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberReference::Method {
                parent,
                name,
                return_type,
                generic_arity,
                params,
            } => {
                write!(f, "{parent}.{name}")?;
                if *generic_arity > 0 {
                    write!(f, "<{generic_arity}>")?;
                }
                write!(f, "({}) Returns {return_type}", join(params))
            }
            MemberReference::Field {
                parent,
                name,
                field_type,
            } => write!(f, "{parent}.{name} Returns {field_type}"),
        }
    }
}

/// Base type and interfaces of a type declared by the scanned assembly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InheritanceEdge {
    /// The declaring type
    pub defined: TypeDescriptor,
    /// The base type, `None` if it is not checked
    pub parent: Option<SigType>,
    /// Implemented interfaces that are checked
    pub interfaces: Vec<SigType>,
}

/// A single sandbox violation
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Violation {
    /// Human readable description
    pub message: String,
}

impl Violation {
    /// Create a violation with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Violation {
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub(crate) fn join(types: &[SigType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
