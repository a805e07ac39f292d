//! Parsed whitelist entries and their matching against extracted member references.

use std::fmt;

use crate::sandbox::model::{MemberReference, Primitive, SigType};

/// A type as written in a whitelist declaration
///
/// Unlike [`SigType`] a rule type has no resolution scope: two types match when their namespace
/// and nesting path agree, whichever assembly they come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleType {
    /// A built-in type
    Primitive(Primitive),
    /// A class or value type
    Named {
        /// Namespace of the outermost type
        namespace: String,
        /// Names from the outermost type down to the named type
        path: Vec<String>,
    },
    /// Instantiation of a generic type
    Generic {
        /// The open generic type
        base: Box<RuleType>,
        /// Type arguments
        args: Vec<RuleType>,
    },
    /// Generic parameter of the declaring type
    TypeParam(u32),
    /// Generic parameter of the method
    MethodParam(u32),
    /// Zero-based single dimensional array
    SzArray(Box<RuleType>),
    /// Multi dimensional array
    Array {
        /// Element type
        element: Box<RuleType>,
        /// Number of dimensions
        rank: u32,
    },
    /// Unmanaged pointer
    Pointer(Box<RuleType>),
    /// Managed reference
    ByRef(Box<RuleType>),
}

impl RuleType {
    /// Returns true if `ty` is the type this rule describes
    ///
    /// Custom modifiers on `ty` are ignored. Types declared by the scanned assembly and function
    /// pointers never match.
    #[must_use]
    pub fn matches(&self, ty: &SigType) -> bool {
        match (self, ty.unmodified()) {
            (RuleType::Primitive(expected), SigType::Primitive(actual)) => expected == actual,
            (RuleType::Named { namespace, path }, SigType::Named(named)) => {
                if named.outermost().is_defined() {
                    return false;
                }
                let (actual_namespace, actual_path) = named.path();
                actual_namespace == namespace
                    && actual_path.len() == path.len()
                    && actual_path.iter().zip(path).all(|(actual, expected)| actual == expected)
            }
            (
                RuleType::Generic { base, args },
                SigType::Generic {
                    base: actual_base,
                    args: actual_args,
                },
            ) => {
                base.matches(actual_base)
                    && args.len() == actual_args.len()
                    && args.iter().zip(actual_args).all(|(rule, arg)| rule.matches(arg))
            }
            (RuleType::TypeParam(expected), SigType::TypeParam(actual))
            | (RuleType::MethodParam(expected), SigType::MethodParam(actual)) => expected == actual,
            (RuleType::SzArray(rule), SigType::SzArray(inner))
            | (RuleType::Pointer(rule), SigType::Pointer(inner))
            | (RuleType::ByRef(rule), SigType::ByRef(inner)) => rule.matches(inner),
            (
                RuleType::Array { element, rank },
                SigType::Array {
                    element: actual_element,
                    rank: actual_rank,
                },
            ) => rank == actual_rank && element.matches(actual_element),
            _ => false,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Primitive(primitive) => write!(f, "{primitive}"),
            RuleType::Named { namespace, path } => {
                if !namespace.is_empty() {
                    write!(f, "{namespace}.")?;
                }
                write!(f, "{}", path.join("/"))
            }
            RuleType::Generic { base, args } => {
                let args = args.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "{base}<{}>", args.join(", "))
            }
            RuleType::TypeParam(index) => write!(f, "!{index}"),
            RuleType::MethodParam(index) => write!(f, "!!{index}"),
            RuleType::SzArray(inner) => write!(f, "{inner}[]"),
            RuleType::Array { element, rank } => {
                write!(f, "{element}[{}]", ",".repeat(rank.saturating_sub(1) as usize))
            }
            RuleType::Pointer(inner) => write!(f, "{inner}*"),
            RuleType::ByRef(inner) => write!(f, "ref {inner}"),
        }
    }
}

/// An allowed method
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodRule {
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: RuleType,
    /// Parameter types in declaration order
    pub params: Vec<RuleType>,
    /// Number of generic parameters
    pub generic_arity: u32,
}

impl MethodRule {
    /// Returns true if `member` is a method with this exact name, arity and signature
    #[must_use]
    pub fn matches(&self, member: &MemberReference) -> bool {
        let MemberReference::Method {
            name,
            return_type,
            generic_arity,
            params,
            ..
        } = member
        else {
            return false;
        };

        *name == self.name
            && *generic_arity == self.generic_arity
            && self.return_type.matches(return_type)
            && params.len() == self.params.len()
            && self
                .params
                .iter()
                .zip(params)
                .all(|(rule, param)| rule.matches(param))
    }
}

/// An allowed field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRule {
    /// Field name
    pub name: String,
    /// Type of the field
    pub field_type: RuleType,
}

impl FieldRule {
    /// Returns true if `member` is a field with this name and type
    #[must_use]
    pub fn matches(&self, member: &MemberReference) -> bool {
        match member {
            MemberReference::Field {
                name, field_type, ..
            } => *name == self.name && self.field_type.matches(field_type),
            MemberReference::Method { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{
        model::{ResolutionScope, TypeDescriptor},
        policy::grammar::{parse_field, parse_method},
    };

    fn referenced(namespace: &str, name: &str) -> TypeDescriptor {
        TypeDescriptor::Referenced {
            namespace: namespace.to_string(),
            name: name.to_string(),
            scope: ResolutionScope::Assembly("System.Runtime".to_string()),
        }
    }

    fn console_method(params: Vec<SigType>) -> MemberReference {
        MemberReference::Method {
            parent: SigType::Named(referenced("System", "Console")),
            name: "Foo".to_string(),
            return_type: SigType::Primitive(Primitive::Void),
            generic_arity: 0,
            params,
        }
    }

    #[test]
    fn method_signature_must_agree() {
        let rule = parse_method("Void Foo(Int32, String)").unwrap();

        assert!(rule.matches(&console_method(vec![
            SigType::Primitive(Primitive::Int32),
            SigType::Primitive(Primitive::String),
        ])));
        assert!(!rule.matches(&console_method(vec![
            SigType::Primitive(Primitive::Int64),
            SigType::Primitive(Primitive::String),
        ])));
        assert!(!rule.matches(&console_method(vec![SigType::Primitive(Primitive::Int32)])));
    }

    #[test]
    fn named_types_ignore_assembly() {
        let rule = parse_field("System.Collections.Generic.List`1/Enumerator Current").unwrap();
        let enumerator = TypeDescriptor::Referenced {
            namespace: String::new(),
            name: "Enumerator".to_string(),
            scope: ResolutionScope::EnclosingType(Box::new(TypeDescriptor::Referenced {
                namespace: "System.Collections.Generic".to_string(),
                name: "List`1".to_string(),
                scope: ResolutionScope::Assembly("System.Collections".to_string()),
            })),
        };
        let member = MemberReference::Field {
            parent: SigType::Named(referenced("System", "Holder")),
            name: "Current".to_string(),
            field_type: SigType::Named(enumerator),
        };

        assert!(rule.matches(&member));
    }

    #[test]
    fn defined_types_never_match() {
        let rule = RuleType::Named {
            namespace: "Content.Client".to_string(),
            path: vec!["Thing".to_string()],
        };
        let defined = SigType::Named(TypeDescriptor::Defined {
            namespace: "Content.Client".to_string(),
            name: "Thing".to_string(),
            enclosing: None,
        });

        assert!(!rule.matches(&defined));
    }

    #[test]
    fn modifiers_are_transparent() {
        let rule = parse_field("Int32 counter").unwrap();
        let member = MemberReference::Field {
            parent: SigType::Named(referenced("System", "Holder")),
            name: "counter".to_string(),
            field_type: SigType::Modified {
                base: Box::new(SigType::Primitive(Primitive::Int32)),
                modifier: Box::new(SigType::Named(referenced(
                    "System.Runtime.CompilerServices",
                    "IsVolatile",
                ))),
                required: true,
            },
        };

        assert!(rule.matches(&member));
        assert!(!parse_method("Int32 counter()").unwrap().matches(&member));
    }

    #[test]
    fn generic_arity_and_parameters() {
        let rule = parse_method("!!0 Get<1>(System.Collections.Generic.List`1<!!0>)").unwrap();
        let list = SigType::Named(referenced("System.Collections.Generic", "List`1"));
        let member = MemberReference::Method {
            parent: SigType::Named(referenced("System", "Holder")),
            name: "Get".to_string(),
            return_type: SigType::MethodParam(0),
            generic_arity: 1,
            params: vec![SigType::Generic {
                base: Box::new(list),
                args: vec![SigType::MethodParam(0)],
            }],
        };

        assert!(rule.matches(&member));
        assert!(!parse_method("!!0 Get(System.Collections.Generic.List`1<!!0>)")
            .unwrap()
            .matches(&member));
    }

    #[test]
    fn display() {
        let rule = parse_method("void F(System.Collections.Generic.Dictionary`2<int, string>[,], ref Robust.Map/Entry)").unwrap();
        let params = rule.params.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            params,
            vec![
                "System.Collections.Generic.Dictionary`2<Int32, String>[,]",
                "ref Robust.Map/Entry"
            ]
        );
    }
}
