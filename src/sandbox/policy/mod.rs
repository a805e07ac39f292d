//! The sandbox policy: which types and members untrusted code may use.
//!
//! A policy is a tree `namespace -> class name -> TypeConfig`, where a [`TypeConfig`] lists the
//! allowed methods and fields of that type and, recursively, its allowed nested types. The tree is
//! loaded once from JSON and never mutated afterwards; every whitelist declaration is parsed while
//! loading.
//!
//! Two document shapes are accepted. The bare namespace map:
//!
//! ```json
//! { "System": { "Console": { "methods": ["Void WriteLine(String)"] } } }
//! ```
//!
//! and the wrapped document carrying the remaining settings:
//!
//! ```json
//! {
//!   "systemAssemblyName": "System.Runtime",
//!   "whitelistedNamespaces": ["Content."],
//!   "allowedVerifierErrors": ["InitLocals"],
//!   "types": { "System": { "Object": { "all": true, "inherit": "Allow" } } }
//! }
//! ```
//!
//! A field declaration that does not parse rejects the whole document. A method declaration that
//! does not parse is logged and dropped, which only ever narrows the policy.

mod grammar;
mod rules;

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use tracing::error;

use crate::{
    sandbox::model::{ResolutionScope, TypeDescriptor},
    Error, Result,
};

pub use grammar::{parse_field, parse_method};
pub use rules::{FieldRule, MethodRule, RuleType};

/// Default name of the assembly defining the core library
pub const DEFAULT_SYSTEM_ASSEMBLY: &str = "System.Runtime";

/// Whether a type may be used as a base type or interface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum InheritMode {
    /// Inheritance is allowed if the type allows all members
    #[default]
    #[serde(alias = "default")]
    Default,
    /// Inheritance is always allowed
    #[serde(alias = "allow")]
    Allow,
    /// Inheritance is never allowed, even if the type allows all members
    #[serde(alias = "block")]
    Block,
}

/// Allowed members and nested types of a single type
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfig {
    /// Method declarations as written in the document
    #[serde(default, alias = "Methods")]
    methods: Option<Vec<String>>,
    /// Field declarations as written in the document
    #[serde(default, alias = "Fields")]
    fields: Option<Vec<String>>,
    /// Allowed nested types by simple name
    #[serde(default, alias = "NestedTypes")]
    nested_types: Option<BTreeMap<String, TypeConfig>>,
    /// Every member and nested type is allowed
    #[serde(default, alias = "All")]
    all: bool,
    /// Inheritance policy
    #[serde(default, alias = "Inherit")]
    inherit: InheritMode,
    #[serde(skip)]
    methods_parsed: Vec<MethodRule>,
    #[serde(skip)]
    fields_parsed: Vec<FieldRule>,
}

impl TypeConfig {
    /// A config that allows everything
    #[must_use]
    pub fn everything() -> Self {
        TypeConfig {
            all: true,
            ..TypeConfig::default()
        }
    }

    /// Method declarations as written in the document
    #[must_use]
    pub fn methods_raw(&self) -> &[String] {
        self.methods.as_deref().unwrap_or_default()
    }

    /// Field declarations as written in the document
    #[must_use]
    pub fn fields_raw(&self) -> &[String] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Parsed method rules
    #[must_use]
    pub fn methods(&self) -> &[MethodRule] {
        &self.methods_parsed
    }

    /// Parsed field rules
    #[must_use]
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields_parsed
    }

    /// The config of the nested type `name`, if listed
    #[must_use]
    pub fn nested_type(&self, name: &str) -> Option<&TypeConfig> {
        self.nested_types.as_ref()?.get(name)
    }

    /// Returns true if every member of the type is allowed
    #[must_use]
    pub fn all(&self) -> bool {
        self.all
    }

    /// The inheritance policy
    #[must_use]
    pub fn inherit(&self) -> InheritMode {
        self.inherit
    }

    /// Returns true if the type may be inherited from or implemented
    #[must_use]
    pub fn can_inherit(&self) -> bool {
        match self.inherit {
            InheritMode::Default => self.all,
            InheritMode::Allow => true,
            InheritMode::Block => false,
        }
    }

    /// Parse the raw declarations of this config and of all nested configs
    ///
    /// # Errors
    /// Returns [`Error::PolicyField`] if a field declaration does not parse. Method declarations
    /// that do not parse are logged and dropped.
    fn parse_rules(&mut self) -> Result<()> {
        self.methods_parsed = self
            .methods_raw()
            .iter()
            .filter_map(|method| match parse_method(method) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    error!("Parse exception for '{}': {}", method, e);
                    None
                }
            })
            .collect();

        let mut fields_parsed = Vec::with_capacity(self.fields_raw().len());
        for field in self.fields_raw() {
            match parse_field(field) {
                Ok(rule) => fields_parsed.push(rule),
                Err(e) => {
                    error!("Parse exception for '{}': {}", field, e);
                    return Err(Error::PolicyField {
                        rule: field.clone(),
                        reason: Box::new(e),
                    });
                }
            }
        }
        self.fields_parsed = fields_parsed;

        if let Some(nested_types) = self.nested_types.as_mut() {
            for nested in nested_types.values_mut() {
                nested.parse_rules()?;
            }
        }

        Ok(())
    }
}

/// Result of looking a type up in the policy
#[derive(Clone, Copy, Debug)]
pub enum TypeAccess<'p> {
    /// The type is not in the policy
    Denied,
    /// The type is allowed through a namespace prefix or a bundled assembly
    Everything,
    /// The type is allowed with the given config
    Listed(&'p TypeConfig),
}

impl TypeAccess<'_> {
    /// Returns true if the type may be referenced
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, TypeAccess::Denied)
    }

    /// Returns true if every member of the type is allowed
    #[must_use]
    pub fn allows_all_members(&self) -> bool {
        match self {
            TypeAccess::Denied => false,
            TypeAccess::Everything => true,
            TypeAccess::Listed(config) => config.all(),
        }
    }

    /// Returns true if the type may be inherited from or implemented
    #[must_use]
    pub fn can_inherit(&self) -> bool {
        match self {
            TypeAccess::Denied => false,
            TypeAccess::Everything => true,
            TypeAccess::Listed(config) => config.can_inherit(),
        }
    }
}

type NamespaceMap = BTreeMap<String, BTreeMap<String, TypeConfig>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default, alias = "SystemAssemblyName")]
    system_assembly_name: Option<String>,
    #[serde(default, alias = "WhitelistedNamespaces")]
    whitelisted_namespaces: Vec<String>,
    #[serde(default, alias = "AllowedVerifierErrors")]
    allowed_verifier_errors: Vec<String>,
    #[serde(alias = "Types")]
    types: NamespaceMap,
}

/// The immutable sandbox policy
#[derive(Clone, Debug)]
pub struct SandboxPolicy {
    system_assembly_name: String,
    whitelisted_namespaces: Vec<String>,
    allowed_verifier_errors: Vec<String>,
    types: NamespaceMap,
}

impl SandboxPolicy {
    /// Load a policy from a JSON document
    ///
    /// # Errors
    /// Returns [`Error::PolicyJson`] if the document does not have one of the accepted shapes, or
    /// [`Error::PolicyField`] if a field declaration does not parse.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let wrapped = ["types", "Types"]
            .iter()
            .any(|key| value.get(key).is_some_and(serde_json::Value::is_object));

        let document = if wrapped {
            serde_json::from_value::<PolicyDocument>(value)?
        } else {
            PolicyDocument {
                system_assembly_name: None,
                whitelisted_namespaces: Vec::new(),
                allowed_verifier_errors: Vec::new(),
                types: serde_json::from_value::<NamespaceMap>(value)?,
            }
        };

        let mut types = document.types;
        for classes in types.values_mut() {
            for config in classes.values_mut() {
                config.parse_rules()?;
            }
        }

        Ok(SandboxPolicy {
            system_assembly_name: document
                .system_assembly_name
                .unwrap_or_else(|| DEFAULT_SYSTEM_ASSEMBLY.to_string()),
            whitelisted_namespaces: document.whitelisted_namespaces,
            allowed_verifier_errors: document.allowed_verifier_errors,
            types,
        })
    }

    /// Load a policy from a JSON file
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be read, otherwise see
    /// [`SandboxPolicy::from_json`].
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Name of the assembly defining the core library
    #[must_use]
    pub fn system_assembly_name(&self) -> &str {
        &self.system_assembly_name
    }

    /// Namespace prefixes whose types are allowed entirely
    #[must_use]
    pub fn whitelisted_namespaces(&self) -> &[String] {
        &self.whitelisted_namespaces
    }

    /// Codes of IL verifier findings that are tolerated
    #[must_use]
    pub fn allowed_verifier_errors(&self) -> &[String] {
        &self.allowed_verifier_errors
    }

    /// The namespace tree
    #[must_use]
    pub fn types(&self) -> &BTreeMap<String, BTreeMap<String, TypeConfig>> {
        &self.types
    }

    /// The config of the top-level type `name` in `namespace`
    #[must_use]
    pub fn type_config(&self, namespace: &str, name: &str) -> Option<&TypeConfig> {
        self.types.get(namespace)?.get(name)
    }

    /// Look up a type
    ///
    /// ## Arguments
    /// * 'ty'               - The type to look up
    /// * 'other_assemblies' - Names of the assemblies bundled with the scanned one
    #[must_use]
    pub fn type_access(&self, ty: &TypeDescriptor, other_assemblies: &[String]) -> TypeAccess<'_> {
        let TypeDescriptor::Referenced {
            namespace,
            name,
            scope,
        } = ty
        else {
            return TypeAccess::Everything;
        };

        match scope {
            ResolutionScope::Unsupported(_) => TypeAccess::Denied,
            ResolutionScope::EnclosingType(enclosing) => {
                match self.type_access(enclosing, other_assemblies) {
                    TypeAccess::Denied => TypeAccess::Denied,
                    TypeAccess::Everything => TypeAccess::Everything,
                    TypeAccess::Listed(config) if config.all() => TypeAccess::Everything,
                    TypeAccess::Listed(config) => match config.nested_type(name) {
                        Some(nested) => TypeAccess::Listed(nested),
                        None => TypeAccess::Denied,
                    },
                }
            }
            ResolutionScope::Assembly(assembly) => {
                if !namespace.is_empty()
                    && self
                        .whitelisted_namespaces
                        .iter()
                        .any(|prefix| namespace.starts_with(prefix.as_str()))
                {
                    return TypeAccess::Everything;
                }

                if other_assemblies.iter().any(|other| other == assembly) {
                    return TypeAccess::Everything;
                }

                if namespace.is_empty() {
                    return TypeAccess::Denied;
                }

                match self.type_config(namespace, name) {
                    Some(config) => TypeAccess::Listed(config),
                    None => TypeAccess::Denied,
                }
            }
        }
    }
}
