//! Translation of metadata rows and signatures into sandbox facts.
//!
//! The decoder turns tokens, coded indexes and decoded signature trees of a [`BinaryImage`] into
//! [`TypeDescriptor`] and [`SigType`] values. Resolution scopes that the sandbox refuses to follow
//! are not errors here: they are kept as [`ResolutionScope::Unsupported`] so the extractor can
//! report them as violations.

use std::collections::HashMap;

use crate::{
    metadata::{
        image::BinaryImage,
        signatures::{parse_method_signature, parse_type_spec_signature, TypeSignature},
        tables::{
            AssemblyRefRaw, CodedIndex, FieldPtrRaw, MethodDefRaw, MethodPtrRaw, NestedClassRaw, TableId,
            TypeDefRaw, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
    },
    sandbox::model::{join, Primitive, ResolutionScope, SigType, TypeDescriptor},
    Error::RecursionLimit,
    Result,
};

/// Maximum depth of nesting chains and type specifications followed while decoding
const MAX_RECURSION_DEPTH: usize = 64;

/// Decodes metadata of a single image into sandbox facts
pub struct MetadataDecoder<'a> {
    image: &'a BinaryImage,
    /// Nested TypeDef row to enclosing TypeDef row
    enclosing: HashMap<u32, u32>,
}

impl<'a> MetadataDecoder<'a> {
    /// Create a decoder for `image`, indexing its nested type declarations
    ///
    /// # Errors
    /// Returns an error if the `NestedClass` table cannot be read.
    pub fn new(image: &'a BinaryImage) -> Result<Self> {
        let mut enclosing = HashMap::new();
        if let Some(nested) = image.tables().table::<NestedClassRaw>() {
            for row in &nested {
                let row = row?;
                enclosing.insert(row.nested_class, row.enclosing_class);
            }
        }

        Ok(MetadataDecoder { image, enclosing })
    }

    /// The image being decoded
    #[must_use]
    pub fn image(&self) -> &'a BinaryImage {
        self.image
    }

    /// Read a string from the `#Strings` heap
    ///
    /// # Errors
    /// Returns an error if the index is outside of the heap.
    pub fn string(&self, index: u32) -> Result<String> {
        Ok(self.image.strings().get(index as usize)?.to_string())
    }

    /// Describe the `TypeRef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row or one of its enclosing rows cannot be read.
    pub fn type_ref(&self, rid: u32) -> Result<TypeDescriptor> {
        self.type_ref_with_depth(rid, 0)
    }

    fn type_ref_with_depth(&self, rid: u32, depth: usize) -> Result<TypeDescriptor> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let Some(table) = self.image.tables().table::<TypeRefRaw>() else {
            return Err(malformed_error!("TypeRef {} referenced without a TypeRef table", rid));
        };
        let row = table.get(rid)?;
        let name = self.string(row.type_name)?;
        let namespace = self.string(row.type_namespace)?;

        let scope = if row.resolution_scope.is_null() {
            ResolutionScope::Unsupported(format!(
                "Null resolution scope on type Name: {namespace}.{name}. This indicates exported/forwarded types"
            ))
        } else {
            match row.resolution_scope.tag {
                TableId::AssemblyRef => {
                    ResolutionScope::Assembly(self.assembly_ref_name(row.resolution_scope.row)?)
                }
                TableId::TypeRef => ResolutionScope::EnclosingType(Box::new(
                    self.type_ref_with_depth(row.resolution_scope.row, depth + 1)?,
                )),
                TableId::ModuleRef => ResolutionScope::Unsupported(format!(
                    "Cross-module reference to type {namespace}.{name}. "
                )),
                kind => ResolutionScope::Unsupported(format!(
                    "TypeRef to {kind} for type {namespace}.{name}"
                )),
            }
        };

        Ok(TypeDescriptor::Referenced {
            namespace,
            name,
            scope,
        })
    }

    fn assembly_ref_name(&self, rid: u32) -> Result<String> {
        let Some(table) = self.image.tables().table::<AssemblyRefRaw>() else {
            return Err(malformed_error!("AssemblyRef {} referenced without an AssemblyRef table", rid));
        };

        self.string(table.get(rid)?.name)
    }

    /// Describe the `TypeDef` row `rid`, including its chain of declaring types
    ///
    /// # Errors
    /// Returns an error if the row cannot be read or the nesting chain is cyclic.
    pub fn type_def(&self, rid: u32) -> Result<TypeDescriptor> {
        self.type_def_with_depth(rid, 0)
    }

    fn type_def_with_depth(&self, rid: u32, depth: usize) -> Result<TypeDescriptor> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let Some(table) = self.image.tables().table::<TypeDefRaw>() else {
            return Err(malformed_error!("TypeDef {} referenced without a TypeDef table", rid));
        };
        let row = table.get(rid)?;

        let enclosing = match self.enclosing.get(&rid) {
            Some(parent) => Some(Box::new(self.type_def_with_depth(*parent, depth + 1)?)),
            None => None,
        };

        Ok(TypeDescriptor::Defined {
            namespace: self.string(row.type_namespace)?,
            name: self.string(row.type_name)?,
            enclosing,
        })
    }

    /// Decode the `TypeSpec` row `rid`
    ///
    /// # Errors
    /// Returns an error if the row or its signature blob is invalid.
    pub fn type_spec(&self, rid: u32) -> Result<SigType> {
        self.type_spec_with_depth(rid, 0)
    }

    fn type_spec_with_depth(&self, rid: u32, depth: usize) -> Result<SigType> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let Some(table) = self.image.tables().table::<TypeSpecRaw>() else {
            return Err(malformed_error!("TypeSpec {} referenced without a TypeSpec table", rid));
        };
        let row = table.get(rid)?;
        let blob = self.image.blobs().get(row.signature as usize)?;
        let spec = parse_type_spec_signature(blob)?;

        self.sig_type_with_depth(&spec.base, depth + 1)
    }

    /// Decode a TypeDefOrRef(OrSpec) coded index
    ///
    /// # Errors
    /// Returns an error if the index points at a row that cannot be decoded.
    pub fn type_handle(&self, index: &CodedIndex) -> Result<SigType> {
        self.token_type(index.token, 0)
    }

    fn token_type(&self, token: Token, depth: usize) -> Result<SigType> {
        match token.table() {
            0x01 => Ok(SigType::Named(self.type_ref_with_depth(token.row(), depth)?)),
            0x02 => Ok(SigType::Named(self.type_def_with_depth(token.row(), depth)?)),
            0x1B => self.type_spec_with_depth(token.row(), depth),
            table => Err(malformed_error!(
                "Token {:?} of table 0x{:02x} does not name a type",
                token,
                table
            )),
        }
    }

    /// Convert a decoded signature type
    ///
    /// # Errors
    /// Returns an error if a referenced type cannot be decoded.
    pub fn sig_type(&self, signature: &TypeSignature) -> Result<SigType> {
        self.sig_type_with_depth(signature, 0)
    }

    fn sig_type_with_depth(&self, signature: &TypeSignature, depth: usize) -> Result<SigType> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let boxed = |inner: &TypeSignature| -> Result<Box<SigType>> {
            Ok(Box::new(self.sig_type_with_depth(inner, depth + 1)?))
        };

        Ok(match signature {
            TypeSignature::Void => SigType::Primitive(Primitive::Void),
            TypeSignature::Boolean => SigType::Primitive(Primitive::Boolean),
            TypeSignature::Char => SigType::Primitive(Primitive::Char),
            TypeSignature::I1 => SigType::Primitive(Primitive::SByte),
            TypeSignature::U1 => SigType::Primitive(Primitive::Byte),
            TypeSignature::I2 => SigType::Primitive(Primitive::Int16),
            TypeSignature::U2 => SigType::Primitive(Primitive::UInt16),
            TypeSignature::I4 => SigType::Primitive(Primitive::Int32),
            TypeSignature::U4 => SigType::Primitive(Primitive::UInt32),
            TypeSignature::I8 => SigType::Primitive(Primitive::Int64),
            TypeSignature::U8 => SigType::Primitive(Primitive::UInt64),
            TypeSignature::R4 => SigType::Primitive(Primitive::Single),
            TypeSignature::R8 => SigType::Primitive(Primitive::Double),
            TypeSignature::String => SigType::Primitive(Primitive::String),
            TypeSignature::Object => SigType::Primitive(Primitive::Object),
            TypeSignature::TypedByRef => SigType::Primitive(Primitive::TypedReference),
            TypeSignature::I => SigType::Primitive(Primitive::IntPtr),
            TypeSignature::U => SigType::Primitive(Primitive::UIntPtr),
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
                self.token_type(*token, depth + 1)?
            }
            TypeSignature::Ptr(inner) => SigType::Pointer(boxed(inner)?),
            TypeSignature::ByRef(inner) => SigType::ByRef(boxed(inner)?),
            TypeSignature::SzArray(inner) => SigType::SzArray(boxed(inner)?),
            TypeSignature::Array { base, rank } => SigType::Array {
                element: boxed(base)?,
                rank: *rank,
            },
            TypeSignature::GenericParamType(index) => SigType::TypeParam(*index),
            TypeSignature::GenericParamMethod(index) => SigType::MethodParam(*index),
            TypeSignature::GenericInst(base, args) => SigType::Generic {
                base: boxed(base)?,
                args: args
                    .iter()
                    .map(|arg| self.sig_type_with_depth(arg, depth + 1))
                    .collect::<Result<Vec<_>>>()?,
            },
            TypeSignature::FnPtr(_) => SigType::FnPtr,
            TypeSignature::Modified {
                required,
                modifier,
                base,
            } => SigType::Modified {
                base: boxed(base)?,
                modifier: Box::new(self.token_type(*modifier, depth + 1)?),
                required: *required,
            },
        })
    }

    /// Map every `MethodDef` row to the `TypeDef` row that declares it, index 0 is unused
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` or `MethodPtr` table cannot be read.
    pub fn method_owners(&self) -> Result<Vec<u32>> {
        let tables = self.image.tables();
        let method_count = tables.table_row_count(TableId::MethodDef);
        let mut owners = vec![0; method_count as usize + 1];

        let pointers = match tables.table::<MethodPtrRaw>() {
            Some(table) => Some(
                table
                    .iter()
                    .map(|row| row.map(|row| row.method))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        let list_len = pointers
            .as_ref()
            .map_or(method_count, |pointers| pointers.len() as u32);

        let Some(typedefs) = tables.table::<TypeDefRaw>() else {
            return Ok(owners);
        };
        let starts = typedefs
            .iter()
            .map(|row| row.map(|row| row.method_list))
            .collect::<Result<Vec<_>>>()?;

        for (index, start) in starts.iter().enumerate() {
            let end = starts
                .get(index + 1)
                .copied()
                .unwrap_or(list_len + 1)
                .min(list_len + 1);

            for position in (*start).max(1)..end {
                let method = match &pointers {
                    Some(pointers) => pointers.get(position as usize - 1).copied().unwrap_or(0),
                    None => position,
                };
                if let Some(owner) = owners.get_mut(method as usize) {
                    *owner = index as u32 + 1;
                }
            }
        }

        Ok(owners)
    }

    /// Number of fields declared by the `TypeDef` row `rid`
    ///
    /// # Errors
    /// Returns an error if the `TypeDef` table cannot be read.
    pub fn field_count(&self, rid: u32) -> Result<u32> {
        let tables = self.image.tables();
        let Some(typedefs) = tables.table::<TypeDefRaw>() else {
            return Ok(0);
        };

        let list_len = match tables.table::<FieldPtrRaw>() {
            Some(pointers) => pointers.row_count(),
            None => tables.table_row_count(TableId::Field),
        };

        let start = typedefs.get(rid)?.field_list;
        let end = if rid < typedefs.row_count() {
            typedefs.get(rid + 1)?.field_list
        } else {
            list_len + 1
        };

        Ok(end.min(list_len + 1).saturating_sub(start))
    }

    /// Format a method definition as `{type}.{name}({params}) Returns {ret} `
    ///
    /// # Errors
    /// Returns an error if the declaring type or the signature cannot be decoded.
    pub fn method_definition(&self, method: &MethodDefRaw, owner: u32) -> Result<String> {
        let declaring = if owner == 0 {
            "<Unknown>".to_string()
        } else {
            self.type_def(owner)?.to_string()
        };

        let blob = self.image.blobs().get(method.signature as usize)?;
        let signature = parse_method_signature(blob)?;
        let params = signature
            .params
            .iter()
            .map(|param| self.sig_type(param))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "{}.{}({}) Returns {} ",
            declaring,
            self.string(method.name)?,
            join(&params),
            self.sig_type(&signature.return_type)?
        ))
    }
}
