//! In-memory construction of minimal managed assemblies for tests.
//!
//! [`AssemblyBuilder`] writes a PE32 image with a single `.text` section that holds the CLI header
//! and the metadata. Only the tables the sandbox reads are emitted, and every heap and table index
//! is two bytes wide, so builders must stay well below 2048 rows per table.

use std::collections::HashMap;

/// Flags of `TypeDef` rows used by tests
pub mod type_flags {
    /// `Public | AutoLayout | Class`
    pub const PUBLIC_CLASS: u32 = 0x0010_0001;
    /// `Public | SequentialLayout | Sealed`
    pub const PUBLIC_STRUCT: u32 = 0x0010_0109;
    /// `Public | ExplicitLayout | Sealed`
    pub const EXPLICIT_STRUCT: u32 = 0x0010_0111;
    /// `Public | Interface | Abstract`
    pub const PUBLIC_INTERFACE: u32 = 0x0000_00A1;
}

/// A TypeDefOrRef(OrSpec) reference
#[derive(Clone, Copy, Debug)]
pub enum TypeHandle {
    /// Nil reference
    Nil,
    /// Row of the TypeDef table
    Def(u32),
    /// Row of the TypeRef table
    Ref(u32),
    /// Row of the TypeSpec table
    Spec(u32),
}

impl TypeHandle {
    fn coded(self) -> u32 {
        match self {
            TypeHandle::Nil => 0,
            TypeHandle::Def(row) => row << 2,
            TypeHandle::Ref(row) => (row << 2) | 1,
            TypeHandle::Spec(row) => (row << 2) | 2,
        }
    }
}

/// A ResolutionScope reference
#[derive(Clone, Copy, Debug)]
pub enum Scope {
    /// Nil scope, used for exported types
    Nil,
    /// The module itself
    Module,
    /// Row of the ModuleRef table
    ModuleRef(u32),
    /// Row of the AssemblyRef table
    AssemblyRef(u32),
    /// Row of the TypeRef table, for nested types
    TypeRef(u32),
}

impl Scope {
    fn coded(self) -> u32 {
        match self {
            Scope::Nil => 0,
            Scope::Module => 1 << 2,
            Scope::ModuleRef(row) => (row << 2) | 1,
            Scope::AssemblyRef(row) => (row << 2) | 2,
            Scope::TypeRef(row) => (row << 2) | 3,
        }
    }
}

/// A MemberRefParent reference
#[derive(Clone, Copy, Debug)]
pub enum MemberParent {
    /// Row of the TypeDef table
    Def(u32),
    /// Row of the TypeRef table
    Ref(u32),
    /// Row of the ModuleRef table
    ModuleRef(u32),
    /// Row of the MethodDef table
    Method(u32),
    /// Row of the TypeSpec table
    Spec(u32),
}

impl MemberParent {
    fn coded(self) -> u32 {
        match self {
            MemberParent::Def(row) => row << 3,
            MemberParent::Ref(row) => (row << 3) | 1,
            MemberParent::ModuleRef(row) => (row << 3) | 2,
            MemberParent::Method(row) => (row << 3) | 3,
            MemberParent::Spec(row) => (row << 3) | 4,
        }
    }
}

/// Encoders for signature blobs
pub mod sig {
    use super::{compressed_uint, TypeHandle};

    /// `void`
    pub fn void() -> Vec<u8> {
        vec![0x01]
    }

    /// `bool`
    pub fn boolean() -> Vec<u8> {
        vec![0x02]
    }

    /// `int`
    pub fn i4() -> Vec<u8> {
        vec![0x08]
    }

    /// `long`
    pub fn i8() -> Vec<u8> {
        vec![0x0A]
    }

    /// `string`
    pub fn string() -> Vec<u8> {
        vec![0x0E]
    }

    /// `object`
    pub fn object() -> Vec<u8> {
        vec![0x1C]
    }

    /// `nint`
    pub fn native_int() -> Vec<u8> {
        vec![0x18]
    }

    /// A reference type
    pub fn class(handle: TypeHandle) -> Vec<u8> {
        let mut data = vec![0x12];
        data.extend(compressed_uint(handle.coded()));
        data
    }

    /// A value type
    pub fn value_type(handle: TypeHandle) -> Vec<u8> {
        let mut data = vec![0x11];
        data.extend(compressed_uint(handle.coded()));
        data
    }

    /// A generic instantiation of `base`, which must be `class` or `value_type` bytes
    pub fn generic_inst(base: Vec<u8>, args: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0x15];
        data.extend(base);
        data.extend(compressed_uint(args.len() as u32));
        for arg in args {
            data.extend(arg);
        }
        data
    }

    /// `T[]`
    pub fn sz_array(inner: Vec<u8>) -> Vec<u8> {
        let mut data = vec![0x1D];
        data.extend(inner);
        data
    }

    /// `T*`
    pub fn pointer(inner: Vec<u8>) -> Vec<u8> {
        let mut data = vec![0x0F];
        data.extend(inner);
        data
    }

    /// `ref T`
    pub fn by_ref(inner: Vec<u8>) -> Vec<u8> {
        let mut data = vec![0x10];
        data.extend(inner);
        data
    }

    /// `!n`
    pub fn type_var(index: u32) -> Vec<u8> {
        let mut data = vec![0x13];
        data.extend(compressed_uint(index));
        data
    }

    /// `!!n`
    pub fn method_var(index: u32) -> Vec<u8> {
        let mut data = vec![0x1E];
        data.extend(compressed_uint(index));
        data
    }

    /// `inner modreq(modifier)`
    pub fn modreq(modifier: TypeHandle, inner: Vec<u8>) -> Vec<u8> {
        let mut data = vec![0x1F];
        data.extend(compressed_uint(modifier.coded()));
        data.extend(inner);
        data
    }

    /// Method signature with an explicit calling convention byte
    pub fn method_with_convention(
        convention: u8,
        generic_arity: u32,
        ret: Vec<u8>,
        params: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut data = vec![convention];
        if generic_arity > 0 {
            data[0] |= 0x10;
            data.extend(compressed_uint(generic_arity));
        }
        data.extend(compressed_uint(params.len() as u32));
        data.extend(ret);
        for param in params {
            data.extend(param);
        }
        data
    }

    /// Vararg call site: `fixed` parameters, then `extra` after the sentinel
    pub fn vararg_call(ret: Vec<u8>, fixed: &[Vec<u8>], extra: &[Vec<u8>]) -> Vec<u8> {
        let mut params = fixed.to_vec();
        for (index, param) in extra.iter().enumerate() {
            let mut param = param.clone();
            if index == 0 {
                param.insert(0, 0x41);
            }
            params.push(param);
        }
        method_with_convention(0x05, 0, ret, &params)
    }

    /// Static, non-generic method
    pub fn static_method(ret: Vec<u8>, params: &[Vec<u8>]) -> Vec<u8> {
        method_with_convention(0x00, 0, ret, params)
    }

    /// Instance, non-generic method
    pub fn instance_method(ret: Vec<u8>, params: &[Vec<u8>]) -> Vec<u8> {
        method_with_convention(0x20, 0, ret, params)
    }

    /// Field signature
    pub fn field(ty: Vec<u8>) -> Vec<u8> {
        let mut data = vec![0x06];
        data.extend(ty);
        data
    }
}

/// Encode an unsigned integer in the ECMA-335 compressed format
pub fn compressed_uint(value: u32) -> Vec<u8> {
    if value < 0x80 {
        vec![value as u8]
    } else if value < 0x4000 {
        ((value as u16) | 0x8000).to_be_bytes().to_vec()
    } else {
        (value | 0xC000_0000).to_be_bytes().to_vec()
    }
}

struct Heap {
    data: Vec<u8>,
    strings: HashMap<String, u32>,
}

impl Heap {
    fn new() -> Self {
        Heap {
            data: vec![0],
            strings: HashMap::new(),
        }
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(index) = self.strings.get(value) {
            return *index;
        }

        let index = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.strings.insert(value.to_string(), index);
        index
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        if value.is_empty() {
            return 0;
        }

        let index = self.data.len() as u32;
        self.data.extend(compressed_uint(value.len() as u32));
        self.data.extend_from_slice(value);
        index
    }

    fn aligned(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        while data.len() % 4 != 0 {
            data.push(0);
        }
        data
    }
}

struct TypeDefRow {
    flags: u32,
    name: u32,
    namespace: u32,
    extends: u32,
    field_list: u32,
    method_list: u32,
}

/// Writer of minimal managed assemblies
pub struct AssemblyBuilder {
    strings: Heap,
    blobs: Heap,
    module_name: u32,
    assembly_name: u32,
    assembly_refs: Vec<u32>,
    module_refs: Vec<u32>,
    type_refs: Vec<[u32; 3]>,
    type_defs: Vec<TypeDefRow>,
    fields: Vec<[u32; 3]>,
    methods: Vec<[u32; 4]>,
    interface_impls: Vec<[u32; 2]>,
    member_refs: Vec<[u32; 3]>,
    type_specs: Vec<u32>,
    nested_classes: Vec<[u32; 2]>,
    native_code: bool,
}

impl AssemblyBuilder {
    /// Start an assembly named `name` with the implicit `<Module>` type
    pub fn new(name: &str) -> Self {
        let mut strings = Heap::new();
        let module_name = strings.string(&format!("{name}.dll"));
        let assembly_name = strings.string(name);
        let module_type = strings.string("<Module>");

        AssemblyBuilder {
            strings,
            blobs: Heap::new(),
            module_name,
            assembly_name,
            assembly_refs: Vec::new(),
            module_refs: Vec::new(),
            type_refs: Vec::new(),
            type_defs: vec![TypeDefRow {
                flags: 0,
                name: module_type,
                namespace: 0,
                extends: 0,
                field_list: 1,
                method_list: 1,
            }],
            fields: Vec::new(),
            methods: Vec::new(),
            interface_impls: Vec::new(),
            member_refs: Vec::new(),
            type_specs: Vec::new(),
            nested_classes: Vec::new(),
            native_code: false,
        }
    }

    /// Declare a precompiled native code directory in the CLI header
    pub fn with_native_code(mut self) -> Self {
        self.native_code = true;
        self
    }

    /// Add an `AssemblyRef`, returns its row
    pub fn assembly_ref(&mut self, name: &str) -> u32 {
        let name = self.strings.string(name);
        self.assembly_refs.push(name);
        self.assembly_refs.len() as u32
    }

    /// Add a `ModuleRef`, returns its row
    pub fn module_ref(&mut self, name: &str) -> u32 {
        let name = self.strings.string(name);
        self.module_refs.push(name);
        self.module_refs.len() as u32
    }

    /// Add a `TypeRef`, returns its row
    pub fn type_ref(&mut self, scope: Scope, namespace: &str, name: &str) -> u32 {
        let name = self.strings.string(name);
        let namespace = self.strings.string(namespace);
        self.type_refs.push([scope.coded(), name, namespace]);
        self.type_refs.len() as u32
    }

    /// Add a `TypeRef` resolved by the `AssemblyRef` row `assembly`
    pub fn type_ref_in_assembly(&mut self, assembly: u32, namespace: &str, name: &str) -> u32 {
        self.type_ref(Scope::AssemblyRef(assembly), namespace, name)
    }

    /// Add a `TypeDef`, returns its row
    ///
    /// Fields and methods added afterwards belong to this type until the next type is added.
    pub fn type_def(&mut self, namespace: &str, name: &str, flags: u32, extends: TypeHandle) -> u32 {
        let row = TypeDefRow {
            flags,
            name: self.strings.string(name),
            namespace: self.strings.string(namespace),
            extends: extends.coded(),
            field_list: self.fields.len() as u32 + 1,
            method_list: self.methods.len() as u32 + 1,
        };
        self.type_defs.push(row);
        self.type_defs.len() as u32
    }

    /// Add a field to the last type, returns its row
    pub fn field(&mut self, name: &str, flags: u16, signature: &[u8]) -> u32 {
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.fields.push([u32::from(flags), name, signature]);
        self.fields.len() as u32
    }

    /// Add a method to the last type, returns its row
    pub fn method_def(&mut self, name: &str, impl_flags: u16, flags: u16, signature: &[u8]) -> u32 {
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.methods
            .push([u32::from(impl_flags), u32::from(flags), name, signature]);
        self.methods.len() as u32
    }

    /// Declare that the TypeDef row `class` implements `interface`
    pub fn interface_impl(&mut self, class: u32, interface: TypeHandle) {
        self.interface_impls.push([class, interface.coded()]);
    }

    /// Declare the TypeDef row `nested` as nested inside `enclosing`
    pub fn nested_class(&mut self, nested: u32, enclosing: u32) {
        self.nested_classes.push([nested, enclosing]);
    }

    /// Add a `TypeSpec`, returns its row
    pub fn type_spec(&mut self, signature: &[u8]) -> u32 {
        let signature = self.blobs.blob(signature);
        self.type_specs.push(signature);
        self.type_specs.len() as u32
    }

    /// Add a `MemberRef`, returns its row
    pub fn member_ref(&mut self, parent: MemberParent, name: &str, signature: &[u8]) -> u32 {
        let name = self.strings.string(name);
        let signature = self.blobs.blob(signature);
        self.member_refs.push([parent.coded(), name, signature]);
        self.member_refs.len() as u32
    }

    fn tables_stream(&self) -> Vec<u8> {
        let mut tables: Vec<(u8, u32, Vec<u8>)> = Vec::new();
        let mut add = |id: u8, rows: usize, data: Vec<u8>| {
            if rows > 0 {
                tables.push((id, rows as u32, data));
            }
        };

        let mut module = Vec::new();
        put16(&mut module, 0);
        put16(&mut module, self.module_name);
        put16(&mut module, 0);
        put16(&mut module, 0);
        put16(&mut module, 0);
        add(0x00, 1, module);

        let mut type_refs = Vec::new();
        for row in &self.type_refs {
            row.iter().for_each(|value| put16(&mut type_refs, *value));
        }
        add(0x01, self.type_refs.len(), type_refs);

        let mut type_defs = Vec::new();
        for row in &self.type_defs {
            type_defs.extend_from_slice(&row.flags.to_le_bytes());
            put16(&mut type_defs, row.name);
            put16(&mut type_defs, row.namespace);
            put16(&mut type_defs, row.extends);
            put16(&mut type_defs, row.field_list);
            put16(&mut type_defs, row.method_list);
        }
        add(0x02, self.type_defs.len(), type_defs);

        let mut fields = Vec::new();
        for row in &self.fields {
            row.iter().for_each(|value| put16(&mut fields, *value));
        }
        add(0x04, self.fields.len(), fields);

        let mut methods = Vec::new();
        for row in &self.methods {
            methods.extend_from_slice(&0_u32.to_le_bytes());
            row.iter().for_each(|value| put16(&mut methods, *value));
            put16(&mut methods, 1);
        }
        add(0x06, self.methods.len(), methods);

        let mut interface_impls = Vec::new();
        for row in &self.interface_impls {
            row.iter().for_each(|value| put16(&mut interface_impls, *value));
        }
        add(0x09, self.interface_impls.len(), interface_impls);

        let mut member_refs = Vec::new();
        for row in &self.member_refs {
            row.iter().for_each(|value| put16(&mut member_refs, *value));
        }
        add(0x0A, self.member_refs.len(), member_refs);

        let mut module_refs = Vec::new();
        for name in &self.module_refs {
            put16(&mut module_refs, *name);
        }
        add(0x1A, self.module_refs.len(), module_refs);

        let mut type_specs = Vec::new();
        for signature in &self.type_specs {
            put16(&mut type_specs, *signature);
        }
        add(0x1B, self.type_specs.len(), type_specs);

        let mut assembly = Vec::new();
        assembly.extend_from_slice(&0x8004_u32.to_le_bytes());
        for version in [1, 0, 0, 0] {
            put16(&mut assembly, version);
        }
        assembly.extend_from_slice(&0_u32.to_le_bytes());
        put16(&mut assembly, 0);
        put16(&mut assembly, self.assembly_name);
        put16(&mut assembly, 0);
        add(0x20, 1, assembly);

        let mut assembly_refs = Vec::new();
        for name in &self.assembly_refs {
            for version in [8, 0, 0, 0] {
                put16(&mut assembly_refs, version);
            }
            assembly_refs.extend_from_slice(&0_u32.to_le_bytes());
            put16(&mut assembly_refs, 0);
            put16(&mut assembly_refs, *name);
            put16(&mut assembly_refs, 0);
            put16(&mut assembly_refs, 0);
        }
        add(0x23, self.assembly_refs.len(), assembly_refs);

        let mut nested_classes = Vec::new();
        for row in &self.nested_classes {
            row.iter().for_each(|value| put16(&mut nested_classes, *value));
        }
        add(0x29, self.nested_classes.len(), nested_classes);

        let valid = tables
            .iter()
            .fold(0_u64, |valid, (id, _, _)| valid | (1 << id));

        let mut stream = Vec::new();
        stream.extend_from_slice(&0_u32.to_le_bytes());
        stream.extend_from_slice(&[2, 0, 0, 1]);
        stream.extend_from_slice(&valid.to_le_bytes());
        stream.extend_from_slice(&0_u64.to_le_bytes());
        for (_, rows, _) in &tables {
            stream.extend_from_slice(&rows.to_le_bytes());
        }
        for (_, _, data) in &tables {
            stream.extend_from_slice(data);
        }
        while stream.len() % 4 != 0 {
            stream.push(0);
        }
        stream
    }

    fn metadata(&self) -> Vec<u8> {
        let tables = self.tables_stream();
        let strings = self.strings.aligned();
        let blobs = self.blobs.aligned();

        let streams: [(&[u8], &Vec<u8>); 3] = [
            (&b"#~\0\0"[..], &tables),
            (&b"#Strings\0\0\0\0"[..], &strings),
            (&b"#Blob\0\0\0"[..], &blobs),
        ];

        let header_size = 32 + streams.iter().map(|(name, _)| 8 + name.len()).sum::<usize>();

        let mut metadata = Vec::new();
        metadata.extend_from_slice(&0x424A_5342_u32.to_le_bytes());
        put16(&mut metadata, 1);
        put16(&mut metadata, 1);
        metadata.extend_from_slice(&0_u32.to_le_bytes());
        metadata.extend_from_slice(&12_u32.to_le_bytes());
        metadata.extend_from_slice(b"v4.0.30319\0\0");
        put16(&mut metadata, 0);
        put16(&mut metadata, streams.len() as u32);

        let mut offset = header_size;
        for (name, data) in &streams {
            metadata.extend_from_slice(&(offset as u32).to_le_bytes());
            metadata.extend_from_slice(&(data.len() as u32).to_le_bytes());
            metadata.extend_from_slice(name);
            offset += data.len();
        }
        for (_, data) in &streams {
            metadata.extend_from_slice(data);
        }
        metadata
    }

    /// Write the PE image
    pub fn build(&self) -> Vec<u8> {
        const SECTION_RVA: u32 = 0x2000;
        const SECTION_OFFSET: usize = 0x200;
        const CLI_HEADER_SIZE: u32 = 72;

        let metadata = self.metadata();

        let mut section = Vec::new();
        section.extend_from_slice(&CLI_HEADER_SIZE.to_le_bytes());
        put16(&mut section, 2);
        put16(&mut section, 5);
        section.extend_from_slice(&(SECTION_RVA + CLI_HEADER_SIZE).to_le_bytes());
        section.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        section.extend_from_slice(&1_u32.to_le_bytes());
        section.extend_from_slice(&[0; 44]);
        if self.native_code {
            section.extend_from_slice(&SECTION_RVA.to_le_bytes());
            section.extend_from_slice(&0x10_u32.to_le_bytes());
        } else {
            section.extend_from_slice(&[0; 8]);
        }
        section.extend_from_slice(&metadata);
        let section_size = section.len() as u32;

        let mut image = vec![0_u8; SECTION_OFFSET];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

        let mut headers = Vec::new();
        headers.extend_from_slice(b"PE\0\0");

        // COFF header
        put16(&mut headers, 0x014C);
        put16(&mut headers, 1);
        headers.extend_from_slice(&[0; 12]);
        put16(&mut headers, 0xE0);
        put16(&mut headers, 0x2102);

        // Optional header, standard fields
        put16(&mut headers, 0x010B);
        headers.extend_from_slice(&[8, 0]);
        headers.extend_from_slice(&section_size.to_le_bytes());
        headers.extend_from_slice(&[0; 8]);
        headers.extend_from_slice(&0_u32.to_le_bytes());
        headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
        headers.extend_from_slice(&0_u32.to_le_bytes());

        // Optional header, windows fields
        headers.extend_from_slice(&0x1000_0000_u32.to_le_bytes());
        headers.extend_from_slice(&0x2000_u32.to_le_bytes());
        headers.extend_from_slice(&0x200_u32.to_le_bytes());
        for version in [4, 0, 0, 0, 4, 0] {
            put16(&mut headers, version);
        }
        headers.extend_from_slice(&0_u32.to_le_bytes());
        let size_of_image = SECTION_RVA + ((section_size + 0x1FFF) & !0x1FFF);
        headers.extend_from_slice(&size_of_image.to_le_bytes());
        headers.extend_from_slice(&(SECTION_OFFSET as u32).to_le_bytes());
        headers.extend_from_slice(&0_u32.to_le_bytes());
        put16(&mut headers, 3);
        put16(&mut headers, 0x8540);
        for size in [0x10_0000_u32, 0x1000, 0x10_0000, 0x1000, 0, 16] {
            headers.extend_from_slice(&size.to_le_bytes());
        }

        // Data directories, only the CLI header is present
        for index in 0..16 {
            if index == 14 {
                headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
                headers.extend_from_slice(&CLI_HEADER_SIZE.to_le_bytes());
            } else {
                headers.extend_from_slice(&[0; 8]);
            }
        }

        // Section table
        headers.extend_from_slice(b".text\0\0\0");
        headers.extend_from_slice(&section_size.to_le_bytes());
        headers.extend_from_slice(&SECTION_RVA.to_le_bytes());
        headers.extend_from_slice(&section_size.to_le_bytes());
        headers.extend_from_slice(&(SECTION_OFFSET as u32).to_le_bytes());
        headers.extend_from_slice(&[0; 12]);
        headers.extend_from_slice(&0x6000_0020_u32.to_le_bytes());

        image[0x80..0x80 + headers.len()].copy_from_slice(&headers);
        image.extend_from_slice(&section);
        image
    }
}

fn put16(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&(value as u16).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed() {
        assert_eq!(compressed_uint(0x03), vec![0x03]);
        assert_eq!(compressed_uint(0x80), vec![0x80, 0x80]);
        assert_eq!(compressed_uint(0x2E57), vec![0xAE, 0x57]);
        assert_eq!(compressed_uint(0x4000), vec![0xC0, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn headers_fit() {
        let image = AssemblyBuilder::new("Sized").build();

        assert_eq!(&image[0..2], b"MZ");
        assert_eq!(&image[0x80..0x84], b"PE\0\0");
        assert_eq!(&image[0x200..0x204], &[72, 0, 0, 0]);
    }
}
