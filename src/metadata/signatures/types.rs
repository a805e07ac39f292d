use crate::metadata::token::Token;

#[allow(non_snake_case, dead_code, missing_docs)]
/// Bytes that introduce the types of a signature (ECMA-335 II.23.1.16)
pub mod ELEMENT_TYPE {
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const PTR: u8 = 0x0f;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    // Generic parameter in a generic type definition, represented as number
    pub const VAR: u8 = 0x13;
    // type rank boundsCount bound1 ... loCount lo1 ...
    pub const ARRAY: u8 = 0x14;
    // Generic type instantiation. Followed by type type-arg-count type-1 ... type-n
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    // Followed by full method signature
    pub const FNPTR: u8 = 0x1b;
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
    // Generic parameter in a generic method definition, represented as number
    pub const MVAR: u8 = 0x1e;
    // Required modifier, followed by a TypeDef or TypeRef token
    pub const CMOD_REQD: u8 = 0x1f;
    // Optional modifier, followed by a TypeDef or TypeRef token
    pub const CMOD_OPT: u8 = 0x20;
    pub const INTERNAL: u8 = 0x21;
    pub const MODIFIER: u8 = 0x40;
    // Sentinel for vararg method signature
    pub const SENTINEL: u8 = 0x41;
    // Denotes a local variable that points at a pinned object
    pub const PINNED: u8 = 0x45;
}

/// Calling convention byte of a method signature
#[allow(non_snake_case, dead_code, missing_docs)]
pub mod CALLING_CONVENTION {
    pub const DEFAULT: u8 = 0x00;
    pub const VARARG: u8 = 0x05;
    pub const FIELD: u8 = 0x06;
    pub const GENERIC: u8 = 0x10;
    pub const HASTHIS: u8 = 0x20;
    pub const EXPLICITTHIS: u8 = 0x40;
    // Lower nibble selects the convention
    pub const MASK: u8 = 0x0F;
}

/// A decoded type inside a signature blob
///
/// Type handles are kept as raw [`Token`]s into the TypeDef, TypeRef or TypeSpec table. Resolving
/// them to names is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TypeSignature {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Object,
    TypedByRef,
    I,
    U,
    /// Unmanaged pointer to the inner type
    Ptr(Box<TypeSignature>),
    /// Managed reference to the inner type
    ByRef(Box<TypeSignature>),
    /// Value type named by a TypeDefOrRefOrSpecEncoded token
    ValueType(Token),
    /// Reference type named by a TypeDefOrRefOrSpecEncoded token
    Class(Token),
    /// Generic parameter of the enclosing type, `!n`
    GenericParamType(u32),
    /// Generic parameter of the method, `!!n`
    GenericParamMethod(u32),
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSignature>),
    /// General array with `rank` dimensions
    Array {
        base: Box<TypeSignature>,
        rank: u32,
    },
    /// Instantiation of a generic class or value type
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Function pointer
    FnPtr(Box<SignatureMethod>),
    /// A type carrying a `modreq` or `modopt` custom modifier
    Modified {
        required: bool,
        modifier: Token,
        base: Box<TypeSignature>,
    },
}

/// A decoded method signature (ECMA-335 II.23.2.1 - II.23.2.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMethod {
    /// The method has an implicit `this` argument
    pub has_this: bool,
    /// The `this` argument is given explicitly as the first parameter
    pub explicit_this: bool,
    /// Calling convention is `VARARG`
    pub vararg: bool,
    /// Number of generic parameters, 0 for non-generic methods
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeSignature,
    /// Fixed parameters
    pub params: Vec<TypeSignature>,
    /// Arguments after the vararg sentinel, only present on call sites
    pub varargs: Vec<TypeSignature>,
}

/// A decoded field signature (ECMA-335 II.23.2.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureField {
    /// Type of the field, including its custom modifiers
    pub base: TypeSignature,
}

/// A decoded type specification (ECMA-335 II.23.2.14)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTypeSpec {
    /// The specified type
    pub base: TypeSignature,
}

/// Either kind of signature a `MemberRef` can carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRefSignature {
    /// The member is a method
    Method(SignatureMethod),
    /// The member is a field
    Field(SignatureField),
}

impl TypeSignature {
    /// Strip all custom modifiers
    #[must_use]
    pub fn unmodified(&self) -> &TypeSignature {
        let mut current = self;
        while let TypeSignature::Modified { base, .. } = current {
            current = base;
        }
        current
    }
}
