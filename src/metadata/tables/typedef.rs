use bitflags::bitflags;

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// Bitmask for the layout bits of [`TypeAttributes`]
pub const TYPE_LAYOUT_MASK: u32 = 0x0000_0018;

bitflags! {
    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    /// Layout flags of a type definition
    pub struct TypeAttributes: u32 {
        /// Fields are laid out automatically
        const AUTO_LAYOUT = 0x0000_0000;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Field offsets are given explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
    }
}

impl TypeAttributes {
    /// Extract the layout from raw type flags
    #[must_use]
    pub fn layout(flags: u32) -> Self {
        Self::from_bits_truncate(flags & TYPE_LAYOUT_MASK)
    }
}

/// A row of the `TypeDef` table (ECMA-335 II.22.37)
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// Row id
    pub rid: u32,
    /// Metadata token of this row
    pub token: Token,
    /// Offset of the row inside the table
    pub offset: usize,
    /// `TypeAttributes` bit mask
    pub flags: u32,
    /// `#Strings` index of the name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// The base type, a TypeDef, TypeRef or TypeSpec
    pub extends: CodedIndex,
    /// First row of the field list of this type
    pub field_list: u32,
    /// First row of the method list of this type
    pub method_list: u32,
}

impl TypeDefRaw {
    /// Returns true if this type uses explicit field offsets
    #[must_use]
    pub fn is_explicit_layout(&self) -> bool {
        TypeAttributes::layout(self.flags) == TypeAttributes::EXPLICIT_LAYOUT
    }
}

impl RowReadable for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token: Token::new(Self::TABLE.token_base() | rid),
            offset: *offset,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
            method_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}
