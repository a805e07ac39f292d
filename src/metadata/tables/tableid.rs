use strum::{Display, EnumCount, EnumIter};

use crate::metadata::tables::{CodedIndexType, TableInfo};

/// Identifiers of the metadata tables defined by ECMA-335 II.22
///
/// The discriminant is the table number used in tokens and in the `valid` bit vector of the
/// tables header. Only the tables of the base standard are known; a bit set beyond
/// [`TableId::GenericParamConstraint`] is rejected as malformed metadata.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumCount)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

/// A single column of a metadata table row
#[derive(Clone, Copy, Debug)]
pub enum Column {
    /// A constant of the given width in bytes
    Fixed(u8),
    /// Index into the `#Strings` heap
    Str,
    /// Index into the `#GUID` heap
    Guid,
    /// Index into the `#Blob` heap
    Blob,
    /// Simple index into another table
    Table(TableId),
    /// Coded index into one of several tables
    Coded(CodedIndexType),
}

impl Column {
    /// Width of this column in bytes for the given header
    #[must_use]
    pub fn width(&self, info: &TableInfo) -> u32 {
        let large = match self {
            Column::Fixed(width) => return u32::from(*width),
            Column::Str => info.is_large_str(),
            Column::Guid => info.is_large_guid(),
            Column::Blob => info.is_large_blob(),
            Column::Table(table) => info.is_large(*table),
            Column::Coded(coded) => info.is_large_coded(*coded),
        };

        if large {
            4
        } else {
            2
        }
    }
}

impl TableId {
    /// The token prefix of rows in this table, e.g. `0x0100_0000` for TypeRef
    #[must_use]
    pub fn token_base(self) -> u32 {
        (self as u32) << 24
    }

    /// Map a table number to its identifier
    #[must_use]
    pub fn from_number(number: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|table| *table as u8 == number)
    }

    /// Column layout of a row (ECMA-335 II.22.2 - II.22.39)
    #[must_use]
    #[rustfmt::skip]
    pub fn columns(self) -> &'static [Column] {
        use CodedIndexType as C;
        use Column::{Blob, Coded, Fixed, Guid, Str, Table};

        match self {
            TableId::Module                 => &[Fixed(2), Str, Guid, Guid, Guid],
            TableId::TypeRef                => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef                => &[Fixed(4), Str, Str, Coded(C::TypeDefOrRef), Table(TableId::Field), Table(TableId::MethodDef)],
            TableId::FieldPtr               => &[Table(TableId::Field)],
            TableId::Field                  => &[Fixed(2), Str, Blob],
            TableId::MethodPtr              => &[Table(TableId::MethodDef)],
            TableId::MethodDef              => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr               => &[Table(TableId::Param)],
            TableId::Param                  => &[Fixed(2), Fixed(2), Str],
            TableId::InterfaceImpl          => &[Table(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef              => &[Coded(C::MemberRefParent), Str, Blob],
            TableId::Constant               => &[Fixed(2), Coded(C::HasConstant), Blob],
            TableId::CustomAttribute        => &[Coded(C::HasCustomAttribute), Coded(C::CustomAttributeType), Blob],
            TableId::FieldMarshal           => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity           => &[Fixed(2), Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout            => &[Fixed(2), Fixed(4), Table(TableId::TypeDef)],
            TableId::FieldLayout            => &[Fixed(4), Table(TableId::Field)],
            TableId::StandAloneSig          => &[Blob],
            TableId::EventMap               => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr               => &[Table(TableId::Event)],
            TableId::Event                  => &[Fixed(2), Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap            => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr            => &[Table(TableId::Property)],
            TableId::Property               => &[Fixed(2), Str, Blob],
            TableId::MethodSemantics        => &[Fixed(2), Table(TableId::MethodDef), Coded(C::HasSemantics)],
            TableId::MethodImpl             => &[Table(TableId::TypeDef), Coded(C::MethodDefOrRef), Coded(C::MethodDefOrRef)],
            TableId::ModuleRef              => &[Str],
            TableId::TypeSpec               => &[Blob],
            TableId::ImplMap                => &[Fixed(2), Coded(C::MemberForwarded), Str, Table(TableId::ModuleRef)],
            TableId::FieldRVA               => &[Fixed(4), Table(TableId::Field)],
            TableId::EncLog                 => &[Fixed(4), Fixed(4)],
            TableId::EncMap                 => &[Fixed(4)],
            TableId::Assembly               => &[Fixed(4), Fixed(2), Fixed(2), Fixed(2), Fixed(2), Fixed(4), Blob, Str, Str],
            TableId::AssemblyProcessor      => &[Fixed(4)],
            TableId::AssemblyOS             => &[Fixed(4), Fixed(4), Fixed(4)],
            TableId::AssemblyRef            => &[Fixed(2), Fixed(2), Fixed(2), Fixed(2), Fixed(4), Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor   => &[Fixed(4), Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS          => &[Fixed(4), Fixed(4), Fixed(4), Table(TableId::AssemblyRef)],
            TableId::File                   => &[Fixed(4), Str, Blob],
            TableId::ExportedType           => &[Fixed(4), Fixed(4), Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource       => &[Fixed(4), Fixed(4), Str, Coded(C::Implementation)],
            TableId::NestedClass            => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam           => &[Fixed(2), Fixed(2), Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec             => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => &[Table(TableId::GenericParam), Coded(C::TypeDefOrRef)],
        }
    }

    /// Size of one row of this table in bytes
    #[must_use]
    pub fn row_size(self, info: &TableInfo) -> u32 {
        self.columns().iter().map(|column| column.width(info)).sum()
    }
}
