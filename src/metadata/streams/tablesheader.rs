//! Header of the `#~` / `#-` tables stream (ECMA-335 II.24.2.6).
//!
//! The header lists which tables are present and how many rows each has. From that information
//! and the table schema the offset of every table inside the stream is computed up front, so a
//! typed [`MetadataTable`] view can be created for any table on demand.

use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Result,
};

/// Heap size flag: four extra bytes follow the row counts
const HEAP_EXTRA_DATA: u8 = 0x40;

/// The parsed tables stream header
pub struct TablesHeader<'a> {
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfoRef,
    data: &'a [u8],
    /// Start offset of every table inside `data`, indexed by table number
    offsets: Vec<usize>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables header and compute the location of every present table
    ///
    /// ## Arguments
    /// * 'data' - The complete tables stream
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a table extends beyond the stream, or
    /// [`crate::Error::Malformed`] if the header declares unknown tables.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let valid_bitvec = read_le::<u64>(&data[8..])?;
        if valid_bitvec == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let info = Arc::new(TableInfo::new(data, valid_bitvec)?);

        let mut current_offset = 24 + valid_bitvec.count_ones() as usize * 4;
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            current_offset += 4;
        }

        let mut offsets = vec![0; TableId::GenericParamConstraint as usize + 1];
        for table_id in TableId::iter() {
            let rows = info.rows(table_id);
            if rows == 0 {
                continue;
            }

            let size = u64::from(rows) * u64::from(table_id.row_size(&info));
            let Some(end) = (current_offset as u64).checked_add(size) else {
                return Err(out_of_bounds_error!());
            };
            if end > data.len() as u64 {
                return Err(out_of_bounds_error!());
            }

            offsets[table_id as usize] = current_offset;
            current_offset = end as usize;
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid: valid_bitvec,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            data,
            offsets,
        })
    }

    /// Number of tables declared in the header
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns true if `table_id` is present with at least one row
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        self.info.rows(table_id) > 0
    }

    /// Number of rows of `table_id`, 0 if the table is absent
    #[must_use]
    pub fn table_row_count(&self, table_id: TableId) -> u32 {
        self.info.rows(table_id)
    }

    /// Typed view of the table that stores `T` rows, `None` if the table is absent
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'a, T>> {
        let rows = self.info.rows(T::TABLE);
        if rows == 0 {
            return None;
        }

        let data = self.data.get(self.offsets[T::TABLE as usize]..)?;
        MetadataTable::new(data, rows, self.info.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{FieldPtrRaw, ModuleRaw, TypeRefRaw};

    #[rustfmt::skip]
    fn stream(heap_sizes: u8) -> Vec<u8> {
        let valid: u64 = (1 << TableId::Module as u64)
            | (1 << TableId::TypeRef as u64)
            | (1 << TableId::FieldPtr as u64);

        let mut data = vec![
            0x00, 0x00, 0x00, 0x00, // reserved
            0x02, 0x00,             // version
            heap_sizes,
            0x01,                   // reserved
        ];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0_u64.to_le_bytes());
        data.extend_from_slice(&1_u32.to_le_bytes());
        data.extend_from_slice(&2_u32.to_le_bytes());
        data.extend_from_slice(&1_u32.to_le_bytes());
        if heap_sizes & HEAP_EXTRA_DATA != 0 {
            data.extend_from_slice(&[0xAA; 4]);
        }
        data.extend_from_slice(&[
            0x00, 0x00, 0x0A, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, // Module
            0x06, 0x00, 0x20, 0x00, 0x21, 0x00,                         // TypeRef 1
            0x0A, 0x00, 0x22, 0x00, 0x23, 0x00,                         // TypeRef 2
            0x30, 0x00,                                                 // FieldPtr
        ]);
        data
    }

    #[test]
    fn crafted() {
        let data = stream(0);
        let header = TablesHeader::from(&data).unwrap();

        assert_eq!(header.major_version, 2);
        assert_eq!(header.table_count(), 3);
        assert!(header.has_table(TableId::TypeRef));
        assert!(!header.has_table(TableId::TypeDef));
        assert_eq!(header.table_row_count(TableId::TypeRef), 2);

        let module = header.table::<ModuleRaw>().unwrap();
        assert_eq!(module.get(1).unwrap().name, 0x0A);

        let typerefs = header.table::<TypeRefRaw>().unwrap();
        let second = typerefs.get(2).unwrap();
        assert_eq!(second.resolution_scope.tag, TableId::AssemblyRef);
        assert_eq!(second.type_name, 0x22);

        let pointers = header.table::<FieldPtrRaw>().unwrap();
        assert_eq!(pointers.get(1).unwrap().field, 0x30);
    }

    #[test]
    fn extra_data() {
        let data = stream(HEAP_EXTRA_DATA);
        let header = TablesHeader::from(&data).unwrap();

        let pointers = header.table::<FieldPtrRaw>().unwrap();
        assert_eq!(pointers.get(1).unwrap().field, 0x30);
    }

    #[test]
    fn truncated() {
        let mut data = stream(0);
        data.truncate(data.len() - 1);

        assert!(TablesHeader::from(&data).is_err());
    }
}
