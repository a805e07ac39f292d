//! Metadata tables of the `#~` stream (ECMA-335 II.22).
//!
//! The tables stream stores fixed-size rows whose column widths depend on the row counts of other
//! tables and on the heap size flags. [`TableInfo`] captures that layout, [`TableId::columns`]
//! describes the schema of every table of the base standard, and [`MetadataTable`] gives typed
//! access to the rows of a single table.
//!
//! Only the tables the sandbox inspects have typed row structures. The schema of all other tables
//! is still known so their offsets inside the stream can be computed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::metadata::{image::BinaryImage, tables::TypeRefRaw};
//! use std::path::Path;
//!
//! let image = BinaryImage::from_file(Path::new("Content.Client.dll"))?;
//! if let Some(typerefs) = image.tables().table::<TypeRefRaw>() {
//!     for row in typerefs.iter() {
//!         let row = row?;
//!         println!("{} -> {:?}", row.token, row.resolution_scope.tag);
//!     }
//! }
//! # Ok::<(), dotsandbox::Error>(())
//! ```

mod assembly;
mod assemblyref;
mod codedindex;
mod interfaceimpl;
mod memberref;
mod methoddef;
mod module;
mod nestedclass;
mod pointers;
mod tableid;
mod tableinfo;
mod typedef;
mod typeref;
mod typespec;

use std::marker::PhantomData;

use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

use crate::Result;

pub use assembly::AssemblyRaw;
pub use assemblyref::AssemblyRefRaw;
pub use codedindex::{CodedIndex, CodedIndexType};
pub use interfaceimpl::InterfaceImplRaw;
pub use memberref::MemberRefRaw;
pub use methoddef::{MethodDefRaw, MethodImplCodeType, MethodImplManagement, MethodModifiers};
pub use module::ModuleRaw;
pub use nestedclass::NestedClassRaw;
pub use pointers::{FieldPtrRaw, MethodPtrRaw};
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};
pub use typedef::{TypeAttributes, TypeDefRaw};
pub use typeref::TypeRefRaw;
pub use typespec::TypeSpecRaw;

/// A typed row of a metadata table
pub trait RowReadable: Sized + Send {
    /// The table this row belongs to
    const TABLE: TableId;

    /// Size of a row in bytes for the given layout
    fn row_size(sizes: &TableInfoRef) -> u32 {
        Self::TABLE.row_size(sizes)
    }

    /// Read a single row
    ///
    /// ## Arguments
    /// * 'data'    - The data of the whole table
    /// * 'offset'  - Offset of the row, advanced past it on success
    /// * 'rid'     - The 1-based row id
    /// * 'sizes'   - The index widths of this image
    ///
    /// # Errors
    /// Returns an error if the row is truncated or contains an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

/// Typed access to the rows of a single metadata table
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: TableInfoRef,
    _phantom: PhantomData<fn() -> T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a table view over `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short for `row_count` rows.
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Result<Self> {
        let row_size = T::row_size(&sizes);
        let Some(size) = (row_count as usize).checked_mul(row_size as usize) else {
            return Err(out_of_bounds_error!());
        };
        if size > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(MetadataTable {
            data: &data[..size],
            row_count,
            row_size,
            sizes,
            _phantom: PhantomData,
        })
    }

    /// Total size of this table in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Size of a single row in bytes
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Read the row with the 1-based id `rid`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for a rid outside of the table, or the error of the
    /// row reader.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(out_of_bounds_error!());
        }

        T::row_read(
            self.data,
            &mut ((rid as usize - 1) * self.row_size as usize),
            rid,
            &self.sizes,
        )
    }

    /// Iterate over all rows in order
    ///
    /// A row that fails to decode is yielded as an error, iteration continues with the next row.
    #[must_use]
    pub fn iter(&self) -> TableIterator<'_, 'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
        }
    }

    /// Read every row in parallel, preserving the row order in indexed collections
    pub fn par_iter(&self) -> impl IndexedParallelIterator<Item = Result<T>> + 'a
    where
        T: 'a,
    {
        let table = self.clone();
        (0..self.row_count)
            .into_par_iter()
            .map(move |index| table.get(index + 1))
    }
}

impl<T> Clone for MetadataTable<'_, T> {
    fn clone(&self) -> Self {
        MetadataTable {
            data: self.data,
            row_count: self.row_count,
            row_size: self.row_size,
            sizes: self.sizes.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<'t, 'a, T: RowReadable> IntoIterator for &'t MetadataTable<'a, T> {
    type Item = Result<T>;
    type IntoIter = TableIterator<'t, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sequential iterator over the rows of a [`MetadataTable`]
pub struct TableIterator<'t, 'a, T> {
    table: &'t MetadataTable<'a, T>,
    current_row: u32,
}

impl<T: RowReadable> Iterator for TableIterator<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        self.current_row += 1;
        Some(self.table.get(self.current_row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.table.row_count - self.current_row) as usize;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rayon::iter::ParallelIterator;

    use super::*;

    #[test]
    fn iterate_and_index() {
        #[rustfmt::skip]
        let data = [
            0x01, 0x00, // field
            0x05, 0x00, // field
            0x09, 0x00, // field
        ];
        let sizes = Arc::new(TableInfo::new_test(&[(TableId::FieldPtr, 3)], false, false, false));
        let table = MetadataTable::<FieldPtrRaw>::new(&data, 3, sizes).unwrap();

        assert_eq!(table.row_size(), 2);
        assert_eq!(table.size(), 6);

        let fields = table.iter().map(|row| row.unwrap().field).collect::<Vec<_>>();
        assert_eq!(fields, vec![1, 5, 9]);

        let parallel = table
            .par_iter()
            .map(|row| row.unwrap().rid)
            .collect::<Vec<_>>();
        assert_eq!(parallel, vec![1, 2, 3]);

        assert_eq!(table.get(2).unwrap().field, 5);
        assert!(table.get(0).is_err());
        assert!(table.get(4).is_err());
    }

    #[test]
    fn truncated_table() {
        let data = [0x01, 0x00, 0x05];
        let sizes = Arc::new(TableInfo::new_test(&[(TableId::FieldPtr, 2)], false, false, false));

        assert!(MetadataTable::<FieldPtrRaw>::new(&data, 2, sizes).is_err());
    }
}
