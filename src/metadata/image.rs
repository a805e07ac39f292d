//! A loaded managed image with its metadata streams.
//!
//! [`BinaryImage`] is the single entry point of the binary layer: it owns the backing [`File`]
//! and exposes the Cor20 header, the `#Strings` and `#Blob` heaps and the tables stream, all
//! borrowing from the same bytes. Everything the sandbox checks is derived from these four parts.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::metadata::image::BinaryImage;
//! use std::path::Path;
//!
//! let image = BinaryImage::from_file(Path::new("Content.Shared.dll"))?;
//! println!("{} (native code: {})", image.name(), image.has_native_code());
//! # Ok::<(), dotsandbox::Error>(())
//! ```

use std::{path::Path, sync::Arc};

use ouroboros::self_referencing;

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        root::Root,
        streams::{Blob, Strings, TablesHeader},
        tables::{AssemblyRaw, ModuleRaw},
    },
    Result,
};

/// The parsed parts of an image, borrowing from its bytes
pub struct ImageData<'a> {
    /// The CLI header
    pub cor20header: Cor20Header,
    /// The metadata root with its stream directory
    pub metadata_root: Root,
    /// The tables stream
    pub tables: TablesHeader<'a>,
    /// The `#Strings` heap
    pub strings: Strings<'a>,
    /// The `#Blob` heap
    pub blobs: Blob<'a>,
    /// Simple name of the assembly, or of the module for images without a manifest
    pub name: String,
}

impl<'a> ImageData<'a> {
    fn from_file(file: &'a File) -> Result<Self> {
        let (clr_rva, clr_size) = file.clr()?;
        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20header = Cor20Header::read(file.data_slice(clr_offset, clr_size)?)?;

        let metadata_offset = file.rva_to_offset(cor20header.meta_data_rva as usize)?;
        let metadata_slice =
            file.data_slice(metadata_offset, cor20header.meta_data_size as usize)?;
        let metadata_root = Root::read(metadata_slice)?;

        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;
        for stream in &metadata_root.stream_headers {
            let start = stream.offset as usize;
            let Some(stream_data) = metadata_slice.get(start..start + stream.size as usize) else {
                return Err(out_of_bounds_error!());
            };

            match stream.name.as_str() {
                "#~" | "#-" => tables = Some(TablesHeader::from(stream_data)?),
                "#Strings" => strings = Some(Strings::from(stream_data)?),
                "#Blob" => blobs = Some(Blob::from(stream_data)?),
                _ => {}
            }
        }

        let Some(tables) = tables else {
            return Err(malformed_error!("Image has no metadata tables stream"));
        };
        let Some(strings) = strings else {
            return Err(malformed_error!("Image has no #Strings heap"));
        };
        let blobs = match blobs {
            Some(blobs) => blobs,
            None => Blob::from(&[0])?,
        };

        let name_index = match tables.table::<AssemblyRaw>() {
            Some(assembly) => assembly.get(1)?.name,
            None => match tables.table::<ModuleRaw>() {
                Some(module) => module.get(1)?.name,
                None => return Err(malformed_error!("Image has neither Assembly nor Module")),
            },
        };
        let name = strings.get(name_index as usize)?.to_string();

        Ok(ImageData {
            cor20header,
            metadata_root,
            tables,
            strings,
            blobs,
            name,
        })
    }
}

/// A managed assembly loaded for inspection
#[self_referencing]
pub struct BinaryImage {
    file: Arc<File>,
    #[borrows(file)]
    #[covariant]
    data: ImageData<'this>,
}

impl BinaryImage {
    /// Memory-map and parse an assembly
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a well-formed managed image.
    pub fn from_file(file: &Path) -> Result<Self> {
        Self::load(Arc::new(File::from_file(file)?))
    }

    /// Parse an assembly held in memory
    ///
    /// # Errors
    /// Returns an error if the buffer is not a well-formed managed image.
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::load(Arc::new(File::from_mem(data)?))
    }

    fn load(file: Arc<File>) -> Result<Self> {
        BinaryImage::try_new(file, |file| ImageData::from_file(file))
    }

    /// The CLI header
    #[must_use]
    pub fn cor20header(&self) -> &Cor20Header {
        &self.borrow_data().cor20header
    }

    /// The metadata root
    #[must_use]
    pub fn metadata_root(&self) -> &Root {
        &self.borrow_data().metadata_root
    }

    /// Returns true if the image carries precompiled native code
    #[must_use]
    pub fn has_native_code(&self) -> bool {
        self.cor20header().has_native_code()
    }

    /// The tables stream
    #[must_use]
    pub fn tables(&self) -> &TablesHeader<'_> {
        &self.borrow_data().tables
    }

    /// The `#Strings` heap
    #[must_use]
    pub fn strings(&self) -> &Strings<'_> {
        &self.borrow_data().strings
    }

    /// The `#Blob` heap
    #[must_use]
    pub fn blobs(&self) -> &Blob<'_> {
        &self.borrow_data().blobs
    }

    /// Simple name of the assembly
    #[must_use]
    pub fn name(&self) -> &str {
        &self.borrow_data().name
    }

    /// The underlying file
    #[must_use]
    pub fn file(&self) -> &Arc<File> {
        self.borrow_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::tables::{TableId, TypeRefRaw},
        test::AssemblyBuilder,
    };

    #[test]
    fn load_crafted() {
        let mut builder = AssemblyBuilder::new("Content.Client");
        let corlib = builder.assembly_ref("System.Runtime");
        builder.type_ref_in_assembly(corlib, "System", "Console");

        let image = BinaryImage::from_mem(builder.build()).unwrap();

        assert_eq!(image.name(), "Content.Client");
        assert!(!image.has_native_code());
        assert_eq!(image.metadata_root().version, "v4.0.30319");
        assert_eq!(image.cor20header().cb, 72);
        assert!(image.tables().has_table(TableId::TypeDef));

        let typerefs = image.tables().table::<TypeRefRaw>().unwrap();
        let console = typerefs.get(1).unwrap();
        assert_eq!(image.strings().get(console.type_name as usize).unwrap(), "Console");
        assert_eq!(image.strings().get(console.type_namespace as usize).unwrap(), "System");
        assert_eq!(console.resolution_scope.tag, TableId::AssemblyRef);
        assert_eq!(image.blobs().get(0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn native_code() {
        let image = BinaryImage::from_mem(
            AssemblyBuilder::new("Mixed").with_native_code().build(),
        )
        .unwrap();

        assert!(image.has_native_code());
    }

    #[test]
    fn truncated_metadata() {
        let mut data = AssemblyBuilder::new("Broken").build();
        data.truncate(data.len() - 16);

        assert!(BinaryImage::from_mem(data).is_err());
    }
}
