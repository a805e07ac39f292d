//! PE container access for .NET assemblies.
//!
//! A [`crate::file::File`] owns the raw bytes of an assembly (either memory-mapped from disk or
//! held in a buffer) together with the `goblin` view of its PE headers. Loading only succeeds for
//! images that carry a CLR runtime header, so every `File` is guaranteed to be a managed image.
//!
//! # Architecture
//!
//! - [`crate::file::Backend`] abstracts over the byte source
//! - [`crate::file::File`] couples the backend with the parsed PE headers via `ouroboros`
//! - [`crate::file::io`] and [`crate::file::parser`] provide bounds-checked readers used by the
//!   metadata layer
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsandbox::file::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("Content.Client.dll"))?;
//! let (clr_rva, clr_size) = file.clr()?;
//! let clr_offset = file.rva_to_offset(clr_rva)?;
//! let clr_header = file.data_slice(clr_offset, clr_size)?;
//! # Ok::<(), dotsandbox::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::{data_directories::DataDirectories, section_table::SectionTable, PE};
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

/// Source of the raw bytes of an input file
pub trait Backend: Send + Sync {
    /// Get a bounds-checked slice of the data
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + len` exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the full data
    fn data(&self) -> &[u8];

    /// Returns the length of the data
    fn len(&self) -> usize;
}

/// A loaded managed PE image
///
/// Owns the backing bytes and the parsed PE headers that borrow from them.
#[self_referencing]
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Memory-map and parse an assembly from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is empty, is not a PE image, or has no CLR
    /// runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Parse an assembly that is already held in memory
    ///
    /// # Errors
    /// Returns an error if the buffer is empty, is not a PE image, or has no CLR runtime header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data: Box<dyn Backend> = Box::new(data);

        File::try_new(data, |data| {
            let pe = PE::parse(data.data()).map_err(GoblinErr)?;
            let has_clr = pe
                .header
                .optional_header
                .as_ref()
                .map(|optional_header| clr_directory(&optional_header.data_directories).is_some());

            match has_clr {
                Some(true) => Ok(pe),
                Some(false) => Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                )),
                None => Err(malformed_error!("File does not have an OptionalHeader")),
            }
        })
    }

    /// Returns the length of the loaded file
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// Returns true if the file has no data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw bytes of the file
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// Returns a bounds-checked slice of the file
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// Returns the RVA and size of the CLR runtime header
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the directory is missing, which cannot happen for a
    /// `File` constructed through this module.
    pub fn clr(&self) -> Result<(usize, usize)> {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|optional_header| clr_directory(&optional_header.data_directories))
                .map(|(rva, size)| (rva as usize, size as usize))
                .ok_or_else(|| malformed_error!("File does not have a CLR runtime header"))
        })
    }

    /// Returns the section headers of the image
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.with_pe(|pe| pe.sections.iter())
    }

    /// Translate a relative virtual address into a file offset
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains the address.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let extent = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_max) = section.virtual_address.checked_add(extent) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        extent
                    ));
                };

                if section.virtual_address <= rva && rva < section_max {
                    return Ok((rva - section.virtual_address) as usize
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}

fn clr_directory(directories: &DataDirectories) -> Option<(u32, u32)> {
    directories
        .get_clr_runtime_header()
        .as_ref()
        .map(|directory| (directory.virtual_address, directory.size))
        .filter(|(rva, size)| *rva != 0 && *size != 0)
}
