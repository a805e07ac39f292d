//! Metadata root header (ECMA-335 II.24.2.1).
//!
//! The root sits at the start of the metadata block the Cor20 header points to. It carries the
//! `BSJB` signature, the runtime version string and the headers of every metadata stream.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Result,
};

/// Magic signature of the metadata root, "BSJB"
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The parsed metadata root
pub struct Root {
    /// Magic signature, 0x424A5342
    pub signature: u32,
    /// Major version, ignored on read
    pub major_version: u16,
    /// Minor version, ignored on read
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// Length of the version string including padding
    pub length: u32,
    /// Runtime version string, e.g. "v4.0.30319"
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of streams
    pub stream_number: u16,
    /// Headers of all streams
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root from the start of the metadata block
    ///
    /// ## Arguments
    /// * 'data' - The full metadata block
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad signature or stream table, and
    /// [`crate::Error::OutOfBounds`] if a stream lies outside of `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(out_of_bounds_error!());
        }

        let version = data[16..version_end]
            .iter()
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect::<String>();

        let flags = read_le_at::<u16>(data, &mut { version_end })?;
        let stream_count = read_le_at::<u16>(data, &mut (version_end + 2))?;
        if stream_count == 0 || stream_count > 5 || usize::from(stream_count) * 9 > data.len() {
            // Must have streams, no duplicates, no more than 5 possible
            return Err(malformed_error!("Invalid stream count"));
        }

        let mut streams = Vec::with_capacity(usize::from(stream_count));
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(out_of_bounds_error!());
            }

            let new_stream = StreamHeader::from(&data[stream_offset..])?;
            let Some(range) = new_stream.offset.checked_add(new_stream.size) else {
                return Err(malformed_error!(
                    "Stream offset and size cause integer overflow - {} + {}",
                    new_stream.offset,
                    new_stream.size
                ));
            };
            if range as usize > data.len() {
                return Err(out_of_bounds_error!());
            }

            if streams
                .iter()
                .any(|existing: &StreamHeader| existing.name == new_stream.name)
            {
                return Err(malformed_error!(
                    "Duplicate stream header - {}",
                    new_stream.name
                ));
            }

            let name_aligned = ((new_stream.name.len() + 1) + 3) & !3;
            stream_offset += 8 + name_aligned;

            streams.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            length: u32::try_from(version_string_length)
                .map_err(|_| malformed_error!("Version string length too large"))?,
            version,
            flags,
            stream_number: stream_count,
            stream_headers: streams,
        })
    }
}
