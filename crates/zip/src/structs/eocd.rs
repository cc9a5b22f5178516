#![allow(unused)]

use winnow::binary::{le_u16, le_u32};
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

#[derive(Debug)]
pub(crate) struct EndOfCentralDirectory {
    pub(crate) disk_number: u16,
    pub(crate) disk_with_central_dir: u16,
    pub(crate) central_dir_entries_this_disk: u16,
    pub(crate) central_dir_entries_total: u16,
    pub(crate) central_dir_size: u32,
    pub(crate) central_dir_offset: u32,
    pub(crate) comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    const MAGIC: u32 = 0x06054b50;

    /// Scan backwards from the end of `input` for the EOCD record, looking
    /// no further than `window` bytes in (the trailing comment is at most
    /// 65535 bytes, so callers pass a generous but bounded window).
    pub(crate) fn find_eocd(input: &[u8], window: usize) -> Option<usize> {
        let start = input.len().saturating_sub(window.max(22));
        let haystack = &input[start..];

        haystack
            .windows(4)
            .rposition(|w| w == Self::MAGIC.to_le_bytes())
            .map(|pos| start + pos)
    }

    #[inline(always)]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<EndOfCentralDirectory> {
        let (
            _,
            disk_number,
            disk_with_central_dir,
            central_dir_entries_this_disk,
            central_dir_entries_total,
            central_dir_size,
            central_dir_offset,
            comment_length,
        ) = (
            le_u32.verify(|magic| *magic == Self::MAGIC), // magic
            le_u16,                                       // disk_number
            le_u16,                                       // disk_with_central_dir
            le_u16,                                       // central_dir_entries_this_disk
            le_u16,                                       // central_dir_entries_total
            le_u32,                                       // central_dir_size
            le_u32,                                       // central_dir_offset
            le_u16,                                       // comment_length
        )
            .parse_next(input)?;

        let comment = take(comment_length).parse_next(input)?;

        Ok(EndOfCentralDirectory {
            disk_number,
            disk_with_central_dir,
            central_dir_entries_this_disk,
            central_dir_entries_total,
            central_dir_size,
            central_dir_offset,
            comment: comment.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_eocd_at_end_of_buffer() {
        let mut buf = vec![0u8; 10];
        buf.extend_from_slice(&EndOfCentralDirectory::MAGIC.to_le_bytes());
        buf.extend_from_slice(&[0u8; 18]); // fixed fields, zero comment length

        let offset = EndOfCentralDirectory::find_eocd(&buf, 4096).unwrap();
        assert_eq!(offset, 10);

        let eocd = EndOfCentralDirectory::parse(&mut &buf[offset..]).unwrap();
        assert_eq!(eocd.central_dir_offset, 0);
    }

    #[test]
    fn missing_magic_returns_none() {
        let buf = vec![0u8; 64];
        assert!(EndOfCentralDirectory::find_eocd(&buf, 4096).is_none());
    }
}
