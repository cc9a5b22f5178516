//! Input demux (§6): dispatches `.class`/`.dex`/`.jar`/`.zip`/`.apk` inputs
//! by extension, falling back to a magic-byte sniff when the extension is
//! absent or unrecognized, the same two-step the teacher's `ZipEntry::new`
//! sanity check and `Dex::new` header parse perform independently.

use std::path::Path;

use shrinker_dex::Dex;
use shrinker_zip::ZipEntry;

use crate::errors::CompileError;

const DEX_MAGIC: &[u8] = b"dex\n";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug)]
pub enum InputKind {
    Dex(Dex),
    Container(ZipEntry),
    Classfile(Vec<u8>),
}

/// Raw `.class` classfile parsing — *described interface only*, per scope.
/// No instruction-decoding body ships with this crate.
pub trait ClassfileReader {
    fn parse(&self, data: &[u8]) -> Result<(), CompileError>;
}

pub fn read_input(path: &Path, data: Vec<u8>) -> Result<InputKind, CompileError> {
    if data.is_empty() {
        return Err(CompileError::InvalidInput(format!("{} is empty", path.display())));
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("dex") => return Ok(InputKind::Dex(Dex::new(data)?)),
        Some("jar" | "zip" | "apk") => return Ok(InputKind::Container(ZipEntry::new(data)?)),
        Some("class") => return Ok(InputKind::Classfile(data)),
        _ => {}
    }

    if data.starts_with(DEX_MAGIC) {
        return Ok(InputKind::Dex(Dex::new(data)?));
    }
    if data.starts_with(ZIP_MAGIC) {
        return Ok(InputKind::Container(ZipEntry::new(data)?));
    }

    Err(CompileError::InvalidInput(format!(
        "{}: unrecognized input format",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_input_is_rejected() {
        let err = read_input(&PathBuf::from("empty.dex"), Vec::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidInput(_)));
    }

    #[test]
    fn unknown_bytes_without_extension_are_rejected() {
        let err = read_input(&PathBuf::from("mystery"), vec![0u8; 8]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidInput(_)));
    }

    #[test]
    fn zip_magic_is_sniffed_without_extension() {
        let err = read_input(&PathBuf::from("mystery"), vec![0u8; 4]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidInput(_)));

        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 18]);
        let err = read_input(&PathBuf::from("mystery"), bytes).unwrap_err();
        assert!(matches!(err, CompileError::Zip(_)));
    }
}
