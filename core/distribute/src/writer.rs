//! Application writer driver (§4.9): invokes the (external) DEX codec once
//! per non-empty virtual DEX in parallel, then writes the rename map and
//! main-dex list after every DEX has been encoded — reads are ordered
//! before the codec's destructive consumption of class state.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use shrinker_dex::DexVersion;
use shrinker_graph::{ClassId, Factory, Lens};

use crate::distributor::{Distribution, VirtualDex};
use crate::errors::DistributeError;

/// Selects the DEX format version the writer targets for a given
/// `--min-api`. Android O (API 26) introduced default/static interface
/// methods, raising the floor to `038`; API 24 (N) raised it to `037`.
pub fn select_dex_version(min_api: u32) -> DexVersion {
    if min_api >= 26 {
        DexVersion::DEX38
    } else if min_api >= 24 {
        DexVersion::DEX37
    } else {
        DexVersion::DEX35
    }
}

pub fn check_min_api(min_api: u32, version: DexVersion) -> Result<(), DistributeError> {
    let requested: u32 = version.into();
    let expected: u32 = select_dex_version(min_api).into();
    if requested < expected {
        return Err(DistributeError::MinApiMismatch { min_api, requested });
    }
    Ok(())
}

/// The external DEX byte-encoder. *Described interface only* — bytecode
/// emission (constant pool layout, annotation/encoded-value sorting,
/// instruction assembly) is out of scope; no implementor ships with this
/// crate.
pub trait DexEncoder {
    fn encode(
        &self,
        factory: &Factory,
        lens: &Lens,
        dex: &VirtualDex,
        version: DexVersion,
    ) -> Result<Vec<u8>, DistributeError>;
}

pub enum OutputTarget {
    Directory(PathBuf),
    Zip(PathBuf),
}

fn dex_file_name(index: u32) -> String {
    if index == 0 { "classes.dex".to_string() } else { format!("classes{}.dex", index + 1) }
}

/// Render the lens as a Proguard-style rename map: one `source ->
/// renamed:` header per renamed class.
pub fn render_rename_map(factory: &Factory, lens: &Lens, classes: &[ClassId]) -> String {
    let mut out = String::new();
    for &class_id in classes {
        let ty = factory.with_class(class_id, |c| c.class_type);
        let Some(renamed) = lens.renamed_type(ty) else { continue };
        let original = factory.type_descriptor(ty);
        out.push_str(&format!("{} -> {}:\n", descriptor_to_source(&original), descriptor_to_source(&renamed)));
    }
    out
}

fn descriptor_to_source(descriptor: &str) -> String {
    descriptor
        .trim_start_matches('L')
        .trim_end_matches(';')
        .replace('/', ".")
}

/// Render the main-dex list in `pkg/Name.class` form.
pub fn render_main_dex_list(factory: &Factory, main_dex_list: &[ClassId]) -> String {
    let mut out = String::new();
    for &class_id in main_dex_list {
        let ty = factory.with_class(class_id, |c| c.class_type);
        let descriptor = factory.type_descriptor(ty);
        let binary = descriptor.trim_start_matches('L').trim_end_matches(';');
        out.push_str(binary);
        out.push_str(".class\n");
    }
    out
}

/// Encode every non-empty DEX in parallel, then write DEX bytes, the
/// rename map, and the main-dex list to `output`.
pub fn write_program(
    factory: &Factory,
    lens: &Lens,
    distribution: &Distribution,
    version: DexVersion,
    encoder: &(dyn DexEncoder + Sync),
    output: &OutputTarget,
) -> Result<(), DistributeError> {
    let non_empty: Vec<&VirtualDex> = distribution.dexes.iter().filter(|d| !d.classes.is_empty()).collect();
    let encoded: Mutex<Vec<(String, Vec<u8>)>> = Mutex::new(Vec::with_capacity(non_empty.len()));

    std::thread::scope(|scope| -> Result<(), DistributeError> {
        let mut handles = Vec::new();
        for dex in &non_empty {
            let encoded = &encoded;
            let version = version.clone();
            handles.push(scope.spawn(move || -> Result<(), DistributeError> {
                let bytes = encoder.encode(factory, lens, dex, version)?;
                encoded.lock().expect("writer mutex poisoned").push((dex_file_name(dex.id), bytes));
                Ok(())
            }));
        }
        for handle in handles {
            handle.join().expect("dex writer thread panicked")?;
        }
        Ok(())
    })?;

    let mut files = encoded.into_inner().expect("writer mutex poisoned");
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let all_classes: Vec<ClassId> = distribution.dexes.iter().flat_map(|d| d.classes.iter().copied()).collect();
    files.push(("mapping.txt".to_string(), render_rename_map(factory, lens, &all_classes).into_bytes()));
    files.push((
        "main-dex-list.txt".to_string(),
        render_main_dex_list(factory, &distribution.main_dex_list).into_bytes(),
    ));

    match output {
        OutputTarget::Directory(dir) => write_directory(dir, &files),
        OutputTarget::Zip(path) => write_zip(path, &files),
    }
}

fn write_directory(dir: &Path, files: &[(String, Vec<u8>)]) -> Result<(), DistributeError> {
    std::fs::create_dir_all(dir)?;
    for (name, bytes) in files {
        std::fs::write(dir.join(name), bytes)?;
    }
    Ok(())
}

/// A minimal stored-entries (no compression) ZIP writer — the writer side
/// of the container format `shrinker-zip` only reads.
fn write_zip(path: &Path, files: &[(String, Vec<u8>)]) -> Result<(), DistributeError> {
    let mut buf = Vec::new();
    let mut central = Vec::new();

    for (name, data) in files {
        let offset = buf.len() as u32;
        let crc = crc32(data);

        buf.extend_from_slice(&0x04034b50u32.to_le_bytes());
        buf.extend_from_slice(&20u16.to_le_bytes()); // version needed
        buf.extend_from_slice(&0u16.to_le_bytes()); // general purpose flag
        buf.extend_from_slice(&0u16.to_le_bytes()); // compression: stored
        buf.extend_from_slice(&0u16.to_le_bytes()); // mod time
        buf.extend_from_slice(&0u16.to_le_bytes()); // mod date
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes()); // extra field length
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(data);

        central.extend_from_slice(&0x02014b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes()); // version made by
        central.extend_from_slice(&20u16.to_le_bytes()); // version needed
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u32.to_le_bytes());
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = buf.len() as u32;
    let central_size = central.len() as u32;
    buf.extend_from_slice(&central);

    buf.extend_from_slice(&0x06054b50u32.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&(files.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(files.len() as u16).to_le_bytes());
    buf.extend_from_slice(&central_size.to_le_bytes());
    buf.extend_from_slice(&central_offset.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, buf)?;
    Ok(())
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_floor_tracks_min_api() {
        assert_eq!(select_dex_version(21), DexVersion::DEX35);
        assert_eq!(select_dex_version(24), DexVersion::DEX37);
        assert_eq!(select_dex_version(26), DexVersion::DEX38);
    }

    #[test]
    fn mismatch_rejected_when_version_below_floor() {
        let err = check_min_api(26, DexVersion::DEX35).unwrap_err();
        assert!(matches!(err, DistributeError::MinApiMismatch { .. }));
    }

    #[test]
    fn dex_file_naming_matches_convention() {
        assert_eq!(dex_file_name(0), "classes.dex");
        assert_eq!(dex_file_name(1), "classes2.dex");
        assert_eq!(dex_file_name(2), "classes3.dex");
    }

    #[test]
    fn crc32_of_known_input() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
