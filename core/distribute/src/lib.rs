//! Virtual-file distributor (§4.8) and application writer driver (§4.9).

pub mod distributor;
pub mod errors;
pub mod writer;

pub use distributor::{class_references, ClassReferences, Distribution, Distributor, Mode, VirtualDex, MAX_REFERENCES_PER_DEX};
pub use errors::DistributeError;
pub use writer::{check_min_api, render_main_dex_list, render_rename_map, select_dex_version, write_program, DexEncoder, OutputTarget};
