//! Binary DEX codec: the `reader` module parses `header_item` through
//! `class_data_item` (§6 input demux), matching the constant pool layout at
//! <https://source.android.com/docs/core/runtime/dex-format>. Writing is a
//! described seam only (`shrinker-distribute`'s `DexEncoder` trait) — no
//! encoder body lives here, per scope.

pub mod errors;
pub mod reader;

pub use errors::DexError;
pub use reader::{
    AccessFlags, ClassData, ClassItem, Dex, DexHeader, DexVersion, EncodedFieldItem,
    EncodedMethodItem, FieldItem, ItemType, MapItem, MethodItem, ProtoItem, ProtoView,
    ENDIAN_CONSTANT, NO_INDEX, REVERSE_ENDIAN_CONSTANT,
};
