//! Whole-program DEX compiler/shrinker core: input demux, the program
//! graph driver, and the phase pipeline tying reader, enqueue, callgraph,
//! rename, and distribute together.

pub mod driver;
pub mod errors;
pub mod reader;

pub use driver::{CodeDecoder, Driver, PipelineOptions};
pub use errors::CompileError;
pub use reader::{read_input, InputKind};
