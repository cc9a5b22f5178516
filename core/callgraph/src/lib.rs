//! Call graph construction, cycle breaking, leaf iteration, and call-site
//! counting (§4.5/§4.6).

pub mod callsites;
pub mod cycles;
pub mod graph;
pub mod leaves;

pub use callsites::{count_call_sites, CallSiteCounts};
pub use cycles::{break_cycles, Breakers};
pub use graph::CallGraph;
pub use leaves::leaf_layers;
