//! Small dependency-free helpers shared by the runtime: token estimation,
//! text-shrinking, and running-average statistics. Kept separate from
//! `writeflow-protocol` so it can depend on nothing but `serde_json`.

pub mod stats;
pub mod text;
pub mod tokens;

pub use stats::Ewma;
