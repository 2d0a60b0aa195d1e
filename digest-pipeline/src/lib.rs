//! Weekly digest build pipeline: the orchestration layer that turns a raw
//! article store into the per-week `Digest` artifact (spec §4).

pub mod classifier;
pub mod cover;
pub mod driver;
pub mod gate;
pub mod rerank;
pub mod store;
pub mod summarize;
pub mod themes;
pub mod window;

pub use driver::{run, RunOptions};
