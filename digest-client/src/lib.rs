mod client;
mod schema;
mod types;
mod util;

pub use client::LlmClient;
pub use schema::StructuredOutput;
pub use util::{strip_code_blocks, truncate_to_char_boundary};
