//! Data types and pure functions shared by the brandkit engine and CLI:
//! brand identity, aspect-ratio plans, asset bookkeeping, pipeline status,
//! prompt construction and the run artifacts written to disk.

pub mod aspect;
pub mod assets;
pub mod brand;
pub mod events;
pub mod json_extract;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod runs;
pub mod status;
mod text;

pub use text::{clean_text, coerce_text_list, normalize_hex_color};
