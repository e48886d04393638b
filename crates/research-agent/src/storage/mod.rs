//! Run artifact storage.

mod exporter;
mod markdown;

pub use exporter::{slugify, Exporter, MAX_SLUG_LEN, TIMESTAMP_FORMAT};
pub use markdown::render_research;
