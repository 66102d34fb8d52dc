//! Terminal output for the command line: progress bars and result tables.

pub mod progress;
pub mod tables;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{TableBuilder, create_embed_summary_table, create_hits_table, create_metadata_table};
