//! Scatter/gather alignment
//!
//! Fetches every variable concurrently, then stitches the sparse series onto
//! one dense grid and encodes it as the canonical table.

mod alignment;
mod table;

pub use alignment::AlignmentPipeline;
pub use table::{format_value, AlignedTable};
