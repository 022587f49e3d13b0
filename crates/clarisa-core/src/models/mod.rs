//! Data models: Clarisa wire shapes and the rows of the local replica.

mod clarisa;
mod institution;
mod watermark;

pub use clarisa::*;
pub use institution::*;
pub use watermark::Watermark;
