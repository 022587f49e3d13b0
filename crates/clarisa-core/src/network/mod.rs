//! Remote access to the Clarisa reference API.

mod client;

pub use client::{institutions_path, ClarisaClient, ClarisaSource};
