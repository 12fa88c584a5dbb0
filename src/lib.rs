//! Docweave library crate
//!
//! Exposes the pipeline modules so integration tests and external
//! tooling can exercise chunking, merging, and insertion without going
//! through CLI startup.

pub mod chunk;
pub mod config;
pub mod docmap;
pub mod index;
pub mod insert;
pub mod llm;
pub mod orchestrate;
pub mod processor;
pub mod spinner;
pub mod util;
