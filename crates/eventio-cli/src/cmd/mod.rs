// crates/eventio-cli/src/cmd/mod.rs

pub mod merge;
pub mod trgmask;
