//! Common utilities shared by every crate: error taxonomy and unit formatting

pub mod errors;
pub mod units;
