//! Process-level glue: dependency check and signal handling.

pub mod dependencies;
pub mod signals;
