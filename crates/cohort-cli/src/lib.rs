//! Library side of the `cohort` binary.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod summary;
