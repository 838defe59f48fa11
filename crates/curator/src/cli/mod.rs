//! CLI command implementations

pub mod decide;
pub mod error;
pub mod expired;
pub mod files;
pub mod output;
pub mod rules;
pub mod scan;
pub mod trash;
