//! Application services layer: cache refresh, scheduling and reads.

pub mod catalog;
pub mod clock;
pub mod error;
pub mod jobs;
pub mod options;
pub mod quotes;
pub mod repos;
pub mod shutdown;
pub mod source;
