//! Scheduler layer
//!
//! Walks a pipeline's stages in declared order and runs their jobs as
//! containers, stopping the whole pipeline at the first failing job.

pub mod stages;

pub use stages::StageScheduler;
