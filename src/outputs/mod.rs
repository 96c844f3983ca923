//! File input/output for the pipeline's on-disk handoffs.
//!
//! Stages communicate only through files, so this is the whole interface
//! between them:
//!
//! - [`json`]: JSON load/save. A missing input file is fatal for the
//!   invoking stage; nothing partial is written.
//! - [`csv`]: tabular export of flattened rows, header derived from the
//!   first row.
//!
//! Writes buffer the full serialized output in memory and hit the
//! filesystem once, so a crash mid-run never leaves a half-written file
//! behind for the next stage to trip over.

pub mod csv;
pub mod json;
