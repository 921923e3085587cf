//! Row types mapping between sqlite and the core data model.

mod job_row;

pub use job_row::JobRow;
