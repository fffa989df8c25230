//! Client for the cross-selling quality evaluation form: loads the staffing
//! roster CSV into dropdowns and appends each submitted evaluation as one row
//! of a shared Excel table through Microsoft Graph.

pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod graph;
pub mod page;
pub mod roster;
pub mod submission;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{FormError, Result};
