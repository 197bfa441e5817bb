//! Controller for a remote rocket launcher driven over a serial text link.

pub mod domain;
pub mod infrastructure;
pub mod presentation;
