//! # Models
//!
//! Reversible-jump samplers and the dense-matrix helpers they share.

pub mod matrix_ops;
pub mod rjmcmc;
