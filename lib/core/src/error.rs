//! Shared result alias.
//!
//! Every flowbridge crate owns a plain error enum and returns
//! `Report<ThatEnum>`. A layer that adds meaning to a lower layer's failure
//! wraps it with `.context(...)`, so an execution failure still carries the
//! gateway report that caused it.

use rootcause::Report;

/// `std::result::Result` with a rootcause report as the error.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
