//! Buy-vs-rent projection: owning an apartment under a mortgage while renting,
//! with every monthly surplus invested in a market-tracking fund.
//!
//! [`crate::core`] holds the validator and the projection engine; [`crate::api`] carries the
//! command-line and HTTP surfaces built on top of it.

pub mod api;
pub mod core;
