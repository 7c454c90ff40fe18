//! Concurrency control for subscription fan-out
//!
//! Management API calls are fanned out across subscriptions through a
//! [`BoundedPool`], which caps how many requests are in flight at once.

pub mod pool;

pub use pool::BoundedPool;
