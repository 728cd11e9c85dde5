//! Session identity: who the logged-in portal user is.

pub mod cache;
pub mod parse;

pub use cache::{CacheStatus, CachedValue, SessionCache};
