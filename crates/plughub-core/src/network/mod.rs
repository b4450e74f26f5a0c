//! Network utilities for talking to git hosting providers.

mod client;

pub use client::{HttpClient, RateLimitState};
