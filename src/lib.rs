//! platdex - platform directory client
//!
//! Client-side core for a directory of platforms and curated collections:
//! filter state for the listing, a coalescing stale-while-revalidate query
//! cache, fire-and-forget analytics, the public submission form and the
//! cookie-authenticated admin review pages.
//!
//! ## Layout
//!
//! - `api` / `envelope` / `net`: HTTP access, response envelopes, retry
//! - `filter` / `query_cache` / `browse`: the listing page
//! - `analytics`: view and click reporting
//! - `submit` / `review`: submission form and admin pages
//! - `render`: plain-text output used by the `platdex` binary
//!
//! ```bash
//! API_BASE_URL=http://localhost:8000/api/v1 platdex browse -s translate
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod types;

// Debug logging system
pub mod debug;

// HTTP access
pub mod api;
pub mod envelope;
pub mod net;

// Listing
pub mod browse;
pub mod filter;
pub mod query_cache;

pub mod analytics;
pub mod review;
pub mod submit;

pub mod render;

pub use api::{ApiClient, PlatformQuery, PlatformSource};
pub use error::ApiError;
