//! HTTP control surface
//!
//! - `server`: router and serve loop
//! - `handlers`: tile and scene endpoints
//! - `sse`: event stream

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
