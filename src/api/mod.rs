//! HTTP surface of the search service.

mod handlers;
mod rest;

pub use handlers::*;
pub use rest::*;
