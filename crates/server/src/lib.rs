//! Static preview server for the menu site.
//!
//! Serves the site tree over plain HTTP for local development and browser
//! smoke checks. Every response carries a wide-open CORS policy and
//! cache-disabling directives so that edits to the menu are always picked up
//! on reload.

pub mod server;

pub use server::{router, serve, ServerConfig};
