// src/server/mod.rs

//! Development HTTP server: static files from the build output plus a
//! Server-Sent Events channel that tells browsers to reload.

pub mod http;
pub mod reload;

pub use http::{serve, start, ServerHandle};
pub use reload::{ReloadHub, ReloadKind};
