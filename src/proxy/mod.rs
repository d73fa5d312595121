//
// src/proxy/mod.rs
//
mod request;

pub use request::{ProxyError, ProxyRequest};
