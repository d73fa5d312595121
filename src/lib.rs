// src/lib.rs
pub mod config;
pub mod frontend;
pub mod manager;
pub mod metrics;
pub mod provider;
pub mod proxy;
pub mod strategy;
