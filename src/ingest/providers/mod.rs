// src/ingest/providers/mod.rs
pub mod newsapi;
pub mod reddit;
pub mod youtube;
