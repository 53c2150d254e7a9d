//! Leafpress - a small page and blog CMS
//!
//! Published pages grouped by category and tag, with search, a cached
//! sidebar, and a contact form guarded by a honeypot and a per-address
//! rate limit.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
