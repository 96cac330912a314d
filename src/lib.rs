//! Vellum: a template-driven page server with a compiled-template cache, a
//! shared rendered-page cache, and precise invalidation.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
