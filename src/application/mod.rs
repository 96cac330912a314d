//! Application services layer.

pub mod admin;
pub mod error;
pub mod render;
pub mod repos;
pub mod site;
