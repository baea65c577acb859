//! Render pipelines.
//!
//! - `basic`: lit meshes and the shared pipeline builder
//! - `environment`: equirectangular background
//! - `post`: full-screen passes of the effect chain and the final tone mapping

pub mod basic;
pub mod environment;
pub mod post;
