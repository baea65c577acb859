//! Scene data: what is drawn and where.
//!
//! - `scene_graph` holds the node hierarchy and the scene's environment
//! - `model` contains geometry, materials and meshes
//! - `texture` contains environment images and GPU texture wrappers
//! - `instance` holds node transforms and their per-instance GPU layout

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
