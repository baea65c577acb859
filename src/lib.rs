//! mannequin-ngin
//!
//! A small wgpu viewer that shows a glTF mannequin lit by an HDR environment, native
//! and in the browser. Two scenes are configured out of the box: a reflective studio
//! look and a spinning glass mannequin with a marker that follows the pointer over
//! its surface and a bloom/outline effect chain.
//!
//! High-level modules
//! - `camera`: camera, projection, uniforms and orbit controls
//! - `config`: scene presets and render settings
//! - `context`: window, surface, device and queue
//! - `data_structures`: scene graph, geometry, materials, textures and instances
//! - `flow`: the winit event loop driving a showcase
//! - `interaction`: per-frame spin and surface tracking marker
//! - `pipelines`: render pipelines and their shaders
//! - `postprocessing`: effect chain description and pass planning
//! - `raycast`: rays, bounding boxes and scene intersection
//! - `render`: turns a showcase into a frame
//! - `resources`: asset loading (glTF models, HDR environments)
//! - `showcase`: the scene state the event loop and the renderer share
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod interaction;
pub mod pipelines;
pub mod postprocessing;
pub mod raycast;
pub mod render;
pub mod resources;
pub mod showcase;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use config::SceneConfig;
pub use flow::run;
pub use showcase::Showcase;
