//! Speech-bubble annotation engine for translated comic pages.
//!
//! Bubbles are polygons in the page image's native pixel space carrying a
//! translation and its font styling. The [`editor::Editor`] turns pointer
//! events into store mutations and persists them through
//! [`backend::ShapeBackend`]; [`render`] draws the same scene either
//! decorated on screen or flattened for export.

pub mod app;
pub mod backend;
pub mod config;
pub mod editor;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod render;
pub mod store;
pub mod sync;
