#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # A declarative scene graph for Wayland compositors
//!
//! This crate provides the core of a scene-graph based rendering pipeline: a
//! mutable tree of drawable [`scene::Node`]s that a compositor describes once
//! and mutates over time, plus a per-output commit pipeline that turns the
//! current tree state into draw calls while tracking, at pixel granularity,
//! which regions of each display actually changed since the last frame.
//!
//! The crate does not rasterize anything itself, does not speak the Wayland
//! wire protocol, and does not implement a window manager. Those concerns are
//! expected to live above this crate; what it owns is the tree, the damage
//! bookkeeping, the per-output membership tracking, and the scanout/composite
//! decision made on every frame. See [`backend`] for the traits a compositor
//! implements to plug in its renderer, displays and buffers.
//!
//! ## Logging
//!
//! All diagnostics go through [`tracing`]; install a subscriber (e.g.
//! `tracing_subscriber::fmt`) in your compositor to see them.

pub mod backend;
pub mod config;
pub mod error;
pub mod scene;
pub mod utils;
