//! worldfleet world manager library.
//!
//! This crate primarily ships a `world-manager` binary, but exposes its
//! components so integration tests can drive a controller pass or an
//! admission against in-memory fakes.

pub mod admission;
pub mod api;
pub mod config;
pub mod controller;
pub mod db;
pub mod desired;
pub mod host;
pub mod listing;
pub mod models;
pub mod registry;
pub mod state;
