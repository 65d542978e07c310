//! Loader and integrator for the three-body simulation module.
//!
//! The crate bootstraps the simulation the way a host page does: once the
//! host signals that its content is ready, the compiled module and its
//! companion resource are fetched concurrently and validated. The gravity
//! integrator that the module exposes lives alongside, together with the
//! scenario format used to describe initial conditions.

pub mod app;
pub mod artifact;
pub mod lifecycle;
pub mod loader;
pub mod physics;
pub mod scenario;
pub mod simulation;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use artifact::{load_module_file, load_resource_file, ModuleHandle, ResourceHandle};
pub use lifecycle::{Dispatch, Lifecycle};
pub use loader::{Factory, LoadError, LoadState, LoadStrategy, LoadTracker, Loaded, Loader};
pub use physics::{Body, Derivative, System};
pub use scenario::Scenario;
pub use simulation::Simulation;
