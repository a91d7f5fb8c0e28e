//! call-guard: bearer-token authentication and role-based authorization in
//! front of RPC-style handlers.
//!
//! The pipeline lives in `services::auth`; `middleware::auth::access` wires it
//! into axum and hands each call a `CallContext`.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
