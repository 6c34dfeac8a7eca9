//! # corelink
//!
//! `corelink` is the bootstrap and connection-supervision layer of a web
//! service. It brings up an HTTP server, attaches a document store, a cache
//! and a message broker, wires a WebSocket event transport onto the same
//! listener, and keeps the broker connection alive under failure.
//!
//! ## Core Modules
//!
//! - `bootstrap`: Startup ordering and the broker retry state machine.
//! - `broker`: The broker client with its AMQP and in-memory transports.
//! - `cache`: Shared cache handle and the read-through request gate.
//! - `config`: Loads settings from files, `.env` and the environment.
//! - `http`: Router assembly, health endpoint, static files and error bodies.
//! - `realtime`: WebSocket event transport.
//! - `store`: Embedded document store.
//! - `utils`: Shared utilities, such as error types and logging.

pub mod bootstrap;
pub mod broker;
pub mod cache;
pub mod config;
pub mod http;
pub mod realtime;
pub mod store;
pub mod utils;
