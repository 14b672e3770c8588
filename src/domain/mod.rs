//! Domain layer
//!
//! Configuration, deployment and token types. Nothing here performs I/O.

pub mod models;
