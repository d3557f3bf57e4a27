//! HTTP host for the blindmatch protocol
//!
//! Exposes the record store, the matching and reveal flows, and the oracle
//! callback endpoints over axum. Built as a library as well as a binary so
//! integration tests can stand up the full router.

pub mod config;
pub mod error;
pub mod oracle;
pub mod routes;
pub mod state;
