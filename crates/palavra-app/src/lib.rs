// Library root: re-exports all modules so the front end and integration
// tests can reach the session orchestrator and its collaborators.

pub mod config;
pub mod db;
pub mod protocol;
pub mod quota;
pub mod session;
pub mod transport;
