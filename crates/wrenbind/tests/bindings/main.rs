//! End-to-end tests for host bindings
//!
//! Each test declares bindings, arms a session and runs script source
//! against them, checking what the host and the script observe.

mod harness;

mod declarations;
mod dispatch;
mod handles;
mod marshalling;
mod modules;
mod objects;
