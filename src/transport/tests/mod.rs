//! Unit tests for the transport module.

mod fixtures;
