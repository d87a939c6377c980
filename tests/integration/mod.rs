//! Integration tests against seeded warehouse files.

pub mod connection_test;
pub mod guard_proptest;
pub mod tools_test;
