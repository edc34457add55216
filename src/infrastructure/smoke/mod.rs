//! Post-start verification of a generated service

pub mod http;

pub use http::{CrudReport, HttpSmokeTester, SmokeTester};
