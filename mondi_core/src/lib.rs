//! Core types and traits for `mondi` library.
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod instance;

pub use error::{Error, Result};
pub use instance::{Component, Fields, FromInstance, Instance, IntoInstance, Navigable};
