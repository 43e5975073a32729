//! Utility functions and helpers

pub mod timer;

pub use timer::Timer;
