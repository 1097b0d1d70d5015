//! Foundation utilities and types
//!
//! Math, logging and frame timing shared by every other module.

pub mod logging;
pub mod math;
pub mod time;
