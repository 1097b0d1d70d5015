//! Graphics device implementations

pub mod headless;

pub use headless::{DrawRecord, HeadlessDevice};
