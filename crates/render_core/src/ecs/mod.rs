//! Entity-Component-System store
//!
//! Components live in parallel arrays indexed by the entity slot; entity
//! handles carry a generation so stale handles never alias a reused slot.

pub mod commands;
pub mod component;
pub mod components;
pub mod entity;
pub mod storage;
pub mod world;

pub use commands::VisibilityCommands;
pub use component::Component;
pub use entity::Entity;
pub use storage::ComponentStorage;
pub use world::World;
