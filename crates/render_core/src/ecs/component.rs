//! Component trait

/// Marker trait for components
///
/// Components are shared with the culling worker pool, so they must be
/// `Send + Sync`.
pub trait Component: 'static + Send + Sync {}
