//! Renderer configuration

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Shadow-map fitting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Square shadow map size in texels
    pub resolution: u32,
    /// Distance from the camera covered by the shadow map
    pub far_distance: f32,
    /// Vertical field of view used for the fitted frustum, in degrees
    pub fov_degrees: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 2048,
            far_distance: 50.0,
            fov_degrees: 60.0,
        }
    }
}

/// Bounds and capacity of the light index octree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightIndexConfig {
    /// Minimum corner of the indexed world region
    pub world_min: [f32; 3],
    /// Maximum corner of the indexed world region
    pub world_max: [f32; 3],
    /// Maximum number of positional lights held at once
    pub capacity: usize,
    /// Entries per node before it splits
    pub max_entries_per_node: usize,
    /// Maximum subdivision depth
    pub max_depth: u32,
}

impl Default for LightIndexConfig {
    fn default() -> Self {
        Self {
            world_min: [-512.0, -512.0, -512.0],
            world_max: [512.0, 512.0, 512.0],
            capacity: 1024,
            max_entries_per_node: 8,
            max_depth: 6,
        }
    }
}

/// Top-level renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Light slots handed to shaders: one sun plus `max_lights - 1` positional lights
    pub max_lights: usize,
    /// Half-extent of the box used to gather lights around a surface
    pub light_query_radius: f32,
    /// Light index layout
    pub light_index: LightIndexConfig,
    /// Instances per instanced draw; extras are dropped
    pub instance_capacity: usize,
    /// Shadow fitting parameters
    pub shadow: ShadowConfig,
    /// Clear color for the off-screen target
    pub clear_color: [f32; 4],
    /// Off-screen target size in pixels
    pub extent: (u32, u32),
    /// Identifier of the camera that drives culling and drawing
    pub active_camera: String,
    /// Name of the drawable that is never culled
    pub skybox_name: String,
    /// Classify drawables on the worker pool when the `parallel` feature is on
    pub parallel_culling: bool,
    /// Longest parent chain followed when resolving world matrices
    pub max_hierarchy_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_lights: 8,
            light_query_radius: 25.0,
            light_index: LightIndexConfig::default(),
            instance_capacity: 1024,
            shadow: ShadowConfig::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            extent: (1280, 720),
            active_camera: "main".to_string(),
            skybox_name: "skybox".to_string(),
            parallel_culling: true,
            max_hierarchy_depth: 32,
        }
    }
}

impl Config for RenderConfig {}

impl RenderConfig {
    /// Set the number of shader light slots
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the instanced draw capacity
    pub fn with_instance_capacity(mut self, capacity: usize) -> Self {
        self.instance_capacity = capacity;
        self
    }

    /// Set the active camera identifier
    pub fn with_active_camera(mut self, id: impl Into<String>) -> Self {
        self.active_camera = id.into();
        self
    }

    /// Set the shadow parameters
    pub fn with_shadow(mut self, shadow: ShadowConfig) -> Self {
        self.shadow = shadow;
        self
    }

    /// Set the light index layout
    pub fn with_light_index(mut self, light_index: LightIndexConfig) -> Self {
        self.light_index = light_index;
        self
    }

    /// Enable or disable worker-pool culling
    pub fn with_parallel_culling(mut self, enabled: bool) -> Self {
        self.parallel_culling = enabled;
        self
    }

    /// Reject values the frame stages cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lights == 0 {
            return Err(ConfigError::Invalid {
                field: "max_lights",
                reason: "at least the sun slot is required".to_string(),
            });
        }
        if self.instance_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "instance_capacity",
                reason: "must be positive".to_string(),
            });
        }
        if self.shadow.resolution == 0 || self.shadow.far_distance <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "shadow",
                reason: "resolution and far distance must be positive".to_string(),
            });
        }
        if !(self.shadow.fov_degrees > 0.0 && self.shadow.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid {
                field: "shadow.fov_degrees",
                reason: format!("{} is outside (0, 180)", self.shadow.fov_degrees),
            });
        }
        let bounds = &self.light_index;
        if (0..3).any(|axis| bounds.world_min[axis] >= bounds.world_max[axis]) {
            return Err(ConfigError::Invalid {
                field: "light_index",
                reason: "world_min must be below world_max on every axis".to_string(),
            });
        }
        if self.extent.0 == 0 || self.extent.1 == 0 {
            return Err(ConfigError::Invalid {
                field: "extent",
                reason: "target size must be positive".to_string(),
            });
        }
        Ok(())
    }
}
