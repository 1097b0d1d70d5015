//! Material instances
//!
//! A material moves through `Unbuilt -> Built -> Disposed` exactly once.
//! There is no in-place rebuild: changing a material's shader means creating
//! a new material under a new name.

use slotmap::new_key_type;

use super::properties::MaterialProperties;
use super::shader::ShaderDescriptor;
use crate::render::api::{PipelineHandle, ResourceHandle, ResourceLayoutHandle, ResourceSetHandle};
use crate::render::{RenderError, RenderResult};

new_key_type! {
    /// Stable material identifier
    pub struct MaterialId;
}

/// Lifecycle state of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialState {
    /// Created, no GPU objects yet
    Unbuilt,
    /// Pipeline and resource set exist
    Built,
    /// GPU objects released; the material can no longer be drawn
    Disposed,
}

impl MaterialState {
    /// Lower-case state name for messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unbuilt => "unbuilt",
            Self::Built => "built",
            Self::Disposed => "disposed",
        }
    }
}

/// GPU objects owned by a built material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialGpu {
    /// Pipeline
    pub pipeline: PipelineHandle,
    /// Per-material binding layout
    pub layout: ResourceLayoutHandle,
    /// Per-material bindings
    pub resource_set: ResourceSetHandle,
}

/// A named material: shader, property values and GPU state
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    shader: ShaderDescriptor,
    properties: MaterialProperties,
    state: MaterialState,
    gpu: Option<MaterialGpu>,
}

impl Material {
    /// Create an unbuilt material with default property values
    pub fn new(name: impl Into<String>, shader: ShaderDescriptor) -> Self {
        let properties = MaterialProperties::from_descriptor(&shader);
        Self {
            name: name.into(),
            shader,
            properties,
            state: MaterialState::Unbuilt,
            gpu: None,
        }
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shader descriptor
    pub fn shader(&self) -> &ShaderDescriptor {
        &self.shader
    }

    /// Property values
    pub fn properties(&self) -> &MaterialProperties {
        &self.properties
    }

    /// Mutable property values
    pub fn properties_mut(&mut self) -> &mut MaterialProperties {
        &mut self.properties
    }

    /// Lifecycle state
    pub fn state(&self) -> MaterialState {
        self.state
    }

    /// Whether the shader asks for instanced draws
    pub fn is_instanced(&self) -> bool {
        self.shader.instanced
    }

    /// GPU objects, present only while built
    pub fn gpu(&self) -> Option<&MaterialGpu> {
        match self.state {
            MaterialState::Built => self.gpu.as_ref(),
            _ => None,
        }
    }

    fn expect_state(&self, expected: MaterialState) -> RenderResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RenderError::InvalidMaterialState {
                name: self.name.clone(),
                state: self.state.as_str(),
                expected: expected.as_str(),
            })
        }
    }

    /// Attach freshly created GPU objects (`Unbuilt -> Built`)
    pub(crate) fn mark_built(&mut self, gpu: MaterialGpu) -> RenderResult<()> {
        self.expect_state(MaterialState::Unbuilt)?;
        self.gpu = Some(gpu);
        self.state = MaterialState::Built;
        Ok(())
    }

    /// Swap the resource set of a built material, returning the old one
    pub(crate) fn replace_resource_set(&mut self, set: ResourceSetHandle) -> RenderResult<ResourceSetHandle> {
        self.expect_state(MaterialState::Built)?;
        let gpu = self.gpu.as_mut().ok_or_else(|| RenderError::InvalidMaterialState {
            name: self.name.clone(),
            state: "missing gpu objects",
            expected: MaterialState::Built.as_str(),
        })?;
        Ok(std::mem::replace(&mut gpu.resource_set, set))
    }

    /// Hand back the GPU objects for disposal (`* -> Disposed`)
    pub(crate) fn mark_disposed(&mut self) -> Vec<ResourceHandle> {
        self.state = MaterialState::Disposed;
        self.gpu.take().map_or_else(Vec::new, |gpu| {
            vec![
                ResourceHandle::ResourceSet(gpu.resource_set),
                ResourceHandle::Pipeline(gpu.pipeline),
                ResourceHandle::ResourceLayout(gpu.layout),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::resources::materials::PropertyShape;

    fn gpu() -> MaterialGpu {
        MaterialGpu {
            pipeline: PipelineHandle::default(),
            layout: ResourceLayoutHandle::default(),
            resource_set: ResourceSetHandle::default(),
        }
    }

    #[test]
    fn test_state_machine_is_one_way() {
        let shader = ShaderDescriptor::new("lit").with_property("gloss", PropertyShape::Scalar);
        let mut material = Material::new("lit", shader);
        assert_eq!(material.state(), MaterialState::Unbuilt);
        assert!(material.gpu().is_none());

        material.mark_built(gpu()).unwrap();
        assert_eq!(material.state(), MaterialState::Built);
        assert!(material.mark_built(gpu()).is_err());

        assert_eq!(material.mark_disposed().len(), 3);
        assert_eq!(material.state(), MaterialState::Disposed);
        assert!(material.gpu().is_none());
        assert!(matches!(
            material.mark_built(gpu()),
            Err(RenderError::InvalidMaterialState { state: "disposed", .. })
        ));
    }
}
