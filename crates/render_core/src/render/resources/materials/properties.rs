//! Material property values and packing
//!
//! Properties are packed into one flat `f32` block in declaration order. A
//! `Vec3` or `Vec4` that would start at an odd float offset is preceded by a
//! single zero pad float, so `[Scalar, Vec3]` packs to 5 floats and `[Vec4]`
//! to 4.

use super::shader::{PropertyShape, ShaderDescriptor};

/// A material constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    /// One float
    Scalar(f32),
    /// Two floats
    Vec2([f32; 2]),
    /// Three floats
    Vec3([f32; 3]),
    /// Four floats
    Vec4([f32; 4]),
}

impl PropertyValue {
    /// Default for a freshly built material: scalars are 1, vectors zero
    pub const fn default_for(shape: PropertyShape) -> Self {
        match shape {
            PropertyShape::Scalar => Self::Scalar(1.0),
            PropertyShape::Vec2 => Self::Vec2([0.0; 2]),
            PropertyShape::Vec3 => Self::Vec3([0.0; 3]),
            PropertyShape::Vec4 => Self::Vec4([0.0; 4]),
        }
    }

    /// Shape of the value
    pub const fn shape(&self) -> PropertyShape {
        match self {
            Self::Scalar(_) => PropertyShape::Scalar,
            Self::Vec2(_) => PropertyShape::Vec2,
            Self::Vec3(_) => PropertyShape::Vec3,
            Self::Vec4(_) => PropertyShape::Vec4,
        }
    }

    /// Components as a slice
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Vec2(values) => values,
            Self::Vec3(values) => values,
            Self::Vec4(values) => values,
        }
    }
}

/// Append values to `out` following the padding rule
pub fn pack_values<'a>(values: impl IntoIterator<Item = &'a PropertyValue>, out: &mut Vec<f32>) {
    for value in values {
        let wide = matches!(value.shape(), PropertyShape::Vec3 | PropertyShape::Vec4);
        if wide && out.len() % 2 == 1 {
            out.push(0.0);
        }
        out.extend_from_slice(value.as_slice());
    }
}

/// Floats a descriptor's properties occupy once packed
pub fn packed_len(descriptor: &ShaderDescriptor) -> usize {
    let defaults: Vec<_> = descriptor
        .ordered_properties()
        .iter()
        .map(|property| PropertyValue::default_for(property.shape))
        .collect();
    let mut packed = Vec::new();
    pack_values(&defaults, &mut packed);
    packed.len()
}

/// A material's property values, kept in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialProperties {
    entries: Vec<(String, PropertyValue)>,
}

impl MaterialProperties {
    /// Default-initialized properties for a descriptor
    pub fn from_descriptor(descriptor: &ShaderDescriptor) -> Self {
        Self {
            entries: descriptor
                .ordered_properties()
                .into_iter()
                .map(|property| (property.name.clone(), PropertyValue::default_for(property.shape)))
                .collect(),
        }
    }

    /// Value of a property
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Replace a property value
    ///
    /// Returns the declared shape as the error when the name is known but the
    /// shape differs, and `None` inside the error for an unknown name.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), Option<PropertyShape>> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(entry, _)| entry == name)
            .map(|(_, slot)| slot)
            .ok_or(None)?;
        if slot.shape() != value.shape() {
            return Err(Some(slot.shape()));
        }
        *slot = value;
        Ok(())
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pack into `out` (cleared first)
    pub fn pack_into(&self, out: &mut Vec<f32>) {
        out.clear();
        pack_values(self.entries.iter().map(|(_, value)| value), out);
    }

    /// Packed block
    pub fn packed(&self) -> Vec<f32> {
        let mut out = Vec::new();
        self.pack_into(&mut out);
        out
    }
}
