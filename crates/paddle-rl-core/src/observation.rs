//! Observation representations

use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Get the shape of the observation
    fn shape(&self) -> Vec<usize>;
}

/// Shape of a stacked-frame observation (stack depth, height, width)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameShape {
    /// Number of stacked frames
    pub channels: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Frame width in pixels
    pub width: usize,
}

impl FrameShape {
    /// Create a new frame shape
    #[must_use]
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of scalars in one observation
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Whether the shape holds no scalars
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse an environment's `[channels, height, width]` shape
    pub fn from_dims(dims: &[usize]) -> crate::Result<Self> {
        match *dims {
            [channels, height, width] if channels * height * width > 0 => {
                Ok(Self::new(channels, height, width))
            }
            _ => Err(crate::RLError::Config(format!(
                "expected a non-empty [channels, height, width] observation shape, got {dims:?}"
            ))),
        }
    }
}

/// Preprocessed observation: `channels` grayscale frames, flattened row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedFrames {
    data: Vec<f32>,
    shape: FrameShape,
}

impl StackedFrames {
    /// Wrap flattened frame data, checking it matches `shape`
    pub fn new(data: Vec<f32>, shape: FrameShape) -> crate::Result<Self> {
        if data.len() != shape.len() {
            return Err(crate::RLError::DimensionMismatch {
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// All-zero observation
    #[must_use]
    pub fn zeros(shape: FrameShape) -> Self {
        Self {
            data: vec![0.0; shape.len()],
            shape,
        }
    }

    /// Shape of this observation
    #[must_use]
    pub fn frame_shape(&self) -> FrameShape {
        self.shape
    }

    /// Flattened pixel data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// View as a (channels, height, width) array
    pub fn view(&self) -> crate::Result<ArrayView3<'_, f32>> {
        let shape = (self.shape.channels, self.shape.height, self.shape.width);
        Ok(ArrayView3::from_shape(shape, &self.data)?)
    }
}

impl Observation for StackedFrames {
    fn shape(&self) -> Vec<usize> {
        vec![self.shape.channels, self.shape.height, self.shape.width]
    }
}

/// Stack observations into a `(batch, features)` matrix
pub fn batch_observations<'a, I>(observations: I, shape: FrameShape) -> crate::Result<Array2<f32>>
where
    I: IntoIterator<Item = &'a StackedFrames>,
{
    let features = shape.len();
    let mut flat = Vec::new();
    let mut rows = 0;
    for obs in observations {
        if obs.data.len() != features {
            return Err(crate::RLError::DimensionMismatch {
                expected: features,
                actual: obs.data.len(),
            });
        }
        flat.extend_from_slice(&obs.data);
        rows += 1;
    }
    Ok(Array2::from_shape_vec((rows, features), flat)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let shape = FrameShape::new(2, 2, 2);
        let err = StackedFrames::new(vec![0.0; 7], shape).unwrap_err();
        assert!(matches!(
            err,
            crate::RLError::DimensionMismatch { expected: 8, actual: 7 }
        ));
    }

    #[test]
    fn test_frame_shape_from_dims() {
        assert_eq!(FrameShape::from_dims(&[4, 20, 20]).unwrap(), FrameShape::new(4, 20, 20));
        assert!(FrameShape::from_dims(&[4, 20]).is_err());
        assert!(FrameShape::from_dims(&[0, 20, 20]).is_err());
    }

    #[test]
    fn test_batch_rows_follow_input_order() {
        let shape = FrameShape::new(1, 1, 2);
        let a = StackedFrames::new(vec![1.0, 2.0], shape).unwrap();
        let b = StackedFrames::new(vec![3.0, 4.0], shape).unwrap();
        let batch = batch_observations([&a, &b], shape).unwrap();
        assert_eq!(batch.dim(), (2, 2));
        assert_eq!(batch.row(1).to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_view_shape() {
        let shape = FrameShape::new(4, 3, 2);
        let obs = StackedFrames::zeros(shape);
        assert_eq!(obs.view().unwrap().dim(), (4, 3, 2));
        assert_eq!(obs.shape(), vec![4, 3, 2]);
    }
}
