// Dense row-major f32 buffers and per-layer parameter records

use serde::{Deserialize, Serialize};

/// Row-major tensor with an explicit shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    /// Build from a flat buffer; `None` when the buffer does not fill `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        Some(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at `(row, col)` of a 2-D tensor
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.shape[1] + col]
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// Copy of one layer's trainable parameters
///
/// Every field owns its buffers: a record taken from a live network never
/// aliases memory the optimizer keeps writing to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameters {
    pub layer: String,
    pub weights: Tensor,
    pub bias: Option<Tensor>,
}

impl LayerParameters {
    pub fn weight_shape(&self) -> &[usize] {
        self.weights.shape()
    }

    pub fn bias_shape(&self) -> Option<&[usize]> {
        self.bias.as_ref().map(|b| b.shape())
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_shape() {
        let t = Tensor::zeros(&[3, 4]);
        assert_eq!(t.shape(), &[3, 4]);
        assert_eq!(t.len(), 12);
        assert!(t.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Tensor::from_vec(&[2, 2], vec![1.0, 2.0, 3.0]).is_none());
        let t = Tensor::from_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.at(1, 0), 3.0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut live = Tensor::zeros(&[2]);
        let copy = live.clone();
        live.data_mut()[0] = 5.0;
        assert_eq!(copy.data()[0], 0.0);
    }
}
