//! Tensor model: signatures (`TensorSpec`) and concrete tensors (`TensorProxy`).
//!
//! A signature describes what a model declares; a proxy is one concrete tensor
//! bound to the current batch size for a single decision tick.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Float,
    Int,
}

/// One dimension of a declared shape.
///
/// `Batch` is the symbolic batch axis; it is bound to the number of agents
/// when a proxy is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    Batch,
    Fixed(usize),
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Batch => write!(f, "N"),
            Dim::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// A declared tensor in a model signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Dim>,
    pub element_kind: ElementKind,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<Dim>, element_kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            shape,
            element_kind,
        }
    }

    /// `[N, width]` float tensor.
    pub fn batched(name: impl Into<String>, width: usize) -> Self {
        Self::new(name, vec![Dim::Batch, Dim::Fixed(width)], ElementKind::Float)
    }

    pub fn with_kind(mut self, element_kind: ElementKind) -> Self {
        self.element_kind = element_kind;
        self
    }

    /// Whether dimension 0 is the batch axis.
    pub fn is_batched(&self) -> bool {
        matches!(self.shape.first(), Some(Dim::Batch))
    }

    /// Fixed dimensions after the batch axis (the per-agent row shape).
    ///
    /// Returns `None` if any of them is symbolic.
    pub fn row_dims(&self) -> Option<Vec<usize>> {
        let rest = if self.is_batched() {
            &self.shape[1..]
        } else {
            &self.shape[..]
        };
        rest.iter()
            .map(|d| match d {
                Dim::Fixed(n) => Some(*n),
                Dim::Batch => None,
            })
            .collect()
    }

    /// Number of elements in one per-agent row.
    pub fn row_width(&self) -> Option<usize> {
        self.row_dims().map(|dims| dims.iter().product())
    }

    /// Concrete shape with the batch axis bound to `batch_size`.
    pub fn bind(&self, batch_size: usize) -> Vec<usize> {
        self.shape
            .iter()
            .map(|d| match d {
                Dim::Batch => batch_size,
                Dim::Fixed(n) => *n,
            })
            .collect()
    }

    /// Checks a concrete shape against this declaration.
    pub fn accepts_shape(&self, shape: &[usize]) -> bool {
        shape.len() == self.shape.len()
            && self.shape.iter().zip(shape).all(|(d, s)| match d {
                Dim::Batch => true,
                Dim::Fixed(n) => n == s,
            })
    }

    pub fn shape_display(&self) -> String {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        format!("[{}]", dims.join(", "))
    }
}

/// Flat element storage of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float(Vec<f32>),
    Int(Vec<i32>),
}

impl TensorData {
    pub fn zeros(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::Float => TensorData::Float(vec![0.0; len]),
            ElementKind::Int => TensorData::Int(vec![0; len]),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            TensorData::Float(_) => ElementKind::Float,
            TensorData::Int(_) => ElementKind::Int,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Float(v) => v.len(),
            TensorData::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` widened to f32.
    pub fn get_f32(&self, i: usize) -> Option<f32> {
        match self {
            TensorData::Float(v) => v.get(i).copied(),
            TensorData::Int(v) => v.get(i).map(|x| *x as f32),
        }
    }

    /// Writes `value` at `i`, converting to the storage kind.
    pub fn set_f32(&mut self, i: usize, value: f32) {
        match self {
            TensorData::Float(v) => v[i] = value,
            TensorData::Int(v) => v[i] = value.round() as i32,
        }
    }
}

/// A concrete tensor for one tick: shape bound to the current batch size.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorProxy {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl TensorProxy {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    pub fn from_f32(name: impl Into<String>, shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self::new(name, shape, TensorData::Float(values))
    }

    pub fn from_i32(name: impl Into<String>, shape: Vec<usize>, values: Vec<i32>) -> Self {
        Self::new(name, shape, TensorData::Int(values))
    }

    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }

    /// Size of dimension 0 (0 for a rank-0 tensor).
    pub fn batch_len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Elements per row along dimension 0.
    pub fn row_width(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    /// Whether the element count matches the shape.
    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }

    /// Row `i` widened to f32.
    pub fn row_f32(&self, i: usize) -> Vec<f32> {
        let width = self.row_width();
        let start = i * width;
        (start..start + width)
            .filter_map(|j| self.data.get_f32(j))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_replaces_batch_axis() {
        let spec = TensorSpec::new(
            "visual_obs_0",
            vec![Dim::Batch, Dim::Fixed(4), Dim::Fixed(5), Dim::Fixed(3)],
            ElementKind::Float,
        );
        assert_eq!(spec.bind(7), vec![7, 4, 5, 3]);
        assert_eq!(spec.row_width(), Some(60));
        assert!(spec.accepts_shape(&[2, 4, 5, 3]));
        assert!(!spec.accepts_shape(&[2, 4, 5, 1]));
    }

    #[test]
    fn scalar_spec_is_not_batched() {
        let spec = TensorSpec::new("batch_size", vec![Dim::Fixed(1)], ElementKind::Int);
        assert!(!spec.is_batched());
        assert_eq!(spec.bind(9), vec![1]);
    }

    #[test]
    fn proxy_rows_are_sliced_along_dim_zero() {
        let t = TensorProxy::from_f32("x", vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(t.is_consistent());
        assert_eq!(t.row_f32(1), vec![4.0, 5.0, 6.0]);

        let i = TensorProxy::from_i32("y", vec![2, 1], vec![3, 1]);
        assert_eq!(i.row_f32(0), vec![3.0]);
    }

    #[test]
    fn spec_json_shape() {
        let spec = TensorSpec::batched("vector_obs", 8);
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["shape"][0], "batch");
        assert_eq!(v["shape"][1]["fixed"], 8);
        assert_eq!(v["element_kind"], "float");
    }
}
