//! TensorAllocator - テンソルバッファの再利用
//!
//! # 方針
//! - (name, shape, kind) ごとに最大 1 本のバッファをプールする
//! - Generator は生のメモリを確保せず、必ずここから取得する
//! - tick の終わりに `recycle` で返却し、episode の切れ目で `reset` する
//!
//! 返却は所有権の移動なので、返却済みバッファを Applier が読むことはできません。

use std::collections::HashMap;

use crate::domain::{ElementKind, TensorData, TensorProxy};
use crate::ports::TensorMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BufferKey {
    name: String,
    shape: Vec<usize>,
    kind: ElementKind,
}

#[derive(Debug, Default)]
pub struct TensorAllocator {
    pool: HashMap<BufferKey, TensorData>,
    fresh_allocations: usize,
}

impl TensorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a zero-filled tensor, reusing a pooled buffer when one matches.
    pub fn alloc(&mut self, name: &str, shape: Vec<usize>, kind: ElementKind) -> TensorProxy {
        let key = BufferKey {
            name: name.to_string(),
            shape: shape.clone(),
            kind,
        };
        let len = shape.iter().product();
        let data = match self.pool.remove(&key) {
            Some(mut data) => {
                zero(&mut data);
                data
            }
            None => {
                self.fresh_allocations += 1;
                TensorData::zeros(kind, len)
            }
        };
        TensorProxy::new(name, shape, data)
    }

    /// Takes a tensor back. Inconsistent tensors are dropped instead of pooled.
    pub fn recycle(&mut self, tensor: TensorProxy) {
        if !tensor.is_consistent() {
            return;
        }
        let key = BufferKey {
            kind: tensor.kind(),
            name: tensor.name,
            shape: tensor.shape,
        };
        self.pool.insert(key, tensor.data);
    }

    pub fn recycle_all(&mut self, tensors: TensorMap) {
        for (_, tensor) in tensors {
            self.recycle(tensor);
        }
    }

    /// Drops every pooled buffer (episode boundary, model swap).
    pub fn reset(&mut self) {
        self.pool.clear();
    }

    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// How many buffers had to be created rather than reused.
    pub fn fresh_allocations(&self) -> usize {
        self.fresh_allocations
    }
}

fn zero(data: &mut TensorData) {
    match data {
        TensorData::Float(v) => v.fill(0.0),
        TensorData::Int(v) => v.fill(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_buffer_is_reused_and_zeroed() {
        let mut alloc = TensorAllocator::new();
        let mut t = alloc.alloc("vector_obs", vec![2, 3], ElementKind::Float);
        t.data.set_f32(4, 9.0);
        alloc.recycle(t);
        assert_eq!(alloc.pooled(), 1);

        let t = alloc.alloc("vector_obs", vec![2, 3], ElementKind::Float);
        assert_eq!(t.data, TensorData::Float(vec![0.0; 6]));
        assert_eq!(alloc.fresh_allocations(), 1);
        assert_eq!(alloc.pooled(), 0);
    }

    #[test]
    fn different_shape_gets_a_fresh_buffer() {
        let mut alloc = TensorAllocator::new();
        let t = alloc.alloc("vector_obs", vec![2, 3], ElementKind::Float);
        alloc.recycle(t);
        let t = alloc.alloc("vector_obs", vec![3, 3], ElementKind::Float);
        assert_eq!(t.data.len(), 9);
        assert_eq!(alloc.fresh_allocations(), 2);
    }

    #[test]
    fn pool_holds_one_buffer_per_key() {
        let mut alloc = TensorAllocator::new();
        let a = alloc.alloc("x", vec![1, 2], ElementKind::Int);
        let b = alloc.alloc("x", vec![1, 2], ElementKind::Int);
        alloc.recycle(a);
        alloc.recycle(b);
        assert_eq!(alloc.pooled(), 1);

        alloc.reset();
        assert_eq!(alloc.pooled(), 0);
    }
}
