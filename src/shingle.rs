//! Shingling of raw points
//!
//! Keeps a sliding window of the last `shingle_size` raw points and emits
//! their concatenation (oldest first) once the window is full.

use std::collections::VecDeque;

use crate::error::{ForestError, Result};

#[derive(Debug, Clone)]
pub struct ShingleBuilder {
    dimensions: usize,
    shingle_size: usize,
    window: VecDeque<Vec<f64>>,
    /// Raw points accepted so far
    points_seen: u64,
}

impl ShingleBuilder {
    pub fn new(dimensions: usize, shingle_size: usize) -> Self {
        Self {
            dimensions,
            shingle_size,
            window: VecDeque::with_capacity(shingle_size),
            points_seen: 0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn shingle_size(&self) -> usize {
        self.shingle_size
    }

    pub fn shingled_dimensions(&self) -> usize {
        self.dimensions * self.shingle_size
    }

    pub fn points_seen(&self) -> u64 {
        self.points_seen
    }

    /// Whether enough points have been seen to form a shingle
    pub fn is_full(&self) -> bool {
        self.window.len() == self.shingle_size
    }

    /// Reject points of the wrong length or with non-finite values
    pub fn check(&self, point: &[f64]) -> Result<()> {
        if point.len() != self.dimensions {
            return Err(ForestError::DimensionMismatch {
                expected: self.dimensions,
                got: point.len(),
            });
        }
        if let Some(index) = point.iter().position(|v| !v.is_finite()) {
            return Err(ForestError::NonFinite { index });
        }
        Ok(())
    }

    /// Add a point to the window, returning the shingle once the window is full
    pub fn push(&mut self, point: &[f64]) -> Result<Option<Vec<f64>>> {
        self.check(point)?;

        if self.window.len() == self.shingle_size {
            self.window.pop_front();
        }
        self.window.push_back(point.to_vec());
        self.points_seen += 1;

        if self.is_full() {
            Ok(Some(self.concat(self.window.iter().map(Vec::as_slice))))
        } else {
            Ok(None)
        }
    }

    /// Shingle that `push(point)` would produce, without touching the window
    pub fn preview(&self, point: &[f64]) -> Result<Vec<f64>> {
        self.check(point)?;
        let mut shingle = self.tail()?;
        shingle.extend_from_slice(point);
        Ok(shingle)
    }

    /// The newest `shingle_size - 1` points, oldest first: the part of the
    /// next shingle already known
    pub fn tail(&self) -> Result<Vec<f64>> {
        let required = self.shingle_size as u64;
        if self.points_seen < required {
            return Err(ForestError::InsufficientHistory {
                seen: self.points_seen,
                required,
            });
        }

        let skip = self.window.len() + 1 - self.shingle_size;
        Ok(self.concat(self.window.iter().skip(skip).map(Vec::as_slice)))
    }

    fn concat<'a>(&self, parts: impl Iterator<Item = &'a [f64]>) -> Vec<f64> {
        let mut shingle = Vec::with_capacity(self.shingled_dimensions());
        for part in parts {
            shingle.extend_from_slice(part);
        }
        shingle
    }
}
