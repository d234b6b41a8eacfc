//! Sliding Window Bounds

use crate::FeatureError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Window size and stride, both positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub size: usize,
    pub stride: usize,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self { size: 7, stride: 1 }
    }
}

impl WindowSpec {
    pub fn new(size: usize, stride: usize) -> Result<Self, FeatureError> {
        let spec = Self { size, stride };
        spec.validate()?;
        Ok(spec)
    }

    /// Reject zero sizes (also needed after deserializing)
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.size == 0 || self.stride == 0 {
            return Err(FeatureError::InvalidWindow {
                size: self.size,
                stride: self.stride,
            });
        }
        Ok(())
    }

    /// Number of windows over a sequence of `len`: `ceil((len - size + 1) / stride)`,
    /// zero when the sequence is shorter than one window
    pub fn count(&self, len: usize) -> usize {
        if self.size == 0 || self.stride == 0 || len < self.size {
            return 0;
        }
        (len - self.size) / self.stride + 1
    }

    /// Lazy iterator over window ranges of a sequence of `len`
    pub fn bounds(&self, len: usize) -> WindowBounds {
        WindowBounds {
            len,
            size: self.size,
            stride: self.stride,
            next: 0,
            remaining: self.count(len),
        }
    }
}

/// Iterator over `[start, end)` ranges, starting at `0, stride, 2 * stride, ...`
/// while `start <= len - size`; each end is clamped to `len`.
#[derive(Debug, Clone)]
pub struct WindowBounds {
    len: usize,
    size: usize,
    stride: usize,
    next: usize,
    remaining: usize,
}

impl Iterator for WindowBounds {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.size).min(self.len);
        self.next = start.saturating_add(self.stride);
        self.remaining -= 1;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for WindowBounds {}
