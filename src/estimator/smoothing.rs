// Moving-average smoothing over a bounded FIFO window

use std::collections::VecDeque;

use super::angles::{AngleTriple, Sample};

/// Three-component value that can be averaged component-wise
pub trait Componentwise: Copy {
    fn components(&self) -> [f64; 3];
    fn from_components(components: [f64; 3]) -> Self;
}

impl Componentwise for Sample {
    fn components(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn from_components([x, y, z]: [f64; 3]) -> Self {
        Sample { x, y, z }
    }
}

impl Componentwise for AngleTriple {
    fn components(&self) -> [f64; 3] {
        [self.pitch, self.roll, self.yaw]
    }

    fn from_components([pitch, roll, yaw]: [f64; 3]) -> Self {
        AngleTriple { pitch, roll, yaw }
    }
}

/// Push `value` into `window`, evict the oldest entries beyond `capacity`,
/// and return the component-wise mean of what remains.
///
/// A capacity of 0 is treated as 1.
pub fn smooth<T: Componentwise>(value: T, window: &mut VecDeque<T>, capacity: usize) -> T {
    let capacity = capacity.max(1);
    window.push_back(value);
    while window.len() > capacity {
        window.pop_front();
    }

    let mut sum = [0.0; 3];
    for entry in window.iter() {
        for (acc, component) in sum.iter_mut().zip(entry.components()) {
            *acc += component;
        }
    }

    let len = window.len() as f64;
    T::from_components(sum.map(|total| total / len))
}

/// Owned smoothing window with a fixed capacity
#[derive(Debug, Clone)]
pub struct SmoothingWindow<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Componentwise> SmoothingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a value and return the smoothed output
    pub fn push(&mut self, value: T) -> T {
        smooth(value, &mut self.entries, self.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest-first view of the retained values
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
