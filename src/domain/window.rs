//! Fixed-size FIFO window used by the confirmation and buyback filters

use std::collections::VecDeque;

/// Rolling window that evicts the oldest entry once `capacity` is reached
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: Copy> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, returning the evicted one when the window was full
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl RollingWindow<f64> {
    /// Every value is at or below the previous one
    pub fn non_increasing(&self) -> bool {
        self.items.iter().zip(self.items.iter().skip(1)).all(|(a, b)| b <= a)
    }

    /// Every value is at or above the previous one
    pub fn non_decreasing(&self) -> bool {
        self.items.iter().zip(self.items.iter().skip(1)).all(|(a, b)| b >= a)
    }

    /// Number of values satisfying `pred`
    pub fn count_where(&self, pred: impl Fn(f64) -> bool) -> usize {
        self.items.iter().filter(|v| pred(**v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        assert_eq!(window.push(1.0), None);
        assert_eq!(window.push(2.0), None);
        assert_eq!(window.push(3.0), None);
        assert!(window.is_full());

        assert_eq!(window.push(4.0), Some(1.0));
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_monotonic_helpers() {
        let mut window = RollingWindow::new(3);
        for v in [3.0, 3.0, 2.0] {
            window.push(v);
        }
        assert!(window.non_increasing());
        assert!(!window.non_decreasing());

        window.push(5.0);
        assert!(!window.non_increasing());
    }

    #[test]
    fn test_count_where() {
        let mut window = RollingWindow::new(5);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(v);
        }
        assert_eq!(window.count_where(|v| v >= 3.0), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = RollingWindow::new(0);
        assert_eq!(window.push(1.0), None);
        assert!(window.is_full());
        assert_eq!(window.push(2.0), Some(1.0));
    }

    #[test]
    fn test_flags_window() {
        let mut crossed = RollingWindow::new(2);
        crossed.push(false);
        crossed.push(true);
        assert!(crossed.iter().any(|c| *c));
        crossed.push(false);
        crossed.push(false);
        assert!(!crossed.iter().any(|c| *c));
    }
}
