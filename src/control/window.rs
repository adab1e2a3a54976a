use std::collections::VecDeque;

/// Fixed-capacity window of recent (x, y) errors.
///
/// Pushing into a full window evicts the oldest pair, which keeps the
/// integral term bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorWindow {
    items: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl ErrorWindow {
    /// # Panics
    /// Panics if capacity is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ErrorWindow capacity must be greater than 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, error_x: f64, error_y: f64) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back((error_x, error_y));
    }

    /// Per-axis sum, accumulated oldest to newest.
    pub fn sums(&self) -> (f64, f64) {
        self.items
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut window = ErrorWindow::new(3);
        for i in 1..=5 {
            window.push(i as f64, -(i as f64));
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.sums(), (12.0, -12.0));
    }

    #[test]
    fn test_clear() {
        let mut window = ErrorWindow::new(2);
        window.push(1.0, 1.0);
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.sums(), (0.0, 0.0));
        assert_eq!(window.capacity(), 2);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        ErrorWindow::new(0);
    }
}
