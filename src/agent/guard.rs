use std::collections::VecDeque;

/// Sliding window over recent action keys.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    window: VecDeque<String>,
    size: usize,
    threshold: usize,
}

impl LoopGuard {
    pub fn new(size: usize, threshold: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(size),
            size: size.max(1),
            threshold: threshold.max(1),
        }
    }

    /// Record `key`; `true` when it now appears `threshold` times in the window.
    pub fn observe(&mut self, key: String) -> bool {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(key);
        let latest = &self.window[self.window.len() - 1];
        self.window.iter().filter(|k| *k == latest).count() >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_repeat_trips() {
        let mut guard = LoopGuard::new(5, 3);
        assert!(!guard.observe("click_button|next".into()));
        assert!(!guard.observe("click_button|next".into()));
        assert!(guard.observe("click_button|next".into()));
    }

    #[test]
    fn repeats_outside_window_are_forgotten() {
        let mut guard = LoopGuard::new(5, 3);
        for key in ["a", "b", "a", "c", "d", "e", "f"] {
            assert!(!guard.observe(key.into()));
        }
        assert!(!guard.observe("a".into()));
        assert!(!guard.observe("a".into()));
        assert!(guard.observe("a".into()));
    }
}
