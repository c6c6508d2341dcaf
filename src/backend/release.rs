// Release stack
//
// Each bring-up stage registers how to destroy what it just created.
// Releasing pops in LIFO order, so destruction is always the exact reverse
// of creation, whether we shut down normally or bail out half way through
// bring-up (the stack is dropped on the error path too).

use super::error::Stage;

/// Ordered set of pending destructors, released last-in first-out
pub struct ReleaseStack {
    entries: Vec<(Stage, Box<dyn FnOnce()>)>,
}

impl ReleaseStack {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register a destructor for an object that was just created.
    ///
    /// Stages must arrive in `Stage` declaration order (skipping is fine, a
    /// stage may repeat), otherwise teardown would not be the documented
    /// reverse order.
    pub fn push(&mut self, stage: Stage, release: impl FnOnce() + 'static) {
        if let Some((last, _)) = self.entries.last() {
            debug_assert!(
                *last <= stage,
                "{} registered after {}, out of creation order",
                stage,
                last
            );
        }
        log::debug!("Created {}", stage);
        self.entries.push((stage, Box::new(release)));
    }

    /// Registered stages, oldest first
    pub fn stages(&self) -> Vec<Stage> {
        self.entries.iter().map(|(stage, _)| *stage).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every pending destructor, most recent first. Each runs once.
    pub fn release_all(&mut self) {
        while let Some((stage, release)) = self.entries.pop() {
            log::debug!("Destroying {}", stage);
            release();
        }
    }
}

impl Default for ReleaseStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReleaseStack {
    fn drop(&mut self) {
        self.release_all();
    }
}
