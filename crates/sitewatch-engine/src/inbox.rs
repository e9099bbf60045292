//! Per-tick detection input and the inbox detector workers post into.
//!
//! Detectors run slower than the tick rate and on their own schedule. Each
//! worker posts its latest batch into a [`DetectionInbox`]; the tick loop
//! drains the inbox atomically, so a tick sees either the whole batch of a
//! category or nothing for it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use sitewatch_models::{Detection, DetectionCategory};

/// Detections available to a single tick, grouped by detector family.
///
/// A category with no entry (or an empty batch) is an absent observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    batches: BTreeMap<DetectionCategory, Vec<Detection>>,
}

impl TickInput {
    /// Empty input: every category absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for one category.
    pub fn with(mut self, category: DetectionCategory, detections: Vec<Detection>) -> Self {
        self.set(category, detections);
        self
    }

    /// Replace the batch for one category.
    pub fn set(&mut self, category: DetectionCategory, detections: Vec<Detection>) {
        self.batches.insert(category, detections);
    }

    /// Detections for a category, empty if absent.
    pub fn detections(&self, category: DetectionCategory) -> &[Detection] {
        self.batches.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if no category delivered anything.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Thread-safe mailbox holding the latest undelivered batch per category.
#[derive(Debug, Clone, Default)]
pub struct DetectionInbox {
    pending: Arc<Mutex<TickInput>>,
}

impl DetectionInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a detector result. Replaces any batch of the same category
    /// that no tick has consumed yet.
    pub fn post(&self, category: DetectionCategory, detections: Vec<Detection>) {
        self.lock().set(category, detections);
    }

    /// Drain everything posted since the previous call.
    pub fn take(&self) -> TickInput {
        std::mem::take(&mut *self.lock())
    }

    /// Number of categories waiting to be consumed.
    pub fn pending_categories(&self) -> usize {
        self.lock().batches.len()
    }

    fn lock(&self) -> MutexGuard<'_, TickInput> {
        // Poisoned guard still holds a consistent map.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_models::BoundingBox;

    fn person() -> Detection {
        Detection::person(0.9, BoundingBox::new(0.0, 0.0, 10.0, 20.0))
    }

    #[test]
    fn test_absent_category_is_empty() {
        let input = TickInput::new().with(DetectionCategory::Person, vec![person()]);
        assert_eq!(input.detections(DetectionCategory::Person).len(), 1);
        assert!(input.detections(DetectionCategory::Ppe).is_empty());
    }

    #[test]
    fn test_take_drains_inbox() {
        let inbox = DetectionInbox::new();
        inbox.post(DetectionCategory::Person, vec![person()]);
        inbox.post(DetectionCategory::Uc, Vec::new());
        assert_eq!(inbox.pending_categories(), 2);

        let input = inbox.take();
        assert_eq!(input.detections(DetectionCategory::Person).len(), 1);
        assert!(input.detections(DetectionCategory::Uc).is_empty());
        assert_eq!(inbox.pending_categories(), 0);

        assert!(inbox.take().is_empty());
    }

    #[test]
    fn test_latest_post_wins() {
        let inbox = DetectionInbox::new();
        inbox.post(DetectionCategory::Person, vec![person(), person()]);
        inbox.post(DetectionCategory::Person, vec![person()]);

        let input = inbox.take();
        assert_eq!(input.detections(DetectionCategory::Person).len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_posters() {
        let inbox = DetectionInbox::new();

        let handles: Vec<_> = DetectionCategory::ALL
            .iter()
            .map(|&category| {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    inbox.post(category, vec![person()]);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let input = inbox.take();
        for category in DetectionCategory::ALL {
            assert_eq!(input.detections(*category).len(), 1);
        }
    }
}
