//! Record id generation strategies.

use crate::model::record::RecordId;
use uuid::Uuid;

/// Source of fresh record ids for one store.
pub trait IdGenerator {
    fn next_id(&mut self) -> RecordId;

    /// Restarts the sequence. No-op for generators without state.
    fn reset(&mut self) {}

    /// Called for every id loaded from the slot, so generated ids do not
    /// collide with persisted ones.
    fn observe(&mut self, _existing: &RecordId) {}
}

/// Counter starting at 1; only `reset` rewinds it.
///
/// The counter lives in memory. A new generator resumes after the highest
/// id it observes on load, so once the record holding the highest id is
/// removed, a store reopened later hands that id out again. Use `RandomIds`
/// when ids must stay unique across reopen.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    last: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last id handed out (0 before the first call).
    pub fn last(&self) -> u64 {
        self.last
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> RecordId {
        self.last += 1;
        RecordId::Seq(self.last)
    }

    fn reset(&mut self) {
        self.last = 0;
    }

    fn observe(&mut self, existing: &RecordId) {
        // Digit tokens share their table key with the numeric id.
        let value = match existing {
            RecordId::Seq(value) => Some(*value),
            RecordId::Token(token) => token.parse::<u64>().ok(),
        };
        if let Some(value) = value {
            self.last = self.last.max(value);
        }
    }
}

/// Random UUID v4 tokens (`8-4-4-4-12` hex segments).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> RecordId {
        RecordId::Token(Uuid::new_v4().to_string())
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Box<G> {
    fn next_id(&mut self) -> RecordId {
        (**self).next_id()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn observe(&mut self, existing: &RecordId) {
        (**self).observe(existing)
    }
}
