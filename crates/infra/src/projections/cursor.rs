use std::collections::HashMap;

use stockroom_core::AggregateId;

use super::ProjectionError;

/// Last applied sequence number per stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    last: HashMap<AggregateId, u64>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, aggregate_id: AggregateId) -> u64 {
        self.last.get(&aggregate_id).copied().unwrap_or(0)
    }

    /// `Ok(true)` when `seq` is the next envelope to apply, `Ok(false)` for a
    /// duplicate. A gap is an error: something upstream dropped an event.
    pub fn should_apply(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self.position(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&mut self, aggregate_id: AggregateId, seq: u64) {
        self.last.insert(aggregate_id, seq);
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let mut cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.should_apply(id, 1).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.should_apply(id, 1).unwrap());
        assert!(cursors.should_apply(id, 2).unwrap());
        assert!(matches!(
            cursors.should_apply(id, 4),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        ));
        assert!(cursors.should_apply(id, 0).is_err());
    }
}
