//! Time-driven layer expiry

use crate::cascade::StackEdit;
use crate::error::Result;
use crate::table::LayeredTable;
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};
use veneer_core::EntityId;
use veneer_store::AuthoritativeStore;

impl<S: AuthoritativeStore> LayeredTable<S> {
    /// Expire every layer whose deadline is at or before `now_ms`
    ///
    /// Each due layer is removed with the same cascade as an explicit expiry.
    /// All affected entities are announced together, in the order their first
    /// due layer was created. Returns the number of layers removed, cascades
    /// included. A second call with the same `now_ms` removes nothing.
    #[instrument(level = "debug", skip(self))]
    pub fn compact_layers(&mut self, now_ms: u64) -> Result<usize> {
        if now_ms < self.stack.low_water_mark {
            trace!(now_ms, low_water_mark = self.stack.low_water_mark, "nothing due");
            return Ok(0);
        }

        let mut due: IndexMap<EntityId, Vec<StackEdit>> = IndexMap::new();
        let mut next_deadline = u64::MAX;
        for (layer, record) in self.stack.iter() {
            match record.expires_at {
                Some(deadline) if deadline <= now_ms => {
                    due.entry(record.target)
                        .or_default()
                        .push(StackEdit::Remove(layer));
                }
                Some(deadline) => next_deadline = next_deadline.min(deadline),
                None => {}
            }
        }

        if due.is_empty() {
            self.stack.low_water_mark = next_deadline;
            return Ok(0);
        }

        let plans = due
            .iter()
            .map(|(entity, edits)| self.plan(*entity, edits, None))
            .collect::<Result<Vec<_>>>()?;

        let removed: Vec<_> = due
            .values()
            .flatten()
            .filter_map(|edit| match edit {
                StackEdit::Remove(layer) => Some(*layer),
                _ => None,
            })
            .collect();
        let count = removed.len() + plans.iter().map(|plan| plan.expired.len()).sum::<usize>();
        let ids: Vec<EntityId> = due.keys().copied().collect();

        self.announce(&ids, move |stack| {
            for layer in removed.iter() {
                stack.remove(*layer);
            }
            for plan in plans {
                plan.commit(stack);
            }
            stack.low_water_mark = stack
                .iter()
                .filter_map(|(_, record)| record.expires_at)
                .min()
                .unwrap_or(u64::MAX);
        });

        debug!(now_ms, entities = ids.len(), removed = count, "layers compacted");
        Ok(count)
    }

    /// Expire every layer that is due according to the table clock
    pub fn compact(&mut self) -> Result<usize> {
        let now_ms = self.clock.now_ms();
        self.compact_layers(now_ms)
    }
}
