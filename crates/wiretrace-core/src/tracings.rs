//! Ordered collection of finished tracings and their id allocator.

use crate::tracing::Tracing;
use crate::types::TraceError;

/// Insertion-ordered tracings.
///
/// The collection hands out tracing identifiers. Identifiers increase
/// monotonically and never repeat until [`Tracings::reset`] resets the
/// allocator; pushing a tracing with a higher id raises the counter.
#[derive(Debug, Default)]
pub struct Tracings {
    items: Vec<Tracing>,
    last_id: u32,
}

impl Tracings {
    /// An empty collection whose first allocated id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            last_id: 0,
        }
    }

    /// Reserve the next identifier.
    pub const fn next_id(&mut self) -> u32 {
        self.last_id += 1;
        self.last_id
    }

    /// The most recently reserved or observed identifier.
    #[must_use]
    pub const fn last_id(&self) -> u32 {
        self.last_id
    }

    /// Raise the allocator so later ids come after `id`.
    pub fn observe_id(&mut self, id: u32) {
        self.last_id = self.last_id.max(id);
    }

    /// Append a tracing.
    pub fn push(&mut self, tracing: Tracing) {
        self.observe_id(tracing.id());
        self.items.push(tracing);
    }

    /// Tracing at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Tracing> {
        self.items.get(index)
    }

    /// Mutable tracing at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Tracing> {
        self.items.get_mut(index)
    }

    /// Remove the tracing at `index`, shifting later tracings down.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::IndexOutOfRange`] if `index` is not valid.
    pub fn remove(&mut self, index: usize) -> Result<Tracing, TraceError> {
        if index >= self.items.len() {
            return Err(TraceError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Number of tracings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any tracing needs redrawing.
    #[must_use]
    pub fn any_changed(&self) -> bool {
        self.items.iter().any(Tracing::changed)
    }

    /// Remove every tracing. Identifiers keep counting up.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove every tracing and reset the id allocator.
    pub fn reset(&mut self) {
        self.items.clear();
        self.last_id = 0;
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tracing> {
        self.items.iter()
    }

    /// Iterate mutably in insertion order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Tracing> {
        self.items.iter_mut()
    }
}

impl<'a> IntoIterator for &'a Tracings {
    type Item = &'a Tracing;
    type IntoIter = std::slice::Iter<'a, Tracing>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut Tracings {
    type Item = &'a mut Tracing;
    type IntoIter = std::slice::IterMut<'a, Tracing>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collection(n: u32) -> Tracings {
        let mut ts = Tracings::new();
        for _ in 0..n {
            let id = ts.next_id();
            ts.push(Tracing::new(id));
        }
        ts
    }

    #[test]
    fn ids_increase_monotonically() {
        let ts = collection(3);
        let ids: Vec<u32> = ts.iter().map(Tracing::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn removal_shifts_later_tracings_down() {
        let mut ts = collection(3);
        let removed = ts.remove(1).unwrap();
        assert_eq!(removed.id(), 2);
        assert_eq!(ts.len(), 2);
        assert_eq!(ts.get(1).unwrap().id(), 3);
    }

    #[test]
    fn removal_does_not_reuse_ids() {
        let mut ts = collection(3);
        ts.remove(2).unwrap();
        assert_eq!(ts.next_id(), 4);
    }

    #[test]
    fn out_of_range_removal_is_an_error() {
        let mut ts = collection(2);
        assert!(matches!(
            ts.remove(2),
            Err(TraceError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn pushing_high_id_raises_allocator() {
        let mut ts = Tracings::new();
        ts.push(Tracing::new(41));
        assert_eq!(ts.next_id(), 42);
    }

    #[test]
    fn observed_ids_never_lower_the_allocator() {
        let mut ts = collection(5);
        ts.observe_id(2);
        assert_eq!(ts.last_id(), 5);
        ts.observe_id(9);
        assert_eq!(ts.next_id(), 10);
    }

    #[test]
    fn clear_keeps_allocator_and_reset_restarts_it() {
        let mut ts = collection(5);
        ts.clear();
        assert!(ts.is_empty());
        assert_eq!(ts.next_id(), 6);
        ts.reset();
        assert_eq!(ts.next_id(), 1);
    }

    #[test]
    fn any_changed_reflects_members() {
        let mut ts = Tracings::new();
        ts.push(Tracing::new(1));
        assert!(!ts.any_changed());
        ts.get_mut(0).unwrap().set_highlighted(true);
        assert!(ts.any_changed());
    }
}
