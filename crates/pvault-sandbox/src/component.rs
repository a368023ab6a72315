//! Memoized UI components.
//!
//! A [`Memo`] caches the node rendered for the last-seen props and re-renders
//! only when the props change (serialized comparison, like the original
//! `component()` helper). The replaced node is handed to an explicit unmount
//! callback so the owner can detach any bookkeeping tied to it — nothing is
//! left to implicit collection.

use serde::Serialize;

/// A cache from one props identity to one rendered node.
#[derive(Debug, Default)]
pub struct Memo<T> {
    prev: Option<(String, T)>,
}

impl<T> Memo<T> {
    /// An empty cache.
    pub fn new() -> Self {
        Self { prev: None }
    }

    /// Render `props`, reusing the cached node when props are unchanged.
    ///
    /// On change the previously rendered node is passed to `unmount` before
    /// the new one is built.
    pub fn render<P: Serialize>(
        &mut self,
        props: &P,
        render: impl FnOnce(&P) -> T,
        unmount: impl FnOnce(T),
    ) -> &T {
        let key = serde_json::to_string(props).unwrap_or_default();
        let changed = self
            .prev
            .as_ref()
            .is_none_or(|(prev_key, _)| *prev_key != key);

        if changed {
            if let Some((_, old)) = self.prev.take() {
                unmount(old);
            }
            let node = render(props);
            return &self.prev.insert((key, node)).1;
        }

        match &self.prev {
            Some((_, node)) => node,
            // unreachable: !changed implies a cached node
            None => unreachable!(),
        }
    }

    /// Drop the cached node through `unmount`, leaving the cache empty.
    pub fn clear(&mut self, unmount: impl FnOnce(T)) {
        if let Some((_, old)) = self.prev.take() {
            unmount(old);
        }
    }

    /// The cached node, if any.
    pub fn current(&self) -> Option<&T> {
        self.prev.as_ref().map(|(_, node)| node)
    }
}
