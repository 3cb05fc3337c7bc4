//! Breakpoints
//!
//! A shared breakpoint set keyed by statement index. Clones share the same
//! set, so a console can edit breakpoints while the engine holds the hook
//! returned by [`Breakpoints::hook`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ═══════════════════════════════════════════════════════════════════════════════
// BREAKPOINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Breakpoint on a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Unique id
    pub id: u32,
    /// 0-based statement index
    pub index: usize,
    pub enabled: bool,
    /// Times execution paused here
    pub hit_count: u32,
}

impl Breakpoint {
    pub fn new(id: u32, index: usize) -> Self {
        Self {
            id,
            index,
            enabled: true,
            hit_count: 0,
        }
    }

    /// 1-based source line
    pub fn line(&self) -> usize {
        self.index + 1
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BREAKPOINT SET
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Inner {
    by_index: BTreeMap<usize, Breakpoint>,
    next_id: u32,
}

/// Shared breakpoint set
#[derive(Debug, Clone, Default)]
pub struct Breakpoints {
    inner: Arc<Mutex<Inner>>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or re-enables) a breakpoint, returning its id
    pub fn add(&self, index: usize) -> u32 {
        let mut inner = self.lock();
        if let Some(bp) = inner.by_index.get_mut(&index) {
            bp.enabled = true;
            return bp.id;
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.by_index.insert(index, Breakpoint::new(id, index));
        id
    }

    /// Removes the breakpoint at `index`
    pub fn remove(&self, index: usize) -> bool {
        self.lock().by_index.remove(&index).is_some()
    }

    pub fn remove_by_id(&self, id: u32) -> bool {
        let mut inner = self.lock();
        let index = inner
            .by_index
            .values()
            .find(|bp| bp.id == id)
            .map(|bp| bp.index);
        match index {
            Some(index) => inner.by_index.remove(&index).is_some(),
            None => false,
        }
    }

    /// Flips enabled; `None` if there is no breakpoint at `index`
    pub fn toggle(&self, index: usize) -> Option<bool> {
        let mut inner = self.lock();
        let bp = inner.by_index.get_mut(&index)?;
        bp.enabled = !bp.enabled;
        Some(bp.enabled)
    }

    pub fn set_enabled(&self, index: usize, enabled: bool) -> bool {
        match self.lock().by_index.get_mut(&index) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.lock().by_index.contains_key(&index)
    }

    pub fn hit_count(&self, index: usize) -> Option<u32> {
        self.lock().by_index.get(&index).map(|bp| bp.hit_count)
    }

    /// Breakpoints ordered by statement index
    pub fn list(&self) -> Vec<Breakpoint> {
        self.lock().by_index.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_index.is_empty()
    }

    pub fn clear(&self) {
        self.lock().by_index.clear();
    }

    /// True (and counts a hit) when an enabled breakpoint sits at `index`
    pub fn should_break(&self, index: usize) -> bool {
        match self.lock().by_index.get_mut(&index) {
            Some(bp) if bp.enabled => {
                bp.hit_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Hook suitable for `Engine::set_breakpoint_hook`
    pub fn hook(&self) -> impl FnMut(usize) -> bool + Send + 'static {
        let breakpoints = self.clone();
        move |index| breakpoints.should_break(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let bps = Breakpoints::new();
        let id = bps.add(3);
        assert_eq!(bps.add(3), id);
        assert_ne!(bps.add(7), id);
        assert_eq!(bps.len(), 2);

        assert!(bps.remove(3));
        assert!(!bps.remove(3));
        assert!(bps.remove_by_id(id + 1));
        assert!(bps.is_empty());
    }

    #[test]
    fn test_toggle_and_hits() {
        let bps = Breakpoints::new();
        bps.add(2);
        assert!(bps.should_break(2));
        assert!(!bps.should_break(1));
        assert_eq!(bps.hit_count(2), Some(1));

        assert_eq!(bps.toggle(2), Some(false));
        assert!(!bps.should_break(2));
        assert_eq!(bps.hit_count(2), Some(1));
        assert_eq!(bps.toggle(9), None);

        bps.add(2);
        assert!(bps.should_break(2));
    }

    #[test]
    fn test_list_is_ordered() {
        let bps = Breakpoints::new();
        bps.add(10);
        bps.add(1);
        bps.add(5);
        let lines: Vec<usize> = bps.list().iter().map(Breakpoint::line).collect();
        assert_eq!(lines, vec![2, 6, 11]);
        bps.clear();
        assert!(bps.list().is_empty());
    }

    #[test]
    fn test_hook_shares_the_set() {
        let bps = Breakpoints::new();
        let mut hook = bps.hook();
        assert!(!hook(4));
        bps.add(4);
        assert!(hook(4));
        assert!(bps.set_enabled(4, false));
        assert!(!hook(4));
    }
}
