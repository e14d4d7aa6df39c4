//! Process-wide array pool and inter-command garbage sweep.
//!
//! Every freshly constructed array is pushed onto the pool before it can
//! become reachable from any variable or expression node; that ordering is
//! the one cross-subsystem invariant of the value model. Between top-level
//! commands the session runs `sweep` with the global variable table as the
//! root set. After a sweep, every reachable array appears exactly once on
//! the pool; unreachable arrays have their elements cleared (breaking any
//! reference cycles) and are dropped.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::{ArrayData, ArrayRef, Datum};

#[derive(Debug, Default)]
pub struct ArrayPool {
    list: Vec<ArrayRef>,
}

impl ArrayPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new array holding `elems` and register it on the pool.
    pub fn alloc(&mut self, elems: Vec<Datum>) -> ArrayRef {
        let array = ArrayRef(Rc::new(RefCell::new(ArrayData {
            elems,
            visited: false,
        })));
        self.list.push(array.clone());
        array
    }

    /// Number of arrays currently registered.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Mark-and-sweep over the pool with the given root set.
    ///
    /// 1. Clear every visited flag.
    /// 2. Walk the roots marking reachable arrays; the visited flag stops
    ///    recursion into self-referential arrays.
    /// 3. Ensure every reachable array appears exactly once on the pool
    ///    (re-registering any that were dropped from it earlier).
    /// 4. Unlink every unmarked array, clearing its elements so cyclic
    ///    references are actually freed.
    pub fn sweep<'a>(&mut self, roots: impl Iterator<Item = &'a Datum>) {
        for array in &self.list {
            array.0.borrow_mut().visited = false;
        }

        let mut reachable: Vec<ArrayRef> = Vec::new();
        for root in roots {
            mark(root, &mut reachable);
        }

        // Rebuild the list as exactly the reachable set (each once), in
        // first-marked order. Arrays reachable but missing from the old list
        // are adopted here.
        let before = self.list.len();
        let mut dead: Vec<ArrayRef> = Vec::new();
        for array in self.list.drain(..) {
            if !array.0.borrow().visited {
                dead.push(array);
            }
        }
        self.list = reachable;

        for array in dead {
            // Clearing elements breaks Rc cycles among unreachable arrays.
            array.0.borrow_mut().elems.clear();
        }
        trace!(
            target: "value.pool",
            before,
            after = self.list.len(),
            "sweep"
        );
    }
}

fn mark(datum: &Datum, reachable: &mut Vec<ArrayRef>) {
    if let Datum::Array(array) = datum {
        {
            let mut data = array.0.borrow_mut();
            if data.visited {
                return;
            }
            data.visited = true;
        }
        reachable.push(array.clone());
        let elems = array.0.borrow().elems.clone();
        for elem in &elems {
            mark(elem, reachable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_arrays_are_freed() {
        let mut pool = ArrayPool::new();
        let kept = pool.alloc(vec![Datum::Int(1)]);
        let _dropped = pool.alloc(vec![Datum::Int(2)]);
        assert_eq!(pool.len(), 2);

        let root = Datum::Array(kept.clone());
        pool.sweep(std::iter::once(&root));
        assert_eq!(pool.len(), 1);
        assert_eq!(kept.get(0), Some(Datum::Int(1)));
    }

    #[test]
    fn reachable_appears_exactly_once_after_sweep() {
        let mut pool = ArrayPool::new();
        let a = pool.alloc(vec![]);
        // Nested twice under one root; must still be listed once.
        let outer = pool.alloc(vec![Datum::Array(a.clone()), Datum::Array(a.clone())]);
        let root = Datum::Array(outer);
        pool.sweep(std::iter::once(&root));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn self_referential_array_survives_and_terminates() {
        let mut pool = ArrayPool::new();
        let a = pool.alloc(vec![]);
        a.push(Datum::Array(a.clone()));
        let root = Datum::Array(a.clone());
        pool.sweep(std::iter::once(&root));
        assert_eq!(pool.len(), 1);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn unreachable_cycle_is_broken() {
        let mut pool = ArrayPool::new();
        let a = pool.alloc(vec![]);
        let b = pool.alloc(vec![Datum::Array(a.clone())]);
        a.push(Datum::Array(b.clone()));
        drop(b);
        // Neither is rooted; both must leave the pool and their links must
        // be severed so the Rc graph actually drops.
        pool.sweep(std::iter::empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn nested_roots_mark_recursively() {
        let mut pool = ArrayPool::new();
        let inner = pool.alloc(vec![Datum::Int(9)]);
        let outer = pool.alloc(vec![Datum::Array(inner.clone())]);
        let root = Datum::Array(outer);
        pool.sweep(std::iter::once(&root));
        assert_eq!(pool.len(), 2);
        assert_eq!(inner.get(0), Some(Datum::Int(9)));
    }
}
