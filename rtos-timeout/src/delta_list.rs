use core::cell::Cell;
use core::fmt;
use critical_section::{self as cs, CriticalSection, Mutex};

use crate::Ticks;

/// Callback invoked, exactly once per arming, when a [`TimeoutNode`] expires.
///
/// The node is already unlinked when the callback runs, so the callback may
/// re-arm it.
pub type TimeoutFn = fn(&'static TimeoutNode);

/// One pending expiration.
///
/// A `TimeoutNode` is owned by its caller (a wait block, a software timer, ...)
/// and is only ever *linked* into a [`TimeoutQueue`]; the queue never allocates
/// or frees nodes. Nodes must be `'static`, either as `static` items or leaked
/// allocations, because a linked node is referenced by its neighbours.
///
/// [`TimeoutQueue`]: crate::TimeoutQueue
pub struct TimeoutNode {
    param: usize,
    links: Mutex<Links>,
}

/// The part of a node owned by the list it is linked into.
pub(crate) struct Links {
    /// Ticks after the previous node (or after "now" for the head).
    delta_ticks: Cell<Ticks>,
    prev: Cell<Option<&'static TimeoutNode>>,
    next: Cell<Option<&'static TimeoutNode>>,
    /// `Some` iff the node is linked, naming the list it is linked into.
    owner: Cell<Option<ListId>>,
    callback: Cell<TimeoutFn>,
}

fn no_callback(_: &'static TimeoutNode) {}

/// Identity of a [`DeltaList`], used to reject nodes that belong to another
/// list. Assigned from a counter rather than derived from the list's address,
/// so lists may be moved while nodes are linked.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ListId(usize);

static NEXT_LIST_ID: Mutex<Cell<usize>> = Mutex::new(Cell::new(1));

impl TimeoutNode {
    /// Create an unlinked node with a `param` of zero.
    pub const fn new() -> Self {
        Self::with_param(0)
    }

    /// Create an unlinked node carrying `param`, which the callback can read
    /// back with [`TimeoutNode::param`] to find the object owning the node.
    pub const fn with_param(param: usize) -> Self {
        Self {
            param,
            links: Mutex::new(Links {
                delta_ticks: Cell::new(0),
                prev: Cell::new(None),
                next: Cell::new(None),
                owner: Cell::new(None),
                callback: Cell::new(no_callback as TimeoutFn),
            }),
        }
    }

    /// The value given to [`TimeoutNode::with_param`].
    #[inline]
    pub fn param(&self) -> usize {
        self.param
    }

    /// `true` if the node is armed, i.e. linked into a queue and not yet
    /// fired.
    pub fn is_linked(&self) -> bool {
        cs::with(|cs| self.linked(cs))
    }

    #[inline]
    pub(crate) fn linked(&self, cs: CriticalSection<'_>) -> bool {
        self.links(cs).owner.get().is_some()
    }

    #[inline]
    pub(crate) fn links<'cs>(&'cs self, cs: CriticalSection<'cs>) -> &'cs Links {
        self.links.borrow(cs)
    }

    pub(crate) fn delta_ticks(&self, cs: CriticalSection<'_>) -> Ticks {
        self.links(cs).delta_ticks.get()
    }

    pub(crate) fn set_delta_ticks(&self, cs: CriticalSection<'_>, ticks: Ticks) {
        self.links(cs).delta_ticks.set(ticks);
    }

    pub(crate) fn callback(&self, cs: CriticalSection<'_>) -> TimeoutFn {
        self.links(cs).callback.get()
    }

    pub(crate) fn set_callback(&self, cs: CriticalSection<'_>, callback: TimeoutFn) {
        self.links(cs).callback.set(callback);
    }
}

impl Default for TimeoutNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimeoutNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (linked, delta_ticks) = cs::with(|cs| {
            let links = self.links(cs);
            (links.owner.get().is_some(), links.delta_ticks.get())
        });

        f.debug_struct("TimeoutNode")
            .field("param", &self.param)
            .field("linked", &linked)
            .field("delta_ticks", &delta_ticks)
            .finish()
    }
}

/// A sorted list of [`TimeoutNode`]s where every node stores its distance to
/// the previous node.
///
/// The sum of `delta_ticks` from the head up to a node is that node's
/// remaining time relative to the last fully announced tick. Every operation
/// takes a [`CriticalSection`] token; the list itself must only be reached
/// through a lock.
pub(crate) struct DeltaList {
    head: Cell<Option<&'static TimeoutNode>>,
    tail: Cell<Option<&'static TimeoutNode>>,
    /// Assigned on the first insertion.
    id: Cell<Option<ListId>>,
}

impl DeltaList {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            head: Cell::new(None),
            tail: Cell::new(None),
            id: Cell::new(None),
        }
    }

    fn id(&self, cs: CriticalSection<'_>) -> ListId {
        if let Some(id) = self.id.get() {
            return id;
        }

        let next = NEXT_LIST_ID.borrow(cs);
        let id = ListId(next.get());
        next.set(id.0.wrapping_add(1));
        self.id.set(Some(id));
        id
    }

    /// The soonest-to-expire node.
    #[inline]
    pub fn first(&self) -> Option<&'static TimeoutNode> {
        self.head.get()
    }

    /// The node after `node`.
    #[inline]
    pub fn next(
        &self,
        cs: CriticalSection<'_>,
        node: &'static TimeoutNode,
    ) -> Option<&'static TimeoutNode> {
        node.links(cs).next.get()
    }

    /// `true` if `node` is linked into this list.
    #[inline]
    pub fn contains(&self, cs: CriticalSection<'_>, node: &TimeoutNode) -> bool {
        // A list without an id has never had a node linked
        matches!(self.id.get(), Some(id) if node.links(cs).owner.get() == Some(id))
    }

    /// Iterate from the head.
    pub fn iter<'cs>(&'cs self, cs: CriticalSection<'cs>) -> Iter<'cs> {
        Iter {
            cs,
            next: self.first(),
        }
    }

    /// Link `node` so that it expires `ticks` after the last announced tick.
    /// Returns `true` if `node` became the new head.
    ///
    /// Nodes with the same expiry keep their insertion order: the walk only
    /// stops in front of a node whose delta is strictly larger than what is
    /// left of `ticks`.
    pub fn insert(&self, cs: CriticalSection<'_>, node: &'static TimeoutNode, ticks: Ticks) -> bool {
        let links = node.links(cs);
        debug_assert!(links.owner.get().is_none(), "node is already linked");

        let mut remainder = ticks;
        let mut cursor = self.first();

        while let Some(t) = cursor {
            let t_links = t.links(cs);
            let t_delta = t_links.delta_ticks.get();

            if t_delta > remainder {
                // `t` now counts from `node` instead of from its old predecessor
                t_links.delta_ticks.set(t_delta - remainder);

                let prev = t_links.prev.replace(Some(node));
                links.prev.set(prev);
                links.next.set(Some(t));
                match prev {
                    Some(prev) => prev.links(cs).next.set(Some(node)),
                    None => self.head.set(Some(node)),
                }
                break;
            }

            remainder -= t_delta;
            cursor = t_links.next.get();
        }

        if cursor.is_none() {
            // Append
            let tail = self.tail.replace(Some(node));
            links.prev.set(tail);
            links.next.set(None);
            match tail {
                Some(tail) => tail.links(cs).next.set(Some(node)),
                None => self.head.set(Some(node)),
            }
        }

        links.delta_ticks.set(remainder);
        links.owner.set(Some(self.id(cs)));

        links.prev.get().is_none()
    }

    /// Unlink `node`, handing its delta over to its successor so every later
    /// node keeps its absolute expiry.
    pub fn remove(&self, cs: CriticalSection<'_>, node: &'static TimeoutNode) {
        let links = node.links(cs);
        debug_assert!(self.contains(cs, node), "node is linked into another list");

        let prev = links.prev.replace(None);
        let next = links.next.replace(None);

        match next {
            Some(next) => {
                let next_links = next.links(cs);
                next_links.delta_ticks.set(
                    next_links
                        .delta_ticks
                        .get()
                        .saturating_add(links.delta_ticks.get()),
                );
                next_links.prev.set(prev);
            }
            None => self.tail.set(prev),
        }

        match prev {
            Some(prev) => prev.links(cs).next.set(next),
            None => self.head.set(next),
        }

        links.owner.set(None);
    }
}

/// Iterator over the nodes of a [`DeltaList`], head first.
pub(crate) struct Iter<'cs> {
    cs: CriticalSection<'cs>,
    next: Option<&'static TimeoutNode>,
}

impl Iterator for Iter<'_> {
    type Item = &'static TimeoutNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.links(self.cs).next.get();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::boxed::Box;
    use std::vec::Vec;

    fn leak_node(param: usize) -> &'static TimeoutNode {
        Box::leak(Box::new(TimeoutNode::with_param(param)))
    }

    /// `(param, absolute expiry)` of every node, head first.
    fn absolute(list: &DeltaList) -> Vec<(usize, Ticks)> {
        cs::with(|cs| {
            let mut sum = 0;
            list.iter(cs)
                .map(|node| {
                    sum += node.delta_ticks(cs);
                    (node.param(), sum)
                })
                .collect()
        })
    }

    fn deltas(list: &DeltaList) -> Vec<Ticks> {
        cs::with(|cs| list.iter(cs).map(|node| node.delta_ticks(cs)).collect())
    }

    #[test]
    fn insert_sorts_and_delta_encodes() {
        let list = DeltaList::new();
        let (a, b, c) = (leak_node(5), leak_node(1), leak_node(3));

        cs::with(|cs| {
            assert!(list.insert(cs, a, 5));
            assert!(list.insert(cs, b, 1));
            assert!(!list.insert(cs, c, 3));
        });

        assert_eq!(absolute(&list), [(1, 1), (3, 3), (5, 5)]);
        assert_eq!(deltas(&list), [1, 2, 2]);
    }

    #[test]
    fn equal_expiry_keeps_insertion_order() {
        let list = DeltaList::new();
        let (a, b, c) = (leak_node(1), leak_node(2), leak_node(3));

        cs::with(|cs| {
            list.insert(cs, a, 4);
            list.insert(cs, b, 4);
            list.insert(cs, c, 4);
        });

        assert_eq!(absolute(&list), [(1, 4), (2, 4), (3, 4)]);
        assert_eq!(deltas(&list), [4, 0, 0]);
    }

    #[test]
    fn remove_hands_delta_to_successor() {
        let list = DeltaList::new();
        let (a, b, c) = (leak_node(1), leak_node(2), leak_node(3));

        cs::with(|cs| {
            list.insert(cs, a, 2);
            list.insert(cs, b, 5);
            list.insert(cs, c, 9);
            list.remove(cs, b);
            assert!(!list.contains(cs, b));
        });

        assert_eq!(absolute(&list), [(1, 2), (3, 9)]);

        cs::with(|cs| {
            list.remove(cs, a);
            assert_eq!(list.first().map(TimeoutNode::param), Some(3));
            list.remove(cs, c);
            assert!(list.first().is_none());
        });

        assert!(!c.is_linked());
    }

    #[test]
    fn removed_node_can_be_relinked() {
        let list = DeltaList::new();
        let (a, b) = (leak_node(1), leak_node(2));

        cs::with(|cs| {
            list.insert(cs, a, 3);
            list.insert(cs, b, 6);
            list.remove(cs, b);
            list.insert(cs, b, 1);
        });

        assert_eq!(absolute(&list), [(2, 1), (1, 3)]);
    }

    #[test]
    fn foreign_list_does_not_contain_node() {
        let list = DeltaList::new();
        let other = DeltaList::new();
        let a = leak_node(1);

        cs::with(|cs| {
            list.insert(cs, a, 3);
            assert!(list.contains(cs, a));
            assert!(!other.contains(cs, a));
        });
    }

    #[test]
    fn moved_list_keeps_its_nodes() {
        let list = DeltaList::new();
        let (a, b) = (leak_node(1), leak_node(2));

        cs::with(|cs| {
            list.insert(cs, a, 2);
            list.insert(cs, b, 5);
        });

        let moved = Box::new(list);
        cs::with(|cs| {
            assert!(moved.contains(cs, a));
            moved.remove(cs, a);
            assert!(!moved.contains(cs, a));
        });

        assert!(!a.is_linked());
        assert_eq!(absolute(&moved), [(2, 5)]);
    }

    /// Inserting or removing a node never moves the absolute expiry of any
    /// other node, and the list order is a stable sort by expiry.
    #[quickcheck]
    fn quickcheck_sum_preservation(ops: Vec<(bool, u8)>) -> bool {
        let list = DeltaList::new();
        let mut model: Vec<(usize, Ticks, &'static TimeoutNode)> = Vec::new();

        for (i, &(insert, arg)) in ops.iter().enumerate() {
            if insert || model.is_empty() {
                let node = leak_node(i);
                let ticks = Ticks::from(arg);
                cs::with(|cs| list.insert(cs, node, ticks));

                // Stable: goes after every node with the same expiry
                let pos = model.partition_point(|&(_, abs, _)| abs <= ticks);
                model.insert(pos, (i, ticks, node));
            } else {
                let (_, _, node) = model.remove(usize::from(arg) % model.len());
                cs::with(|cs| list.remove(cs, node));
            }

            let expected: Vec<_> = model.iter().map(|&(p, abs, _)| (p, abs)).collect();
            if absolute(&list) != expected {
                return false;
            }
        }

        true
    }
}
