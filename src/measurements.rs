//! Per-prefix strategy scratch-pad with sliding lifetime. See spec §3, §4.4.
//!
//! Grounded on `original_source/daemon/table/measurements.cpp`'s `get`
//! overloads (by name / NameTree entry / FIB entry / PIT entry, all
//! funneling through the NameTree-entry form) and its `s_defaultLifetime`
//! of 4 seconds.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use generational_arena::{Arena, Index};
use tracing::{debug, trace};

use crate::clock::Timestamp;
use crate::fib::FibEntryId;
use crate::name::Name;
use crate::name_tree::{NameTree, NameTreeEntryId};
use crate::pit::PitEntryId;
use crate::scheduler::{ScheduledEventId, Scheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementsEntryId(pub(crate) Index);

pub const DEFAULT_LIFETIME_MS: u64 = 4_000;

pub struct MeasurementsEntry {
    name_tree_entry: NameTreeEntryId,
    prefix: Name,
    /// Strategy-defined scratch value; strategies downcast this to their
    /// own type. `None` until a strategy first stores something.
    pub strategy_scratch: Option<Box<dyn Any>>,
    expiry: Timestamp,
    cancel_handle: Option<ScheduledEventId>,
}

impl MeasurementsEntry {
    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }
}

pub struct Measurements {
    entries: Arena<MeasurementsEntry>,
    count: usize,
    expired: Rc<RefCell<Vec<MeasurementsEntryId>>>,
}

impl Default for Measurements {
    fn default() -> Self {
        Measurements {
            entries: Arena::new(),
            count: 0,
            expired: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn entry(&self, id: MeasurementsEntryId) -> &MeasurementsEntry {
        self.entries.get(id.0).expect("stale MeasurementsEntryId")
    }

    pub fn entry_mut(&mut self, id: MeasurementsEntryId) -> &mut MeasurementsEntry {
        self.entries.get_mut(id.0).expect("stale MeasurementsEntryId")
    }

    /// Returns the Measurements entry for the given NameTree node, creating
    /// it (with initial expiry `now + DEFAULT_LIFETIME_MS`, scheduled for
    /// cleanup) if absent.
    pub fn get(
        &mut self,
        tree: &mut NameTree,
        scheduler: &mut Scheduler,
        node: NameTreeEntryId,
        now: Timestamp,
    ) -> MeasurementsEntryId {
        if let Some(existing) = tree.measurements(node) {
            return existing;
        }
        let expiry = now.adding_millis(DEFAULT_LIFETIME_MS);
        let idx = self.entries.insert(MeasurementsEntry {
            name_tree_entry: node,
            prefix: tree.prefix(node).clone(),
            strategy_scratch: None,
            expiry,
            cancel_handle: None,
        });
        let id = MeasurementsEntryId(idx);
        tree.set_measurements(node, Some(id));
        self.count += 1;
        debug!(prefix = %tree.prefix(node), ?expiry, "measurements entry created");
        self.schedule_cleanup(scheduler, id, expiry);
        id
    }

    pub fn get_by_name(
        &mut self,
        tree: &mut NameTree,
        scheduler: &mut Scheduler,
        name: &Name,
        now: Timestamp,
    ) -> MeasurementsEntryId {
        let node = tree.lookup(name).expect("name already validated by caller");
        self.get(tree, scheduler, node, now)
    }

    pub fn get_by_fib_entry(
        &mut self,
        tree: &mut NameTree,
        scheduler: &mut Scheduler,
        fib_entry_node: NameTreeEntryId,
        _fib_entry: FibEntryId,
        now: Timestamp,
    ) -> MeasurementsEntryId {
        self.get(tree, scheduler, fib_entry_node, now)
    }

    pub fn get_by_pit_entry(
        &mut self,
        tree: &mut NameTree,
        scheduler: &mut Scheduler,
        pit_entry_node: NameTreeEntryId,
        _pit_entry: PitEntryId,
        now: Timestamp,
    ) -> MeasurementsEntryId {
        self.get(tree, scheduler, pit_entry_node, now)
    }

    /// Extends (never shortens) the entry's expiry and reschedules cleanup.
    pub fn extend_lifetime(
        &mut self,
        scheduler: &mut Scheduler,
        id: MeasurementsEntryId,
        now: Timestamp,
        delta_ms: u64,
    ) {
        let candidate = now.adding_millis(delta_ms);
        let e = self.entries.get_mut(id.0).expect("stale MeasurementsEntryId");
        let new_expiry = e.expiry.max(candidate);
        if new_expiry == e.expiry {
            return;
        }
        e.expiry = new_expiry;
        let prefix = e.prefix.clone();
        if let Some(handle) = e.cancel_handle.take() {
            scheduler.cancel(handle);
        }
        trace!(%prefix, ?new_expiry, "measurements lifetime extended");
        self.schedule_cleanup(scheduler, id, new_expiry);
    }

    pub fn find_longest_prefix_match(
        &self,
        tree: &NameTree,
        name: &Name,
    ) -> Option<MeasurementsEntryId> {
        tree.find_longest_prefix_match(name, |t, node| t.measurements(node).is_some())
            .and_then(|node| tree.measurements(node))
    }

    /// Cancels `id`'s pending cleanup (if any) and schedules a fresh one at
    /// `expiry`; the fired callback pushes `id` onto the shared
    /// expired-queue, which [`Measurements::reap_expired`] drains and
    /// actually removes (spec §4.4/§4.5).
    fn schedule_cleanup(
        &mut self,
        scheduler: &mut Scheduler,
        id: MeasurementsEntryId,
        expiry: Timestamp,
    ) {
        let queue = self.expired.clone();
        let handle = scheduler.schedule(expiry, move || queue.borrow_mut().push(id));
        let e = self.entries.get_mut(id.0).expect("stale MeasurementsEntryId");
        e.cancel_handle = Some(handle);
    }

    /// Drains the scheduler-fed expired-entry queue and removes each entry
    /// that is still present, clearing its NameTree back-pointer and
    /// decrementing the counter. Call once per event-loop turn alongside
    /// [`Scheduler::poll`].
    pub fn reap_expired(&mut self, tree: &mut NameTree) -> usize {
        let due: Vec<MeasurementsEntryId> = self.expired.borrow_mut().drain(..).collect();
        let mut count = 0;
        for id in due {
            if let Some(e) = self.entries.get(id.0) {
                let node = e.name_tree_entry;
                debug!(prefix = %e.prefix, "measurements entry expired");
                self.entries.remove(id.0);
                tree.set_measurements(node, None);
                tree.erase_if_empty(node);
                self.count -= 1;
                count += 1;
            }
        }
        count
    }
}
