//! Incoming Interest/Data pipeline. See spec §4.7.
//!
//! Grounded on `fidinda-reto/src/platform/native/forwarder.rs`'s generic
//! `BlockingForwarder<C, H, M, T>` (a `Clock`, `Hasher`, `ForwarderMetrics`,
//! and `Tables` trait bound, run on one thread) -- the shape this crate's
//! `Forwarder<C>` generalizes, since it already matches the spec's
//! single-threaded, no-suspension-point pipeline (§5) far better than the
//! async `Rc<RefCell<Tables>>` forwarder in `fidinda-reto/src/forwarder.rs`.

use tracing::{debug, trace, warn};

use crate::clock::{Clock, Timestamp};
use crate::error::ForwarderError;
use crate::face::{Face, FaceId, FaceTable};
use crate::fib::Fib;
use crate::measurements::Measurements;
use crate::name_tree::NameTree;
use crate::packet::{Data, Interest};
use crate::pit::{clamp_lifetime_ms, Pit};
use crate::rib::Rib;
use crate::scheduler::Scheduler;
use crate::strategy::{MulticastStrategy, Strategy};

pub struct Forwarder<C: Clock> {
    clock: C,
    pub tree: NameTree,
    pub fib: Fib,
    pub pit: Pit,
    pub measurements: Measurements,
    pub scheduler: Scheduler,
    pub faces: FaceTable,
    pub rib: Rib,
    strategy: Box<dyn Strategy>,
}

impl<C: Clock> Forwarder<C> {
    pub fn new(clock: C) -> Self {
        Forwarder {
            clock,
            tree: NameTree::new(),
            fib: Fib::new(),
            pit: Pit::new(),
            measurements: Measurements::new(),
            scheduler: Scheduler::new(),
            faces: FaceTable::new(),
            rib: Rib::new(),
            strategy: Box::new(MulticastStrategy),
        }
    }

    pub fn with_strategy(clock: C, strategy: Box<dyn Strategy>) -> Self {
        let mut f = Self::new(clock);
        f.strategy = strategy;
        f
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Runs due scheduler callbacks and sweeps timed-out PIT/Measurements
    /// entries. Call this from the event loop alongside I/O dispatch
    /// (spec §5).
    pub fn poll(&mut self) {
        let now = self.now();
        self.scheduler.poll(now);
        self.pit.reap_expired(&mut self.tree);
        self.measurements.reap_expired(&mut self.tree);
    }

    /// Step 1-7 of spec §4.7's incoming-Interest pipeline.
    pub fn handle_interest(
        &mut self,
        incoming_face: FaceId,
        interest: Interest,
    ) -> Result<(), ForwarderError> {
        let now = self.now();
        let lifetime_ms = clamp_lifetime_ms(interest.interest_lifetime_ms);
        // Captured before `interest` is (possibly) moved into an existing
        // PIT entry below -- dedup is by name+selectors digest, which does
        // not cover the nonce, so the incoming nonce must not be read back
        // off the (possibly older) stored Interest.
        let nonce = interest.nonce;

        let (pit_id, is_new) = self.pit.insert(&mut self.tree, interest);

        if !is_new {
            if let Some(in_record) = self.pit.entry(pit_id).in_record(incoming_face) {
                if in_record.last_nonce == nonce {
                    trace!(face = incoming_face.value(), "duplicate interest dropped");
                    return Err(ForwarderError::Duplicate(incoming_face));
                }
            }
        }

        // Any out-record with a matching nonce means this exact Interest was
        // already forwarded once; seeing it again (on whichever face) means
        // it looped back through the network rather than arriving fresh.
        let loop_detected = self
            .pit
            .entry(pit_id)
            .out_records()
            .iter()
            .any(|(_, rec)| rec.last_nonce == nonce);
        if loop_detected {
            debug!(face = incoming_face.value(), "interest loop dropped");
            return Err(ForwarderError::Loop(incoming_face));
        }

        self.pit
            .insert_in_record(&mut self.scheduler, pit_id, incoming_face, nonce, now, lifetime_ms);

        if is_new {
            let name = self.pit.entry(pit_id).interest.name.clone();
            let next_hops: Vec<_> = self
                .fib
                .find_longest_prefix_match(&self.tree, &name)
                .map(|fib_id| self.fib.entry(fib_id).next_hops().to_vec())
                .unwrap_or_default();

            let chosen = self.strategy.after_receive_new_interest(
                &self.pit.entry(pit_id).interest,
                incoming_face,
                &next_hops,
            );

            for target in chosen {
                if target == incoming_face {
                    continue;
                }
                if let Some(face) = self.faces.get_mut(target) {
                    let interest = &self.pit.entry(pit_id).interest;
                    let send_result = face.send_interest(interest);
                    if send_result.is_ok() {
                        self.pit
                            .insert_out_record(pit_id, target, nonce, now, lifetime_ms);
                    }
                }
            }
        }

        Ok(())
    }

    /// Step 1-3 of spec §4.7's incoming-Data pipeline.
    pub fn handle_data(&mut self, incoming_face: FaceId, data: Data) -> Result<(), ForwarderError> {
        if data.interest_digest_tag.is_none() {
            warn!("data missing required interest digest tag");
            return Err(ForwarderError::MissingDigestTag);
        }

        let matches = self.pit.find_all_data_matches(&data);
        for entry_id in matches {
            let in_faces: Vec<FaceId> = self
                .pit
                .entry(entry_id)
                .in_records()
                .keys()
                .copied()
                .filter(|&f| f != incoming_face)
                .collect();
            for target in in_faces {
                if let Some(face) = self.faces.get_mut(target) {
                    let _ = face.send_data(&data);
                }
            }
            self.pit.erase(&mut self.tree, entry_id);
        }
        Ok(())
    }

    /// Cascades a face removal through every table that might reference it
    /// (spec §4.6, §4.8). The RIB is walked first since erasing its routes
    /// for `face` can itself emit FIB updates; `fib.remove_face` then sweeps
    /// up anything the RIB never tracked (e.g. next hops installed directly
    /// rather than through a route).
    pub fn remove_face(&mut self, face: FaceId) {
        self.rib.erase_face(&mut self.tree, &mut self.fib, face);
        self.fib.remove_face(&mut self.tree, face);
        self.pit.remove_face(&mut self.scheduler, face);
        self.faces.remove(face);
    }
}
