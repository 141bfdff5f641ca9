//! The quay: a keyed registry of wharves with idle-based cleanup.
//!
//! A [`Quay`] multiplexes independent [`Wharf`] instances under opaque
//! keys. The wharf for a key is created lazily on first entry and
//! shared by every concurrent entrant for that key; it is removed
//! again the moment a finished participant finds it idle — no queued
//! tickets, no round in flight. Keys never interfere: each wharf runs
//! its rounds entirely on its own.
//!
//! [`Quay::travel`] packages the whole protocol for one participant —
//! enter, race, lead or follow, dispose — so most callers never touch
//! the wharf surface directly.
//!
//! Design notes
//! - The key→wharf map sits behind one `std::sync::Mutex`; lookup,
//!   insertion, and the idle-check-then-remove step are each a single
//!   short critical section.
//! - Disposal is an RAII obligation: [`Quay::enter`] hands back a
//!   [`Mooring`] whose drop performs the idle check. That encodes the
//!   "exactly once, when finished" contract in the type system rather
//!   than in documentation.
//! - An idle wharf removed from the map may still be held by a
//!   straggling handle; that is harmless, as a later entry for the key
//!   simply creates a fresh wharf. Disposal removes an entry only if
//!   it is the disposer's own wharf, so a straggler never evicts such
//!   a successor.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;

use crate::wharf::Pass;
use crate::wharf::Status;
use crate::wharf::Wharf;

type Registry<K, T, E> = Arc<Mutex<HashMap<K, Wharf<T, E>>>>;

/// A keyed registry of independently round-tripping wharves.
///
/// Cheap to clone; clones share the same registry.
pub struct Quay<K, T, E> {
    wharves: Registry<K, T, E>,
}

impl<K, T, E> Clone for Quay<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            wharves: Arc::clone(&self.wharves),
        }
    }
}

impl<K, T, E> Default for Quay<K, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> fmt::Debug for Quay<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quay").finish_non_exhaustive()
    }
}

impl<K, T, E> Quay<K, T, E> {
    /// Create an empty quay.
    pub fn new() -> Self {
        Self {
            wharves: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of live wharves, i.e. keys some participant is still
    /// interacting with. Snapshot only.
    pub fn len(&self) -> usize {
        self.wharves.lock().unwrap().len()
    }

    /// Whether no wharf is currently live.
    pub fn is_empty(&self) -> bool {
        self.wharves.lock().unwrap().is_empty()
    }
}

impl<K, T, E> Quay<K, T, E>
where
    K: Eq + Hash + Clone,
{
    /// Admit `ticket` into the wharf for `key`, creating the wharf if
    /// this is the key's first entrant.
    ///
    /// Concurrent entrants for the same key observe the same wharf.
    /// The returned [`Mooring`] must outlive this participant's
    /// interaction with the wharf; dropping it removes the key's entry
    /// if the wharf is idle by then.
    pub fn enter(&self, key: K, ticket: T) -> (Wharf<T, E>, Pass<T, E>, Mooring<K, T, E>) {
        // Admission happens under the registry lock: a concurrent
        // dispose must see this ticket queued, or it could remove the
        // wharf between our lookup and our entry and split the key
        // across two instances.
        let (wharf, pass) = {
            let mut wharves = self.wharves.lock().unwrap();
            let wharf = wharves
                .entry(key.clone())
                .or_insert_with(Wharf::new)
                .clone();
            let pass = wharf.enter(ticket);
            (wharf, pass)
        };
        let mooring = Mooring {
            wharves: Arc::clone(&self.wharves),
            key,
            wharf: wharf.clone(),
        };
        (wharf, pass, mooring)
    }

    /// Run the full round protocol for one participant of `key`.
    ///
    /// Enters the key's wharf with `ticket` and waits for the
    /// election. If elected, runs `learn` first — preparatory work
    /// before committing to the batch; should it fail, the captain
    /// resigns (withdrawing its own ticket, leaving the round open for
    /// a future captain) and the error is returned to this caller
    /// only. Otherwise the captain closes the round, runs
    /// `sail` over the collected tickets, and arrives with its
    /// outcome, which every participant — captain included — gets as
    /// their return value. If not elected, simply returns the outcome
    /// broadcast by whichever task captained the round.
    ///
    /// The wharf occurrence is always disposed before returning.
    pub async fn travel<Learn, LearnFut, Sail, SailFut>(
        &self,
        key: K,
        ticket: T,
        learn: Learn,
        sail: Sail,
    ) -> Result<(), E>
    where
        Learn: FnOnce() -> LearnFut,
        LearnFut: Future<Output = Result<(), E>>,
        Sail: FnOnce(Vec<T>) -> SailFut,
        SailFut: Future<Output = Result<(), E>>,
        E: Clone,
    {
        let (_wharf, pass, mooring) = self.enter(key, ticket);
        let outcome = match pass.wait().await {
            Status::Elected(captain) => match learn().await {
                Ok(()) => {
                    let (tickets, voyage) = captain.close();
                    let outcome = sail(tickets).await;
                    voyage.arrive(outcome.clone());
                    outcome
                }
                Err(err) => {
                    captain.resign();
                    Err(err)
                }
            },
            Status::Arrived(outcome) => outcome,
        };
        drop(mooring);
        outcome
    }
}

/// A participant's claim on a keyed wharf occurrence.
///
/// Dropping the mooring is the dispose step from the registry
/// protocol: it removes the key's entry if — and only if — the wharf
/// is idle at that moment.
pub struct Mooring<K, T, E>
where
    K: Eq + Hash,
{
    wharves: Registry<K, T, E>,
    key: K,
    wharf: Wharf<T, E>,
}

impl<K, T, E> Mooring<K, T, E>
where
    K: Eq + Hash,
{
    /// Dispose explicitly. Equivalent to dropping the mooring.
    pub fn dispose(self) {}
}

impl<K, T, E> Drop for Mooring<K, T, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut wharves = self.wharves.lock().unwrap();
        // Remove only our own wharf: after an earlier dispose already
        // evicted it, the key may map to a fresh, busy successor that
        // a straggling mooring must not tear out.
        let ours = wharves
            .get(&self.key)
            .is_some_and(|current| current.ptr_eq(&self.wharf));
        if ours && self.wharf.is_idle() {
            wharves.remove(&self.key);
        }
    }
}
