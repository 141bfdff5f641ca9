//! The wharf: a round engine that coalesces concurrent tickets.
//!
//! A [`Wharf`] gathers concurrently arriving tickets into *rounds*.
//! Each round elects exactly one of its tasks as **captain**; the
//! captain closes boarding, performs the shared batch step over every
//! ticket collected so far, and arrives with an outcome that is
//! broadcast to every other participant of the round. Tickets that
//! show up while a round is closed wait on the *platform* and become
//! the next round the moment the current one arrives.
//!
//! Leadership is a capability, not a flag: winning the election hands
//! back a [`Captain`], closing hands back a [`Voyage`], and only those
//! types expose `close`, `resign`, and `arrive`. Closing twice,
//! arriving without closing, or finalizing a round you do not lead is
//! therefore unrepresentable rather than checked at runtime.
//!
//! Design notes
//! - All mutable state sits behind one `std::sync::Mutex`; every
//!   critical section is short and synchronous. Tasks suspend only in
//!   [`Pass::wait`], on the round's internal signal cell.
//! - Admitted tickets carry a per-wharf sequence number so a resigning
//!   captain can withdraw precisely its own ticket without any bound
//!   on `T`.
//! - There is no timeout anywhere: a captain that never arrives nor
//!   resigns stalls its round's current and future participants. The
//!   engine's liveness is the captain's obligation.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;

use crate::signal::Claim;
use crate::signal::Signal;

/// A round engine coalescing concurrent tickets into captained rounds.
///
/// `Wharf` is a cheap-to-clone handle; clones share the same rounds.
/// `T` is the caller's ticket payload, `E` the error a captain may
/// report for a round (cloned once per notified participant).
pub struct Wharf<T, E> {
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E> {
    gate: Mutex<State<T, E>>,
}

struct State<T, E> {
    /// While `true`, the current round is being processed and new
    /// tickets board the platform.
    closed: bool,
    /// Next admission sequence number; never reused.
    next_seq: u64,
    /// Current round: tickets in admission order, tagged with their
    /// sequence number.
    ferry: Vec<(u64, T)>,
    ferry_signal: Option<Arc<Signal<E>>>,
    /// Next round, accumulating while the current one is closed.
    platform: Vec<(u64, T)>,
    platform_signal: Option<Arc<Signal<E>>>,
}

impl<T, E> Clone for Wharf<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for Wharf<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Wharf<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wharf").finish_non_exhaustive()
    }
}

impl<T, E> Wharf<T, E> {
    /// Create an idle wharf with boarding open.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                gate: Mutex::new(State {
                    closed: false,
                    next_seq: 0,
                    ferry: Vec::new(),
                    ferry_signal: None,
                    platform: Vec::new(),
                    platform_signal: None,
                }),
            }),
        }
    }

    /// Admit `ticket` into the current round, or into the next round
    /// if boarding is closed.
    ///
    /// Admission itself never blocks; the returned [`Pass`] is waited
    /// on separately for the election outcome. The very first ticket
    /// of a round arms that round's election, so its task may win
    /// leadership immediately.
    pub fn enter(&self, ticket: T) -> Pass<T, E> {
        let mut state = self.inner.gate.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;
        let signal = if state.closed {
            state.platform.push((seq, ticket));
            // The platform's election stays unarmed until promotion.
            Arc::clone(
                state
                    .platform_signal
                    .get_or_insert_with(|| Arc::new(Signal::new(false))),
            )
        } else {
            state.ferry.push((seq, ticket));
            Arc::clone(
                state
                    .ferry_signal
                    .get_or_insert_with(|| Arc::new(Signal::new(true))),
            )
        };
        Pass {
            wharf: self.clone(),
            signal,
            seq,
        }
    }

    /// Whether nothing is queued and no round is in flight. Snapshot
    /// only; the registry uses this under its own lock for disposal.
    pub(crate) fn is_idle(&self) -> bool {
        let state = self.inner.gate.lock().unwrap();
        !state.closed && state.ferry.is_empty() && state.platform.is_empty()
    }

    /// Whether two handles share the same wharf.
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A boarded ticket's handle on its round.
///
/// Obtained from [`Wharf::enter`]; consumed by [`Pass::wait`], so each
/// admitted ticket observes exactly one [`Status`].
pub struct Pass<T, E> {
    wharf: Wharf<T, E>,
    signal: Arc<Signal<E>>,
    seq: u64,
}

impl<T, E> Pass<T, E> {
    /// Wait for this round's election to resolve for us.
    ///
    /// Exactly one participant per round resolves to
    /// [`Status::Elected`]; everyone else suspends until the captain
    /// arrives (or resigns, re-running the election) and then resolves
    /// to [`Status::Arrived`] with the captain's outcome. Waiting
    /// after the round has already arrived completes immediately.
    ///
    /// Dropping a pass without waiting abandons the notification but
    /// not the ticket: it has been admitted and will be part of its
    /// round's batch regardless.
    pub async fn wait(self) -> Status<T, E>
    where
        E: Clone,
    {
        let claim = self.signal.wait().await;
        match claim {
            Claim::Token => Status::Elected(Captain {
                wharf: self.wharf,
                signal: self.signal,
                seq: self.seq,
            }),
            Claim::Outcome(outcome) => Status::Arrived(outcome),
        }
    }
}

/// How a round resolved for one participant.
pub enum Status<T, E> {
    /// This task won the round's election and must now drive it to
    /// completion through the enclosed capability.
    Elected(Captain<T, E>),
    /// Another task captained the round and arrived with this outcome.
    Arrived(Result<(), E>),
}

/// The leadership capability for one round.
///
/// Exactly one `Captain` exists per election. Dropping it without
/// calling [`close`](Captain::close) or [`resign`](Captain::resign)
/// stalls the round forever — every current and future participant
/// keeps waiting, as the engine has no timeout.
pub struct Captain<T, E> {
    wharf: Wharf<T, E>,
    signal: Arc<Signal<E>>,
    seq: u64,
}

impl<T, E> Captain<T, E> {
    /// Close boarding and collect the round's tickets.
    ///
    /// Returns every ticket admitted into the round so far, in
    /// admission order, together with the [`Voyage`] capability used
    /// to finalize. Tickets entering from here on accumulate on the
    /// platform for the next round.
    pub fn close(self) -> (Vec<T>, Voyage<T, E>) {
        let tickets = {
            let mut state = self.wharf.inner.gate.lock().unwrap();
            state.closed = true;
            state.ferry.drain(..).map(|(_, ticket)| ticket).collect()
        };
        (
            tickets,
            Voyage {
                wharf: self.wharf,
                signal: self.signal,
            },
        )
    }

    /// Abandon leadership without processing the round.
    ///
    /// Withdraws this captain's own ticket — the one whose
    /// [`Pass`] won the election — and returns the election token to
    /// circulation, so an already-queued or future participant wins
    /// the round instead. Everyone else's tickets and the boarding
    /// state are untouched, and no outcome is delivered to anyone. A
    /// resigner that wants back into the round must re-enter.
    ///
    /// If nobody else is queued, the round simply stays open with the
    /// token unclaimed until the next entrant arrives and wins it.
    pub fn resign(self) {
        {
            let mut state = self.wharf.inner.gate.lock().unwrap();
            state.ferry.retain(|(seq, _)| *seq != self.seq);
        }
        self.signal.arm();
    }
}

/// The finalization capability for a closed round.
pub struct Voyage<T, E> {
    wharf: Wharf<T, E>,
    signal: Arc<Signal<E>>,
}

impl<T, E> Voyage<T, E> {
    /// Finalize the round, broadcasting `outcome` to every other
    /// participant, then promote the platform to be the new current
    /// round and re-open boarding.
    ///
    /// Participants already waiting are released now; participants
    /// that wait later are released immediately on arrival at the
    /// same outcome. If the platform is non-empty its election is
    /// armed here, so one of its already-waiting tasks wins the new
    /// round without entering again.
    pub fn arrive(self, outcome: Result<(), E>) {
        self.signal.complete(outcome);
        let promoted = {
            let mut state = self.wharf.inner.gate.lock().unwrap();
            state.closed = false;
            state.ferry = std::mem::take(&mut state.platform);
            state.ferry_signal = state.platform_signal.take();
            state.ferry_signal.clone()
        };
        if let Some(signal) = promoted {
            signal.arm();
        }
    }
}
