//! The round signal: a one-shot election-then-broadcast cell.
//!
//! Every round of a wharf is backed by exactly one `Signal`. It moves
//! through two phases:
//!
//! 1. **Armed**: the cell holds at most one unclaimed election token.
//!    The first waiter to consume it becomes the round's captain; this
//!    is a deliberate race with no ordering guarantee.
//! 2. **Done**: once the captain finalizes the round, the signal is
//!    irreversibly closed with the round's outcome. Every other waiter
//!    — blocked or yet to arrive — receives that same outcome
//!    immediately and without blocking.
//!
//! Design notes
//! - The token lives in a `std::sync::Mutex<bool>`; claiming it is a
//!   short synchronous critical section, so an async mutex buys
//!   nothing here.
//! - The outcome is broadcast through a `tokio::sync::watch` channel.
//!   `watch` retains the last sent value, which is exactly the
//!   "immediate delivery to late observers" contract: a waiter that
//!   subscribes after `complete` sees the closed phase on its first
//!   look. `send_replace` is used so the phase is stored even when no
//!   receiver is currently subscribed.
//! - `wait` subscribes *before* inspecting any state, so a transition
//!   between the inspection and the await is never lost.
//! - A signal is used for exactly one round; a resignation re-arms the
//!   same instance, a completion retires it.

use std::sync::Mutex;
use tokio::sync::watch;

/// Where a signal stands in its one-shot life.
enum Phase<E> {
    /// The round is still open; the election token may or may not be
    /// claimed.
    Open,
    /// The round was finalized with this outcome.
    Done(Result<(), E>),
}

/// What a waiter got out of [`Signal::wait`].
pub(crate) enum Claim<E> {
    /// This waiter consumed the election token and leads the round.
    Token,
    /// Some other task led the round and finalized it with this
    /// outcome.
    Outcome(Result<(), E>),
}

/// One-shot, single-slot election/broadcast cell.
pub(crate) struct Signal<E> {
    /// `true` while the election token is unclaimed.
    token: Mutex<bool>,
    tx: watch::Sender<Phase<E>>,
}

impl<E> Signal<E> {
    /// Create a signal, armed with the election token or not.
    ///
    /// A ferry's signal starts armed (its first entrant may win
    /// immediately); a platform's signal starts unarmed and is armed
    /// only when the platform is promoted.
    pub(crate) fn new(armed: bool) -> Self {
        let (tx, _rx) = watch::channel(Phase::Open);
        Self {
            token: Mutex::new(armed),
            tx,
        }
    }

    /// Try to claim the election token. The first caller since the
    /// signal was armed gets `true`; everyone else `false`.
    pub(crate) fn win(&self) -> bool {
        let mut token = self.token.lock().unwrap();
        std::mem::replace(&mut *token, false)
    }

    /// Return the election token to the slot and wake all current
    /// waiters so they can race for it again.
    ///
    /// Also used to arm a promoted platform signal for the first time.
    pub(crate) fn arm(&self) {
        *self.token.lock().unwrap() = true;
        self.tx.send_replace(Phase::Open);
    }

    /// Irreversibly close the signal with the round's outcome,
    /// releasing every current and future waiter.
    pub(crate) fn complete(&self, outcome: Result<(), E>) {
        self.tx.send_replace(Phase::Done(outcome));
    }

    /// Wait for either the election token or the round's outcome.
    pub(crate) async fn wait(&self) -> Claim<E>
    where
        E: Clone,
    {
        // Subscribe first: any `arm` or `complete` from here on marks
        // the channel changed and will be observed below.
        let mut rx = self.tx.subscribe();
        loop {
            // Mark the current version seen *before* racing for the
            // token: an `arm` landing after the failed `win` below
            // then post-dates the seen version and `changed` fires
            // immediately. In the other order an `arm` between the
            // two checks is marked seen with the token unobserved,
            // and the waiter parks while the election sits open.
            if let Phase::Done(outcome) = &*rx.borrow_and_update() {
                return Claim::Outcome(outcome.clone());
            }
            if self.win() {
                return Claim::Token;
            }
            // The sender lives inside `self`, so the channel cannot
            // close while we hold `&self`.
            let _ = rx.changed().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn armed_signal_yields_its_token_exactly_once() {
        let s: Signal<String> = Signal::new(true);
        assert!(s.win());
        assert!(!s.win());
        assert!(!s.win());
    }

    #[tokio::test]
    async fn unarmed_signal_has_no_token() {
        let s: Signal<String> = Signal::new(false);
        assert!(!s.win());
    }

    #[tokio::test]
    async fn complete_releases_blocked_and_late_waiters() {
        let s: Arc<Signal<String>> = Arc::new(Signal::new(true));
        assert!(s.win()); // play the captain: claim the token

        let blocked = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait().await })
        };
        // Let the waiter block on the open signal.
        sleep(Duration::from_millis(10)).await;

        s.complete(Err("abandon ship".to_string()));

        let claim = blocked.await.unwrap();
        assert!(matches!(claim, Claim::Outcome(Err(e)) if e == "abandon ship"));

        // A waiter arriving after completion is released immediately.
        let late = timeout(Duration::from_millis(50), s.wait())
            .await
            .expect("late waiter must not block");
        assert!(matches!(late, Claim::Outcome(Err(e)) if e == "abandon ship"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn arm_racing_a_fresh_waiter_is_never_lost() {
        // A re-arm may land between a waiter's phase check and its
        // token check; the token must be observed regardless.
        for _ in 0..1000 {
            let s: Arc<Signal<String>> = Arc::new(Signal::new(false));
            let waiter = {
                let s = Arc::clone(&s);
                tokio::spawn(async move { s.wait().await })
            };
            s.arm();
            let claim = timeout(Duration::from_millis(500), waiter)
                .await
                .expect("the re-armed token must be claimed")
                .unwrap();
            assert!(matches!(claim, Claim::Token));
        }
    }

    #[tokio::test]
    async fn arm_reopens_the_election_for_blocked_waiters() {
        let s: Arc<Signal<String>> = Arc::new(Signal::new(false));

        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait().await })
        };
        sleep(Duration::from_millis(10)).await;

        s.arm();

        let claim = timeout(Duration::from_millis(100), waiter)
            .await
            .expect("armed waiter must wake")
            .unwrap();
        assert!(matches!(claim, Claim::Token));
    }
}
