#![deny(missing_docs)]
//! # quay — round-based rendezvous with elected captains
//!
//! An in-process coalescing primitive: many concurrently arriving
//! work items ("tickets") are gathered into discrete **rounds**,
//! exactly one arriving task per round is elected **captain**, the
//! captain performs the shared batch step on behalf of everyone in
//! the round, and the round's outcome is broadcast to every
//! participant — while new tickets transparently queue up for the
//! *next* round. It is the building block for request coalescing,
//! group commit, and amortized batch flushing: "do this expensive
//! step once per round, on behalf of all of us who showed up."
//!
//! Core pieces:
//!
//! - [`wharf::Wharf`]: the round engine. [`wharf::Wharf::enter`]
//!   admits a ticket and returns a [`wharf::Pass`]; waiting on the
//!   pass resolves to a [`wharf::Status`] — either the
//!   [`wharf::Captain`] capability (this task leads the round) or the
//!   outcome broadcast by whoever did.
//! - [`quay::Quay`]: a keyed registry multiplexing many wharves, with
//!   lazy creation and idle-based removal. [`quay::Quay::travel`]
//!   runs the whole protocol for one participant.
//!
//! ## Concepts
//!
//! A round's tickets ride the **ferry**; tickets arriving while the
//! ferry is closed wait on the **platform** and become the next
//! round when the current one arrives. Election is a deliberate race:
//! whichever participant's wait claims the round's single token
//! first wins, with no ordering guarantee among racers. The outcome
//! broadcast, by contrast, is strictly ordered: it happens after the
//! captain's terminal action, every participant of the round sees the
//! same outcome, and participants that start waiting *after* the
//! round arrived are released immediately.
//!
//! Leadership is expressed as capabilities rather than flags —
//! closing a round you do not lead, or finalizing one twice, does not
//! compile.
//!
//! There are no timeouts and no retries: a captain that never
//! [`arrive`](wharf::Voyage::arrive)s nor
//! [`resign`](wharf::Captain::resign)s stalls its round forever.
//! Liveness is the captain's contract.
//!
//! ## Quick start
//!
//! ```rust
//! use quay::Status;
//! use quay::Wharf;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let wharf: Wharf<u32, String> = Wharf::new();
//!
//! let pass = wharf.enter(1);
//! wharf.enter(2);
//! wharf.enter(3);
//!
//! // Nobody raced us: the first waiter wins the election.
//! if let Status::Elected(captain) = pass.wait().await {
//!     let (tickets, voyage) = captain.close();
//!     assert_eq!(tickets, vec![1, 2, 3]);
//!     voyage.arrive(Ok(()));
//! }
//! # }
//! ```
//!
//! Keyed, with the protocol fully automated:
//!
//! ```rust
//! use quay::Quay;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let quay: Quay<&str, u32, String> = Quay::new();
//! let outcome = quay
//!     .travel(
//!         "pier",
//!         7,
//!         || async { Ok(()) },
//!         |tickets| async move {
//!             assert_eq!(tickets, vec![7]);
//!             Ok(())
//!         },
//!     )
//!     .await;
//! assert_eq!(outcome, Ok(()));
//! assert!(quay.is_empty());
//! # }
//! ```

/// The per-key round engine: tickets, rounds, elections, broadcast.
pub mod wharf;

/// The keyed registry multiplexing wharves with idle-based cleanup.
pub mod quay;

// The one-shot election/broadcast cell underneath each round.
mod signal;

pub use crate::quay::Mooring;
pub use crate::quay::Quay;
pub use crate::wharf::Captain;
pub use crate::wharf::Pass;
pub use crate::wharf::Status;
pub use crate::wharf::Voyage;
pub use crate::wharf::Wharf;
