//! Bounded best-K retention of scored artifacts
//!
//! The store keeps the `capacity` best candidates offered so far (lower score
//! is better) in a worst-first heap. A candidate that would be evicted the
//! moment it is admitted is rejected before its producer runs, so nothing is
//! written for it.

use runtime_core::{Entry, Error, OfferOutcome, Result, Score, Sequence, WinnerPolicy};
use std::collections::BinaryHeap;
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

/// Admission decision taken before anything is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Below capacity, store without eviction
    Free,

    /// At capacity and better than the current worst
    Displace,

    /// At capacity and no better than the current worst
    Reject,
}

/// Best-K retention store
///
/// Lifetime is one training run: `Created -> (offer)* -> Finalized`.
#[derive(Debug)]
pub struct RetentionStore<H> {
    /// Maximum number of retained entries
    capacity: usize,

    /// Retained entries, worst on top
    entries: BinaryHeap<Entry<H>>,

    /// Sequence handed to the next offer
    next_sequence: Sequence,

    /// Winner selection used by `finalize`
    policy: WinnerPolicy,

    /// Set once finalized
    winner: Option<Entry<H>>,

    /// Evicted handles whose deletion failed
    orphans: Vec<H>,
}

impl<H> RetentionStore<H>
where
    H: Clone + Eq + fmt::Display,
{
    /// Create a store keeping at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        Ok(Self {
            capacity,
            entries: BinaryHeap::with_capacity(capacity + 1),
            next_sequence: 0,
            policy: WinnerPolicy::default(),
            winner: None,
            orphans: Vec::new(),
        })
    }

    /// Select which retained entry `finalize` designates
    pub fn with_winner_policy(mut self, policy: WinnerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if `finalize` has been called
    pub fn is_finalized(&self) -> bool {
        self.winner.is_some()
    }

    /// Check if `handle` is currently retained
    pub fn contains(&self, handle: &H) -> bool {
        self.entries.iter().any(|e| &e.handle == handle)
    }

    /// Handles that were evicted but could not be deleted
    pub fn orphans(&self) -> &[H] {
        &self.orphans
    }

    /// Offer a candidate with synchronous callbacks
    ///
    /// `make_handle` receives the candidate's sequence number and is called
    /// at most once, only when the candidate is kept. `delete_handle` is
    /// called at most once, with the evicted handle.
    pub fn offer<S, M, D, E>(
        &mut self,
        score: S,
        make_handle: M,
        delete_handle: D,
    ) -> Result<OfferOutcome<H>>
    where
        S: Into<Score>,
        M: FnOnce(Sequence) -> std::result::Result<H, E>,
        D: FnOnce(H) -> std::result::Result<(), E>,
        E: fmt::Display,
    {
        let score = score.into();
        let (sequence, admission) = self.admit(score)?;
        if admission == Admission::Reject {
            return Ok(OfferOutcome::RejectedWithoutWrite);
        }

        let handle = make_handle(sequence).map_err(|e| Error::MaterializationFailed {
            message: e.to_string(),
        })?;

        match self.commit(Entry::new(score, sequence, handle.clone()), admission)? {
            None => Ok(OfferOutcome::Accepted { handle }),
            Some(worst) => {
                let deleted = delete_handle(worst.handle.clone());
                self.settle_eviction(handle, worst, deleted)
            }
        }
    }

    /// Offer a candidate whose callbacks perform async I/O
    ///
    /// Same admission, atomicity and eviction rules as [`offer`](Self::offer).
    pub async fn offer_async<S, M, MF, D, DF, E>(
        &mut self,
        score: S,
        make_handle: M,
        delete_handle: D,
    ) -> Result<OfferOutcome<H>>
    where
        S: Into<Score>,
        M: FnOnce(Sequence) -> MF,
        MF: Future<Output = std::result::Result<H, E>>,
        D: FnOnce(H) -> DF,
        DF: Future<Output = std::result::Result<(), E>>,
        E: fmt::Display,
    {
        let score = score.into();
        let (sequence, admission) = self.admit(score)?;
        if admission == Admission::Reject {
            return Ok(OfferOutcome::RejectedWithoutWrite);
        }

        let handle = make_handle(sequence)
            .await
            .map_err(|e| Error::MaterializationFailed {
                message: e.to_string(),
            })?;

        match self.commit(Entry::new(score, sequence, handle.clone()), admission)? {
            None => Ok(OfferOutcome::Accepted { handle }),
            Some(worst) => {
                let deleted = delete_handle(worst.handle.clone()).await;
                self.settle_eviction(handle, worst, deleted)
            }
        }
    }

    /// Snapshot of the retained entries, best first
    pub fn peek_all(&self) -> Vec<Entry<H>> {
        self.entries.clone().into_sorted_vec()
    }

    /// The minimum-score entry
    pub fn best(&self) -> Option<&Entry<H>> {
        self.entries.iter().min()
    }

    /// The entry on top of the worst-first heap
    ///
    /// With more than one entry retained this is the worst of them, not the
    /// best. Use [`best`](Self::best) for the minimum-score entry.
    pub fn arbitrary_retained(&self) -> Option<&Entry<H>> {
        self.entries.peek()
    }

    /// The entry designated by `finalize`, once finalized
    pub fn winner(&self) -> Option<&Entry<H>> {
        self.winner.as_ref()
    }

    /// Close the store and return the winning handle
    ///
    /// Calling it again returns the same handle.
    pub fn finalize(&mut self) -> Result<H> {
        if let Some(winner) = &self.winner {
            return Ok(winner.handle.clone());
        }

        let winner = match self.policy {
            WinnerPolicy::Best => self.best(),
            WinnerPolicy::HeapTop => self.arbitrary_retained(),
        }
        .cloned()
        .ok_or(Error::EmptyStore)?;

        info!(
            handle = %winner.handle,
            score = %winner.score,
            retained = self.entries.len(),
            policy = ?self.policy,
            "Retention store finalized"
        );

        let handle = winner.handle.clone();
        self.winner = Some(winner);
        Ok(handle)
    }

    /// Assign a sequence number and decide admission without side effects
    fn admit(&mut self, score: Score) -> Result<(Sequence, Admission)> {
        if self.is_finalized() {
            return Err(Error::UseAfterFinalize);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.entries.len() < self.capacity {
            return Ok((sequence, Admission::Free));
        }

        let admission = match self.entries.peek() {
            Some(worst)
                if Entry::<H>::rank(&score, sequence, &worst.score, worst.sequence).is_lt() =>
            {
                Admission::Displace
            }
            _ => Admission::Reject,
        };

        if admission == Admission::Reject {
            debug!(
                score = %score,
                sequence,
                "Candidate no better than worst retained, skipping write"
            );
        }

        Ok((sequence, admission))
    }

    /// Insert a materialized entry, returning the evicted worst if any
    fn commit(&mut self, entry: Entry<H>, admission: Admission) -> Result<Option<Entry<H>>> {
        if self.contains(&entry.handle) {
            return Err(Error::DuplicateHandle {
                handle: entry.handle.to_string(),
            });
        }

        debug!(handle = %entry.handle, score = %entry.score, sequence = entry.sequence, "Retained candidate");
        self.entries.push(entry);

        if admission == Admission::Displace {
            return Ok(self.entries.pop());
        }
        Ok(None)
    }

    fn settle_eviction<E: fmt::Display>(
        &mut self,
        handle: H,
        worst: Entry<H>,
        deleted: std::result::Result<(), E>,
    ) -> Result<OfferOutcome<H>> {
        match deleted {
            Ok(()) => {
                debug!(evicted = %worst.handle, score = %worst.score, "Evicted worst candidate");
                Ok(OfferOutcome::AcceptedWithEviction {
                    handle,
                    evicted: worst.handle,
                })
            }
            Err(e) => {
                warn!(evicted = %worst.handle, error = %e, "Evicted artifact left behind");
                let message = e.to_string();
                let orphan = worst.handle.to_string();
                self.orphans.push(worst.handle);
                Err(Error::DeletionFailed {
                    handle: orphan,
                    message,
                })
            }
        }
    }
}
