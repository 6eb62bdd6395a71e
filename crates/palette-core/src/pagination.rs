//! Fixed-size paging over the merged component list.
//!
//! The backing list is assembled lazily by the first page request after a
//! reset and then served in contiguous slices. At most one page request per
//! generation is in flight: a request arriving while another of the same
//! generation is pending is dropped, not queued. A reset starts a new
//! generation, and the first request of the new generation takes the slot
//! over from any request still running for an older one.

use crate::error::Result;
use crate::types::{ComponentRecord, Page};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct PaginationState {
    page_size: usize,
    /// Non-empty pages served since the last reset.
    page_index: usize,
    /// `None` until the first request after a reset assembles it.
    backing: Option<Vec<ComponentRecord>>,
    /// Records served so far.
    served: usize,
    exhausted: bool,
}

impl PaginationState {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            page_index: 0,
            backing: None,
            served: 0,
            exhausted: false,
        }
    }

    fn exhausted_page(&self) -> Page {
        Page {
            records: Vec::new(),
            page_index: self.page_index,
            exhausted: true,
        }
    }

    fn advance(&mut self) -> Page {
        let backing = self.backing.as_deref().unwrap_or_default();
        let start = self.served.min(backing.len());
        let end = (start + self.page_size).min(backing.len());
        let records = backing[start..end].to_vec();

        self.exhausted = records.is_empty() || start + self.page_size >= backing.len();
        if !records.is_empty() {
            self.page_index += 1;
            self.served = end;
        }

        Page {
            records,
            page_index: self.page_index,
            exhausted: self.exhausted,
        }
    }
}

/// Marks the in-flight slot as free.
const IDLE: u64 = u64::MAX;

/// Releases the in-flight slot when a page request finishes, however it ends.
/// A slot already taken over by a newer generation is left alone.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self.slot.compare_exchange(
            self.generation,
            IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

pub struct PaginationStore {
    /// Generation of the request in flight, or `IDLE`.
    in_flight: AtomicU64,
    /// Bumped by every reset so a request spanning a reset discards its work.
    generation: AtomicU64,
    state: Mutex<PaginationState>,
}

impl PaginationStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            in_flight: AtomicU64::new(IDLE),
            generation: AtomicU64::new(0),
            state: Mutex::new(PaginationState::new(page_size)),
        }
    }

    /// Drop the backing list and rewind to the first page.
    ///
    /// Returns the new generation.
    pub async fn reset(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut state = self.state.lock().await;
        *state = PaginationState::new(state.page_size);
        generation
    }

    /// The current generation, bumped by every reset.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a page request is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) != IDLE
    }

    /// Serve the next page for the current generation.
    ///
    /// `assemble` builds the backing list and runs only for the first request
    /// after a reset. Returns `Ok(None)` when another request of the same
    /// generation is already in flight or when a reset happened while this
    /// one was assembling.
    pub async fn next_page<F, Fut>(&self, assemble: F) -> Result<Option<Page>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ComponentRecord>>>,
    {
        self.next_page_in(self.generation(), assemble).await
    }

    /// Serve the next page on behalf of `generation`.
    ///
    /// Returns `Ok(None)` straight away when `generation` is no longer current.
    pub async fn next_page_in<F, Fut>(&self, generation: u64, assemble: F) -> Result<Option<Page>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ComponentRecord>>>,
    {
        if self.generation() != generation {
            debug!("Page request for generation {} is stale", generation);
            return Ok(None);
        }
        if !self.claim(generation) {
            debug!("Page request dropped: another request is in flight");
            return Ok(None);
        }
        let _in_flight = InFlight {
            slot: &self.in_flight,
            generation,
        };

        let needs_backing = {
            let state = self.state.lock().await;
            if state.exhausted {
                return Ok(Some(state.exhausted_page()));
            }
            state.backing.is_none()
        };

        let assembled = if needs_backing {
            let records = assemble().await?;
            debug!("Assembled backing list of {} records", records.len());
            Some(records)
        } else {
            None
        };

        let mut state = self.state.lock().await;
        if self.generation() != generation {
            debug!("Discarding page request that spanned a reset");
            return Ok(None);
        }
        if let Some(records) = assembled {
            state.backing = Some(records);
        }
        Ok(Some(state.advance()))
    }

    /// Take the in-flight slot for `generation`. A slot held by an older
    /// generation is taken over; one held by the same or a newer generation
    /// is not.
    fn claim(&self, generation: u64) -> bool {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current != IDLE && current >= generation {
                return false;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                generation,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => {
                    if previous != IDLE {
                        debug!("Page request of generation {} superseded", previous);
                    }
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }
}
