//! A fixed-horizon sliding window counter for recording and querying event counts.
//!
//! `EventCounter` keeps one bucket per second for the last `max_timespan` seconds.
//! Events are recorded into the bucket of the second they occurred in, and a
//! query sums the buckets of the trailing window it asks about.
//!
//! This allows efficient answers to:
//! - How many events occurred in the last N seconds (`event_count()`)
//! - Average event rate over a trailing window (`rate_per_second()`)
//!
//! The buffer is rolled forward lazily on every record or query; there is no
//! background thread or timer. Buckets whose second falls out of the horizon
//! are zeroed before the slot is reused, so memory stays fixed at
//! `max_timespan` buckets for the life of the counter.
//!
//! Resolution is one whole second. A query for "the last W seconds" is
//! answered as the W whole seconds ending at the current second, so up to one
//! second's worth of events at the oldest edge of the window may be missed or
//! included relative to the exact sub-second instant of the call. The current
//! (partial) second is always fully included.
//!
//! ## Example
//! ```rust
//! use event_counter::EventCounter;
//!
//! let counter = EventCounter::new(300).unwrap();
//! counter.record(); // one event, now
//! counter.record_events(45).unwrap(); // a batch, now
//! assert_eq!(counter.event_count(300).unwrap(), 46);
//! ```

use std::fmt::Debug;

use chrono::Utc;
use log::debug;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// A thread-safe counter of events over a fixed trailing horizon.
///
/// Shared by reference (typically behind an `Arc`) between many concurrent
/// writers; all state lives behind a single internal lock whose critical
/// sections are O(1) amortized.
pub struct EventCounter {
    max_timespan: u64,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Per-second tallies, indexed by `second % capacity`.
    buckets: Vec<u64>,
    /// The absolute second the buffer has been rolled forward to. Every
    /// bucket is valid for exactly one second in
    /// `[last_second - capacity + 1, last_second]`. `None` until the first
    /// record or query.
    last_second: Option<u64>,
}

impl EventCounter {
    /// Creates a counter able to answer queries up to `max_timespan_seconds`
    /// back in time.
    ///
    /// This allocates one bucket per second of horizon; be reasonable about
    /// how large you make it.
    pub fn new(max_timespan_seconds: u64) -> Result<Self> {
        if max_timespan_seconds == 0 {
            return Err(Error::InvalidTimespan);
        }
        Ok(EventCounter {
            max_timespan: max_timespan_seconds,
            inner: Mutex::new(Inner {
                buckets: vec![0; max_timespan_seconds as usize],
                last_second: None,
            }),
        })
    }

    /// The configured horizon, in seconds.
    #[inline]
    pub fn max_timespan(&self) -> u64 {
        self.max_timespan
    }

    /// Records one event at the current wall-clock time.
    #[inline]
    pub fn record(&self) {
        self.apply(current_second(), 1);
    }

    /// Records `count` events at the current wall-clock time, all attributed
    /// to the same second.
    ///
    /// Returns [`Error::InvalidEventCount`] when `count` is zero.
    #[inline]
    pub fn record_events(&self, count: u64) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidEventCount);
        }
        self.apply(current_second(), count);
        Ok(())
    }

    /// Records `count` events at an explicit timestamp, given as real-valued
    /// seconds since the Unix epoch. The bucket is chosen by truncation
    /// (`floor`), never rounding.
    ///
    /// A timestamp older than the retained horizon is silently dropped: the
    /// event arrived too late to be recorded, which is expected behavior and
    /// not an error. A timestamp newer than the buffer's current second rolls
    /// the buffer forward.
    ///
    /// Returns [`Error::InvalidEventCount`] when `count` is zero.
    pub fn record_events_at(&self, timestamp: f64, count: u64) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidEventCount);
        }
        self.apply(bucket_second(timestamp), count);
        Ok(())
    }

    /// Returns the number of events recorded in the last `window_seconds`
    /// seconds.
    ///
    /// `window_seconds` must lie in `[1, max_timespan]`; anything else is
    /// [`Error::WindowOutOfRange`], never silently clamped. The answer covers
    /// the `window_seconds` whole seconds ending at the current second; see
    /// the module docs for the one-second edge approximation this implies.
    pub fn event_count(&self, window_seconds: u64) -> Result<u64> {
        self.count_at(current_second(), window_seconds)
    }

    /// Returns the average events per second over the last `window_seconds`
    /// seconds.
    ///
    /// Same argument validation as [`event_count`](Self::event_count).
    pub fn rate_per_second(&self, window_seconds: u64) -> Result<f64> {
        let count = self.event_count(window_seconds)?;
        Ok(count as f64 / window_seconds as f64)
    }

    /// Rolls the buffer forward and adds `count` to the bucket for `second`,
    /// unless that second has already been evicted.
    fn apply(&self, second: u64, count: u64) {
        let mut inner = self.inner.lock();
        let last = inner.advance_to(second);
        // Writes older than the retained window are a silent no-op.
        if second < last.saturating_sub(self.max_timespan - 1) {
            return;
        }
        let index = (second % self.max_timespan) as usize;
        inner.buckets[index] = inner.buckets[index].saturating_add(count);
    }

    /// Sums the `window_seconds` buckets ending at `now_second`, advancing
    /// the buffer first so stale slots cannot contribute.
    fn count_at(&self, now_second: u64, window_seconds: u64) -> Result<u64> {
        if window_seconds == 0 || window_seconds > self.max_timespan {
            return Err(Error::WindowOutOfRange {
                requested: window_seconds,
                max: self.max_timespan,
            });
        }
        let mut inner = self.inner.lock();
        let last = inner.advance_to(now_second);
        let oldest = last.saturating_sub(window_seconds - 1);
        let total = (oldest..=last)
            .map(|second| inner.buckets[(second % self.max_timespan) as usize])
            .fold(0u64, u64::saturating_add);
        Ok(total)
    }
}

impl Inner {
    /// Rolls the buffer forward so that every slot is valid for a second in
    /// `[second - capacity + 1, second]`, zeroing each slot that changes
    /// hands before it can be reused. Returns the advance point, which is
    /// unchanged when `second` is not newer than it.
    ///
    /// The cost is bounded by `min(gap, capacity)`: a clock gap of at least
    /// the full horizon is handled as a single sweep over the buffer rather
    /// than second by second.
    fn advance_to(&mut self, second: u64) -> u64 {
        let capacity = self.buckets.len() as u64;
        let last = match self.last_second {
            Some(last) => last,
            None => {
                // First access; the buffer is still all zeroes from
                // construction, so it is valid for any advance point.
                self.last_second = Some(second);
                return second;
            }
        };
        if second <= last {
            return last;
        }
        if second - last >= capacity {
            debug!(
                "clock advanced {}s, past the {}s horizon; clearing all buckets",
                second - last,
                capacity
            );
            self.buckets.iter_mut().for_each(|bucket| *bucket = 0);
        } else {
            for reused in (last + 1)..=second {
                self.buckets[(reused % capacity) as usize] = 0;
            }
        }
        self.last_second = Some(second);
        second
    }
}

impl Debug for EventCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventCounter")
            .field("max_timespan", &self.max_timespan)
            .field("last_second", &inner.last_second)
            .finish()
    }
}

/// The current wall-clock second, truncated.
#[inline]
fn current_second() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// The bucket second for a real-valued timestamp. `as` truncates toward
/// zero, which is `floor` for the non-negative timestamps this counter
/// deals in, and saturates rather than wrapping on out-of-range input.
#[inline]
fn bucket_second(timestamp: f64) -> u64 {
    timestamp as u64
}
