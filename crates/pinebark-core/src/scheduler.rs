//! Discrete-event scheduler with cancellable one-shot and repeating events.
//!
//! The `Scheduler` keeps a priority queue of pending firings ordered by
//! `(time, agent, enqueue sequence)`. Events due at the same time fire in
//! `AgentId` order, so two runs that schedule the same events fire them in
//! the same order.
//!
//! # Cancellation
//!
//! Every scheduling call returns an [`EventHandle`] holding a shared
//! cancellation flag. The flag is checked immediately before each firing, so
//! cancelling takes effect even for an event already queued for the time
//! being processed, and it can be done from inside any callback, including
//! the event's own.
//!
//! # Example
//!
//! ```
//! use pinebark_core::scheduler::Scheduler;
//! use pinebark_core::tree::AgentId;
//!
//! let mut scheduler: Scheduler<Vec<u64>> = Scheduler::new();
//! let handle = scheduler
//!     .schedule_repeating(1.0, 1.0, AgentId::new(7), |log: &mut Vec<u64>, ctx| {
//!         log.push(ctx.agent().as_u64());
//!         if log.len() == 3 {
//!             ctx.cancel_self();
//!         }
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut log = Vec::new();
//! scheduler.advance_to(10.0, &mut log).unwrap();
//! assert_eq!(log, vec![7, 7, 7]);
//! assert!(handle.is_cancelled());
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Result, SimError};
use crate::tree::AgentId;

/// Callback invoked when an event fires.
///
/// It receives the scheduler's context value and an [`EventContext`] for
/// the firing. Returning an error aborts the surrounding
/// [`Scheduler::advance_to`].
pub type EventFn<C> = dyn FnMut(&mut C, &mut EventContext<'_, C>) -> Result<()> + Send;

/// Identifier of a scheduled event, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Cancellation handle for a scheduled event.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct EventHandle {
    id: EventId,
    agent: AgentId,
    cancelled: Arc<AtomicBool>,
}

impl EventHandle {
    fn new(id: EventId, agent: AgentId) -> Self {
        Self {
            id,
            agent,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The event's id.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The agent the event belongs to.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Cancel the event. Returns true if this call did the cancelling.
    ///
    /// Cancelling twice, or cancelling a one-shot event that already fired,
    /// has no effect.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, AtomicOrdering::SeqCst)
    }

    /// Returns true once the event has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Recurrence {
    Once,
    Every(f64),
}

struct Pending<C> {
    handle: EventHandle,
    recurrence: Recurrence,
    callback: Box<EventFn<C>>,
}

/// A queued firing.
/// Ordering: (time ASC, agent ASC, seq ASC); wrapped in `Reverse` in the heap.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    time: f64,
    agent: AgentId,
    seq: u64,
    event: EventId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.agent.cmp(&other.agent))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Request made from inside a firing callback, applied after it returns.
struct Deferred<C> {
    time: f64,
    pending: Pending<C>,
}

/// View of the scheduler handed to a firing callback.
pub struct EventContext<'a, C> {
    now: f64,
    handle: &'a EventHandle,
    next_event: &'a mut u64,
    deferred: Vec<Deferred<C>>,
}

impl<C> EventContext<'_, C> {
    /// Time of the current firing.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Agent the firing event belongs to.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        self.handle.agent()
    }

    /// Handle of the firing event.
    #[must_use]
    pub fn handle(&self) -> &EventHandle {
        self.handle
    }

    /// Cancel the firing event. A repeating event is not re-enqueued.
    pub fn cancel_self(&self) -> bool {
        self.handle.cancel()
    }

    /// Schedule a one-shot event from inside a callback.
    ///
    /// The event is enqueued when the current callback returns; if `time`
    /// equals the current time it still fires within the ongoing advance.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTime`] if `time` is before the current
    /// time or not finite.
    pub fn schedule_once<F>(&mut self, time: f64, agent: AgentId, callback: F) -> Result<EventHandle>
    where
        F: FnMut(&mut C, &mut EventContext<'_, C>) -> Result<()> + Send + 'static,
    {
        check_start(time, self.now)?;
        let handle = EventHandle::new(allocate(self.next_event), agent);
        self.deferred.push(Deferred {
            time,
            pending: Pending {
                handle: handle.clone(),
                recurrence: Recurrence::Once,
                callback: Box::new(callback),
            },
        });
        Ok(handle)
    }

    /// Schedule a repeating event from inside a callback.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTime`] for a start before the current time,
    /// a non-positive or non-finite interval, or an interval too small to
    /// move time forward from `start`.
    pub fn schedule_repeating<F>(
        &mut self,
        start: f64,
        interval: f64,
        agent: AgentId,
        callback: F,
    ) -> Result<EventHandle>
    where
        F: FnMut(&mut C, &mut EventContext<'_, C>) -> Result<()> + Send + 'static,
    {
        check_start(start, self.now)?;
        check_interval(start, interval, self.now)?;
        let handle = EventHandle::new(allocate(self.next_event), agent);
        self.deferred.push(Deferred {
            time: start,
            pending: Pending {
                handle: handle.clone(),
                recurrence: Recurrence::Every(interval),
                callback: Box::new(callback),
            },
        });
        Ok(handle)
    }
}

/// Deterministic discrete-event scheduler over a context value `C`.
///
/// Callbacks get `&mut C` when they fire; the scheduler itself never looks
/// inside `C`.
pub struct Scheduler<C> {
    now: f64,
    queue: BinaryHeap<Reverse<QueueEntry>>,
    events: BTreeMap<EventId, Pending<C>>,
    next_event: u64,
    next_seq: u64,
    fired: u64,
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("queued", &self.queue.len())
            .field("events", &format!("[{} events]", self.events.len()))
            .field("fired", &self.fired)
            .finish()
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Scheduler<C> {
    /// Create an empty scheduler at time 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: 0.0,
            queue: BinaryHeap::new(),
            events: BTreeMap::new(),
            next_event: 0,
            next_seq: 0,
            fired: 0,
        }
    }

    /// Current scheduler time: the time of the last firing or the last
    /// `advance_to` target, whichever is later.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Total number of firings so far.
    #[must_use]
    pub fn events_fired(&self) -> u64 {
        self.fired
    }

    /// Number of scheduled events that have not been cancelled.
    #[must_use]
    pub fn live_events(&self) -> usize {
        self.events
            .values()
            .filter(|p| !p.handle.is_cancelled())
            .count()
    }

    /// Schedule a callback to fire once at `time`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTime`] if `time` is before the current
    /// time or not finite.
    pub fn schedule_once<F>(&mut self, time: f64, agent: AgentId, callback: F) -> Result<EventHandle>
    where
        F: FnMut(&mut C, &mut EventContext<'_, C>) -> Result<()> + Send + 'static,
    {
        check_start(time, self.now)?;
        let handle = EventHandle::new(allocate(&mut self.next_event), agent);
        self.enqueue(
            time,
            Pending {
                handle: handle.clone(),
                recurrence: Recurrence::Once,
                callback: Box::new(callback),
            },
        );
        Ok(handle)
    }

    /// Schedule a callback to fire at `start` and then every `interval`
    /// until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTime`] for a start before the current time,
    /// a non-positive or non-finite interval, or an interval too small to
    /// move time forward from `start`.
    pub fn schedule_repeating<F>(
        &mut self,
        start: f64,
        interval: f64,
        agent: AgentId,
        callback: F,
    ) -> Result<EventHandle>
    where
        F: FnMut(&mut C, &mut EventContext<'_, C>) -> Result<()> + Send + 'static,
    {
        check_start(start, self.now)?;
        check_interval(start, interval, self.now)?;
        let handle = EventHandle::new(allocate(&mut self.next_event), agent);
        self.enqueue(
            start,
            Pending {
                handle: handle.clone(),
                recurrence: Recurrence::Every(interval),
                callback: Box::new(callback),
            },
        );
        Ok(handle)
    }

    /// Cancel an event and drop its callback. Returns true if this call did
    /// the cancelling; cancelling twice or after a one-shot fired is a no-op.
    pub fn cancel(&mut self, handle: &EventHandle) -> bool {
        let cancelled = handle.cancel();
        self.events.remove(&handle.id());
        cancelled
    }

    /// Time of the earliest live event, if any.
    ///
    /// Cancelled entries at the head of the queue are discarded on the way.
    pub fn next_time(&mut self) -> Option<f64> {
        while let Some(Reverse(head)) = self.queue.peek().copied() {
            match self.events.get(&head.event) {
                Some(pending) if !pending.handle.is_cancelled() => return Some(head.time),
                Some(_) => {
                    self.events.remove(&head.event);
                }
                None => {}
            }
            self.queue.pop();
        }
        None
    }

    /// Returns true if no live events remain.
    pub fn is_empty(&mut self) -> bool {
        self.next_time().is_none()
    }

    /// Fire every event due at or before `until`, in order, then set the
    /// current time to `until`. Returns the number of firings.
    ///
    /// Repeating events are re-enqueued at `time + interval` after each
    /// firing unless they were cancelled during it, so a repeating event
    /// can fire several times within one call.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidTime`] if `until` is before the current time or
    ///   not finite
    /// - the first error returned by a callback; the scheduler stays
    ///   consistent and the current time is that of the failed firing
    pub fn advance_to(&mut self, until: f64, context: &mut C) -> Result<usize> {
        if until.is_nan() || until < self.now {
            return Err(SimError::InvalidTime {
                requested: until,
                now: self.now,
                reason: "cannot advance backwards",
            });
        }
        if !until.is_finite() {
            return Err(SimError::InvalidTime {
                requested: until,
                now: self.now,
                reason: "advance target must be finite",
            });
        }

        let mut fired = 0;
        while let Some(Reverse(entry)) = self.queue.peek().copied() {
            if entry.time > until {
                break;
            }
            self.queue.pop();
            let Some(mut pending) = self.events.remove(&entry.event) else {
                continue;
            };
            if pending.handle.is_cancelled() {
                continue;
            }

            self.now = entry.time;
            trace!(time = entry.time, agent = %entry.agent, event = entry.event.0, "firing event");

            let (outcome, deferred) = {
                let mut ctx = EventContext {
                    now: entry.time,
                    handle: &pending.handle,
                    next_event: &mut self.next_event,
                    deferred: Vec::new(),
                };
                let outcome = (pending.callback)(context, &mut ctx);
                (outcome, ctx.deferred)
            };
            fired += 1;
            self.fired += 1;

            for request in deferred {
                self.enqueue(request.time, request.pending);
            }
            let mut stalled = None;
            if let Recurrence::Every(interval) = pending.recurrence {
                if !pending.handle.is_cancelled() {
                    let next = entry.time + interval;
                    if next > entry.time {
                        self.enqueue(next, pending);
                    } else {
                        pending.handle.cancel();
                        stalled = Some(SimError::InvalidTime {
                            requested: interval,
                            now: entry.time,
                            reason: "repeat interval is below the time resolution",
                        });
                    }
                }
            }
            outcome?;
            if let Some(err) = stalled {
                return Err(err);
            }
        }
        self.now = until;
        Ok(fired)
    }

    fn enqueue(&mut self, time: f64, pending: Pending<C>) {
        let entry = QueueEntry {
            time,
            agent: pending.handle.agent(),
            seq: self.next_seq,
            event: pending.handle.id(),
        };
        self.next_seq += 1;
        self.events.insert(entry.event, pending);
        self.queue.push(Reverse(entry));
    }
}

fn allocate(counter: &mut u64) -> EventId {
    let id = EventId(*counter);
    *counter += 1;
    id
}

fn check_start(time: f64, now: f64) -> Result<()> {
    if !time.is_finite() {
        return Err(SimError::InvalidTime {
            requested: time,
            now,
            reason: "event time must be finite",
        });
    }
    if time < now {
        return Err(SimError::InvalidTime {
            requested: time,
            now,
            reason: "event time is in the past",
        });
    }
    Ok(())
}

fn check_interval(start: f64, interval: f64, now: f64) -> Result<()> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(SimError::InvalidTime {
            requested: interval,
            now,
            reason: "repeat interval must be finite and positive",
        });
    }
    if start + interval <= start {
        return Err(SimError::InvalidTime {
            requested: interval,
            now,
            reason: "repeat interval is below the time resolution",
        });
    }
    Ok(())
}
