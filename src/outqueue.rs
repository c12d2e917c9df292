//! Prioritized, rate-limited output queue.
//!
//! Outbound lines carry a [`Priority`]. While the queue is enabled, lines
//! are handed to a background sender thread that picks the most important
//! waiting line, applies the rate-limit policy's delay, and writes it to
//! the [`LineSink`]. `Immediate` lines and all lines while the queue is
//! disabled bypass the queue and go straight to the sink.
//!
//! Selection is not a static order: a line that has waited past the
//! starvation threshold wins over any higher-priority newcomer, so the
//! effective ordering depends on the clock and a scan is used instead of
//! a heap.

use std::io;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::EngineError;

/// Send priority of an outbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Background traffic (WHO polling, list refreshes).
    Low,
    /// Ordinary traffic.
    Normal,
    /// User-visible traffic (messages, joins).
    High,
    /// Bypasses the queue entirely (PONG, QUIT).
    Immediate,
}

/// Destination for wire lines leaving the queue.
pub trait LineSink: Send {
    /// Write one line (without line terminator) to the transport.
    fn send_line(&mut self, line: &str) -> io::Result<()>;
}

impl<F> LineSink for F
where
    F: FnMut(&str) -> io::Result<()> + Send,
{
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self(line)
    }
}

/// Decides how long to hold each outbound line.
pub trait RateLimitPolicy: Send {
    /// Delay to apply before sending the next line at `now`. Called once
    /// per queued line; the send is recorded by the call.
    fn delay_before_send(&mut self, now: Instant) -> Duration;

    /// The queue drained; limiting pressure can be released.
    fn on_drained(&mut self) {}
}

/// Policy that never delays.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimit;

impl RateLimitPolicy for NoLimit {
    fn delay_before_send(&mut self, _now: Instant) -> Duration {
        Duration::ZERO
    }
}

/// Rolling-window limiter.
///
/// Once more than `threshold` lines leave within `window`, every further
/// line is delayed by `delay` until the queue drains.
#[derive(Debug)]
pub struct WindowedRateLimiter {
    threshold: usize,
    window: Duration,
    delay: Duration,
    sent: Vec<Instant>,
    limiting: bool,
}

impl WindowedRateLimiter {
    /// Create a limiter from its parameters.
    pub fn new(threshold: usize, window: Duration, delay: Duration) -> Self {
        Self {
            threshold,
            window,
            delay,
            sent: Vec::new(),
            limiting: false,
        }
    }

    /// Whether limiting is currently engaged.
    pub fn is_limiting(&self) -> bool {
        self.limiting
    }
}

impl RateLimitPolicy for WindowedRateLimiter {
    fn delay_before_send(&mut self, now: Instant) -> Duration {
        let window = self.window;
        self.sent.retain(|t| now.duration_since(*t) < window);
        if self.sent.len() >= self.threshold {
            self.limiting = true;
        }
        self.sent.push(now);
        if self.limiting {
            self.delay
        } else {
            Duration::ZERO
        }
    }

    fn on_drained(&mut self) {
        self.limiting = false;
    }
}

#[derive(Debug)]
struct QueueItem {
    line: String,
    priority: Priority,
    seq: u64,
    enqueued_at: Instant,
}

struct Inner {
    queue: Vec<QueueItem>,
    enabled: bool,
    discarding: bool,
    shutdown: bool,
    seq: u64,
    sender: Option<std::thread::JoinHandle<()>>,
}

/// The output queue.
///
/// Shared behind an [`Arc`]; the sender thread holds only a [`Weak`] so
/// dropping the last user handle shuts everything down.
pub struct OutputQueue {
    inner: Mutex<Inner>,
    wakeup: Condvar,
    sink: Mutex<Box<dyn LineSink>>,
    policy: Mutex<Box<dyn RateLimitPolicy>>,
    starve_after: Duration,
}

/// A line older than this is sent before any higher-priority newcomer.
const DEFAULT_STARVE_AFTER: Duration = Duration::from_secs(10);

/// How long the sender thread sleeps between shutdown checks.
const SENDER_POLL: Duration = Duration::from_millis(200);

impl OutputQueue {
    /// Create a queue writing to `sink` under `policy`.
    pub fn new(sink: Box<dyn LineSink>, policy: Box<dyn RateLimitPolicy>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                queue: Vec::new(),
                enabled: true,
                discarding: false,
                shutdown: false,
                seq: 0,
                sender: None,
            }),
            wakeup: Condvar::new(),
            sink: Mutex::new(sink),
            policy: Mutex::new(policy),
            starve_after: DEFAULT_STARVE_AFTER,
        })
    }

    /// Enqueue (or directly send) one line.
    ///
    /// `Immediate` lines and all lines while the queue is disabled skip
    /// the queue and the rate limiter. While discarding, lines are
    /// silently dropped.
    pub fn send_line(self: &Arc<Self>, line: &str, priority: Priority) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return Err(EngineError::QueueClosed);
        }
        if inner.discarding {
            return Ok(());
        }
        if !inner.enabled || priority == Priority::Immediate {
            drop(inner);
            self.sink.lock().send_line(line)?;
            return Ok(());
        }
        let seq = inner.seq;
        inner.seq += 1;
        inner.queue.push(QueueItem {
            line: line.to_string(),
            priority,
            seq,
            enqueued_at: Instant::now(),
        });
        self.ensure_sender(&mut inner);
        self.wakeup.notify_one();
        Ok(())
    }

    /// Enable or disable queueing.
    ///
    /// Disabling stops the sender thread and synchronously drains every
    /// queued line to the sink in selection order.
    pub fn set_enabled(self: &Arc<Self>, enabled: bool) {
        let handle = {
            let mut inner = self.inner.lock();
            inner.enabled = enabled;
            if enabled {
                return;
            }
            inner.sender.take()
        };
        self.wakeup.notify_one();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        // Drain synchronously.
        loop {
            let item = {
                let mut inner = self.inner.lock();
                let now = Instant::now();
                pop_best(&mut inner.queue, now, self.starve_after)
            };
            let Some(item) = item else { break };
            if let Err(err) = self.sink.lock().send_line(&item.line) {
                tracing::warn!(%err, "sink write failed while draining");
            }
        }
        self.policy.lock().on_drained();
    }

    /// Drop all queued lines.
    pub fn clear(&self) {
        self.inner.lock().queue.clear();
    }

    /// When discarding, every submitted line is dropped.
    pub fn set_discarding(&self, discarding: bool) {
        self.inner.lock().discarding = discarding;
    }

    /// Number of lines waiting in the queue.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Shut the queue down. Queued lines are dropped; subsequent sends
    /// fail with [`EngineError::QueueClosed`].
    pub fn shutdown(&self) {
        let handle = {
            let mut inner = self.inner.lock();
            inner.shutdown = true;
            inner.queue.clear();
            inner.sender.take()
        };
        self.wakeup.notify_one();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn ensure_sender(self: &Arc<Self>, inner: &mut Inner) {
        let alive = inner
            .sender
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        if alive {
            return;
        }
        let weak = Arc::downgrade(self);
        inner.sender = Some(
            std::thread::Builder::new()
                .name("irctide-sender".into())
                .spawn(move || sender_loop(weak))
                .unwrap_or_else(|err| {
                    // Out of threads; the caller's next send retries.
                    tracing::error!(%err, "failed to spawn sender thread");
                    std::thread::spawn(|| {})
                }),
        );
    }
}

impl Drop for OutputQueue {
    fn drop(&mut self) {
        self.inner.get_mut().shutdown = true;
        self.wakeup.notify_one();
    }
}

fn sender_loop(weak: Weak<OutputQueue>) {
    loop {
        let Some(queue) = weak.upgrade() else { return };

        let item = {
            let mut inner = queue.inner.lock();
            if inner.shutdown || !inner.enabled {
                return;
            }
            if inner.queue.is_empty() {
                queue.policy.lock().on_drained();
                // Timed wait so the thread notices a dropped queue.
                let _ = queue.wakeup.wait_for(&mut inner, SENDER_POLL);
                None
            } else {
                let now = Instant::now();
                pop_best(&mut inner.queue, now, queue.starve_after)
            }
        };

        let Some(item) = item else {
            // Drop the strong handle before looping.
            drop(queue);
            continue;
        };

        let delay = queue.policy.lock().delay_before_send(Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let written = queue.sink.lock().send_line(&item.line);
        if let Err(err) = written {
            tracing::warn!(%err, "sink write failed, dropping line");
        }
    }
}

/// Pick the next line: any starved line first (oldest wins), otherwise
/// the highest priority, ties broken by submission order.
fn pop_best(queue: &mut Vec<QueueItem>, now: Instant, starve_after: Duration) -> Option<QueueItem> {
    if queue.is_empty() {
        return None;
    }
    let starved = queue
        .iter()
        .enumerate()
        .filter(|(_, item)| now.duration_since(item.enqueued_at) >= starve_after)
        .min_by_key(|(_, item)| item.seq)
        .map(|(i, _)| i);
    let index = starved.unwrap_or_else(|| {
        queue
            .iter()
            .enumerate()
            .max_by_key(|(_, item)| (item.priority, std::cmp::Reverse(item.seq)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    });
    Some(queue.swap_remove(index))
}
