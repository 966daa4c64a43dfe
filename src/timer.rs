// Copyright (c) 2026 Glacier Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred-callback timer queue: a min-heap of `(wakeup time, callback)`
//! served by one dedicated driver thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A callback scheduled to run on or after a deadline. Boxed so the queue
/// can hold heterogeneous closures; `None` is the shutdown sentinel.
type Callback = Option<Box<dyn FnOnce() + Send + 'static>>;

struct Entry {
    wakeup: Instant,
    callback: Callback,
    /// Tie-breaker so entries scheduled at the same instant remain FIFO-ish
    /// rather than comparing `Callback`, which has no natural order.
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.wakeup == other.wakeup && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest wakeup sorts first.
        other.wakeup.cmp(&self.wakeup).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Shared {
    heap: Mutex<BinaryHeap<Entry>>,
    condvar: Condvar,
    next_seq: Mutex<u64>,
}

/// A callback posted by the timer driver, ready to run on the I/O executor.
/// The driver never runs callbacks inline; it only moves them here.
pub type DueCallback = Box<dyn FnOnce() + Send + 'static>;

/// Priority-ordered deferred-callback scheduler.
pub struct TimerQueue {
    shared: Arc<Shared>,
    driver: Option<JoinHandle<()>>,
}

impl TimerQueue {
    /// Spawn the driver thread. Due callbacks are handed to `dispatch`,
    /// which should post them to the I/O executor rather than run them
    /// inline on the driver thread.
    pub fn spawn(dispatch: impl Fn(DueCallback) + Send + 'static) -> Self {
        let shared = Arc::new(Shared {
            heap: Mutex::new(BinaryHeap::new()),
            condvar: Condvar::new(),
            next_seq: Mutex::new(0),
        });
        let driver_shared = shared.clone();
        let driver = std::thread::spawn(move || Self::drive(driver_shared, dispatch));
        Self {
            shared,
            driver: Some(driver),
        }
    }

    fn drive(shared: Arc<Shared>, dispatch: impl Fn(DueCallback)) {
        loop {
            let mut heap = shared.heap.lock().expect("timer heap mutex poisoned");
            loop {
                match heap.peek() {
                    None => {
                        heap = shared.condvar.wait(heap).expect("timer condvar poisoned");
                    }
                    Some(top) => {
                        let now = Instant::now();
                        if top.wakeup <= now {
                            break;
                        }
                        let (guard, _) = shared
                            .condvar
                            .wait_timeout(heap, top.wakeup - now)
                            .expect("timer condvar poisoned");
                        heap = guard;
                    }
                }
            }
            let entry = heap.pop().expect("peeked entry must be present");
            drop(heap);
            match entry.callback {
                Some(cb) => dispatch(cb),
                None => return, // shutdown sentinel
            }
        }
    }

    /// Schedule `f` to run at or after `wakeup`.
    pub fn add(&self, wakeup: Instant, f: impl FnOnce() + Send + 'static) {
        self.push(wakeup, Some(Box::new(f)));
    }

    /// Schedule `f` to run after `delay`.
    pub fn add_after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        self.add(Instant::now() + delay, f);
    }

    fn push(&self, wakeup: Instant, callback: Callback) {
        let mut seq_guard = self.shared.next_seq.lock().expect("seq mutex poisoned");
        let seq = *seq_guard;
        *seq_guard += 1;
        drop(seq_guard);

        let mut heap = self.shared.heap.lock().expect("timer heap mutex poisoned");
        heap.push(Entry { wakeup, callback, seq });
        drop(heap);
        self.shared.condvar.notify_one();
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        // Post the null-callback sentinel so the driver exits; remaining
        // callbacks are dropped, not run.
        self.push(Instant::now(), None);
        if let Some(handle) = self.driver.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn due_callbacks_fire_in_wakeup_order() {
        let (tx, rx) = mpsc::channel::<u32>();
        let queue = TimerQueue::spawn(|cb| cb());
        let now = Instant::now();
        let tx2 = tx.clone();
        queue.add(now + Duration::from_millis(30), move || tx2.send(2).unwrap());
        queue.add(now + Duration::from_millis(5), move || tx.send(1).unwrap());

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 2);
    }

    #[test]
    fn drop_joins_driver_without_running_pending_callbacks_late() {
        let (tx, rx) = mpsc::channel::<u32>();
        {
            let queue = TimerQueue::spawn(|cb| cb());
            queue.add_after(Duration::from_millis(1), move || tx.send(1).unwrap());
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
    }
}
