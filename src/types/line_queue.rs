/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Fixed capacity ring of received lines between the receive interrupt and the updater.
//!
//! `head` is the oldest published slot and `tail` the newest. Both sit on `EMPTY_MARK`
//! (an index one past the last slot) while nothing is queued. The producer always writes into
//! [`LineQueue::write_slot`], which restarts at slot 0 whenever the queue drains.
//!
//! A completed line that finds every slot occupied is dropped and leaves a sticky
//! [`QueueError::Overflow`] behind for the consumer. Older unread lines are never overwritten.

use core::cell::{Cell, RefCell};
use core::fmt;

use critical_section::Mutex;
use heapless::Vec;

use super::srec::MAX_LINE_LEN;

pub const QUEUE_CAPACITY: usize = 4;
pub const LINE_CAPACITY: usize = MAX_LINE_LEN;

pub type Line = Vec<u8, LINE_CAPACITY>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum QueueError {
    /// A completed line found no free slot and was dropped
    Overflow,
    /// A line exceeded `LINE_CAPACITY` and was dropped
    LineTooLong,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "line queue overflow"),
            Self::LineTooLong => write!(f, "line too long"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Free for the producer
    Empty,
    /// Holds a complete line for the consumer
    Ready,
}

struct Slot {
    line: Line,
    state: SlotState,
}

impl Slot {
    const fn new() -> Self {
        Self {
            line: Vec::new(),
            state: SlotState::Empty,
        }
    }
}

pub struct LineQueue<const N: usize = QUEUE_CAPACITY> {
    slots: [Slot; N],
    head: usize,
    tail: usize,
    fault: Option<QueueError>,
}

impl<const N: usize> LineQueue<N> {
    const EMPTY_MARK: usize = N;

    pub const fn new() -> Self {
        Self {
            slots: [const { Slot::new() }; N],
            head: Self::EMPTY_MARK,
            tail: Self::EMPTY_MARK,
            fault: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == Self::EMPTY_MARK && self.tail == Self::EMPTY_MARK
    }

    pub fn is_full(&self) -> bool {
        !self.is_empty() && (self.tail + 1) % N == self.head
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.tail + N - self.head) % N + 1
        }
    }

    /// Slot the next published line lands in.
    pub fn write_slot(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.tail + 1) % N
        }
    }

    pub fn slot_state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|slot| slot.state)
    }

    /// Advance `tail` over a slot the producer has just filled.
    fn enqueue(&mut self) -> Result<(), QueueError> {
        if self.is_empty() {
            self.head = 0;
            self.tail = 0;
        } else if self.is_full() {
            return Err(QueueError::Overflow);
        } else {
            self.tail = (self.tail + 1) % N;
        }
        Ok(())
    }

    /// Advance `head` past the slot the consumer has just released.
    fn dequeue(&mut self) {
        if self.is_empty() {
            // nothing queued
        } else if self.head == self.tail {
            self.head = Self::EMPTY_MARK;
            self.tail = Self::EMPTY_MARK;
        } else {
            self.head = (self.head + 1) % N;
        }
    }

    /// Copy `line` into the write slot, flag it `Ready` and enqueue it.
    ///
    /// Returns the slot index. On failure the line is dropped and the fault is latched.
    pub fn publish(&mut self, line: &[u8]) -> Result<usize, QueueError> {
        if self.is_full() {
            return Err(self.raise(QueueError::Overflow));
        }

        let index = self.write_slot();
        let slot = &mut self.slots[index];
        slot.line.clear();
        if slot.line.extend_from_slice(line).is_err() {
            return Err(self.raise(QueueError::LineTooLong));
        }
        slot.state = SlotState::Ready;
        self.enqueue()?;

        Ok(index)
    }

    /// Oldest published line, if any.
    pub fn front(&self) -> Option<&[u8]> {
        if self.is_empty() {
            return None;
        }
        let slot = &self.slots[self.head];
        (slot.state == SlotState::Ready).then_some(slot.line.as_slice())
    }

    /// Flag the oldest slot `Empty` and dequeue it. Returns the released slot index.
    pub fn release(&mut self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let index = self.head;
        self.slots[index].state = SlotState::Empty;
        self.dequeue();
        Some(index)
    }

    /// Latch a producer side fault; the first one wins.
    pub fn raise(&mut self, error: QueueError) -> QueueError {
        self.fault.get_or_insert(error);
        error
    }

    pub fn take_fault(&mut self) -> Option<QueueError> {
        self.fault.take()
    }
}

impl<const N: usize> Default for LineQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`LineQueue`] that can live in a `static` and be split into its two ends.
pub struct SharedLineQueue<const N: usize = QUEUE_CAPACITY> {
    queue: Mutex<RefCell<LineQueue<N>>>,
    taken: Mutex<Cell<bool>>,
}

impl<const N: usize> SharedLineQueue<N> {
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(LineQueue::new())),
            taken: Mutex::new(Cell::new(false)),
        }
    }

    /// Hand out the producer and consumer ends. Only the first call succeeds.
    pub fn split(&self) -> Option<(LineProducer<'_, N>, LineConsumer<'_, N>)> {
        let first = critical_section::with(|cs| !self.taken.borrow(cs).replace(true));
        first.then(|| {
            (
                LineProducer { queue: &self.queue },
                LineConsumer { queue: &self.queue },
            )
        })
    }
}

impl<const N: usize> Default for SharedLineQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt side end: can only publish lines and raise faults.
pub struct LineProducer<'a, const N: usize = QUEUE_CAPACITY> {
    queue: &'a Mutex<RefCell<LineQueue<N>>>,
}

impl<const N: usize> LineProducer<'_, N> {
    pub fn publish(&mut self, line: &[u8]) -> Result<usize, QueueError> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).publish(line))
    }

    pub fn raise(&mut self, error: QueueError) {
        critical_section::with(|cs| {
            self.queue.borrow_ref_mut(cs).raise(error);
        });
    }
}

/// Foreground end: reads and releases lines.
pub struct LineConsumer<'a, const N: usize = QUEUE_CAPACITY> {
    queue: &'a Mutex<RefCell<LineQueue<N>>>,
}

impl<const N: usize> LineConsumer<'_, N> {
    pub fn line_ready(&self) -> bool {
        critical_section::with(|cs| self.queue.borrow_ref(cs).front().is_some())
    }

    /// Copy the oldest ready line into `buf` without releasing it.
    pub fn receive_line(&mut self, buf: &mut Line) -> bool {
        critical_section::with(|cs| match self.queue.borrow_ref(cs).front() {
            Some(line) => {
                buf.clear();
                // slot and buffer share a capacity
                buf.extend_from_slice(line).is_ok()
            }
            None => false,
        })
    }

    pub fn release(&mut self) -> Option<usize> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).release())
    }

    pub fn take_fault(&mut self) -> Option<QueueError> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).take_fault())
    }
}
