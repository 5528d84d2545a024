/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Byte to line assembly, driven from the receive interrupt.

use crate::types::line_queue::{Line, LineProducer, QueueError, QUEUE_CAPACITY};

pub struct LineReceiver<'a, const N: usize = QUEUE_CAPACITY> {
    producer: LineProducer<'a, N>,
    buffer: Line,
    overlong: bool,
}

impl<'a, const N: usize> LineReceiver<'a, N> {
    pub fn new(producer: LineProducer<'a, N>) -> Self {
        Self {
            producer,
            buffer: Line::new(),
            overlong: false,
        }
    }

    /// Feed one received byte.
    ///
    /// Returns the slot a line was published to when `byte` completed one. `\r` and `\0` are
    /// dropped and blank lines are skipped.
    pub fn on_byte(&mut self, byte: u8) -> Result<Option<usize>, QueueError> {
        match byte {
            b'\r' | b'\0' => Ok(None),
            b'\n' => self.finish_line(),
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.overlong = true;
                }
                Ok(None)
            }
        }
    }

    fn finish_line(&mut self) -> Result<Option<usize>, QueueError> {
        let overlong = core::mem::replace(&mut self.overlong, false);
        let result = if overlong {
            self.producer.raise(QueueError::LineTooLong);
            Err(QueueError::LineTooLong)
        } else if self.buffer.is_empty() {
            Ok(None)
        } else {
            self.producer.publish(&self.buffer).map(Some)
        };
        self.buffer.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::line_queue::{SharedLineQueue, LINE_CAPACITY};

    fn feed<const N: usize>(
        receiver: &mut LineReceiver<'_, N>,
        bytes: &[u8],
    ) -> Result<Option<usize>, QueueError> {
        let mut last = Ok(None);
        for &b in bytes {
            last = receiver.on_byte(b);
            if last.is_err() {
                return last;
            }
        }
        last
    }

    #[test]
    fn publishes_on_line_feed_and_strips_carriage_return() {
        let shared: SharedLineQueue<4> = SharedLineQueue::new();
        let (producer, mut consumer) = shared.split().unwrap();
        let mut receiver = LineReceiver::new(producer);

        assert_eq!(feed(&mut receiver, b"S104000000FB\r"), Ok(None));
        assert!(!consumer.line_ready());
        assert_eq!(receiver.on_byte(b'\n'), Ok(Some(0)));

        let mut line = Line::new();
        assert!(consumer.receive_line(&mut line));
        assert_eq!(line.as_slice(), b"S104000000FB");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let shared: SharedLineQueue<4> = SharedLineQueue::new();
        let (producer, consumer) = shared.split().unwrap();
        let mut receiver = LineReceiver::new(producer);

        assert_eq!(feed(&mut receiver, b"\r\n\n\0\n"), Ok(None));
        assert!(!consumer.line_ready());
    }

    #[test]
    fn consecutive_lines_fill_consecutive_slots() {
        let shared: SharedLineQueue<4> = SharedLineQueue::new();
        let (producer, mut consumer) = shared.split().unwrap();
        let mut receiver = LineReceiver::new(producer);

        assert_eq!(feed(&mut receiver, b"A\n"), Ok(Some(0)));
        assert_eq!(feed(&mut receiver, b"B\r\n"), Ok(Some(1)));
        assert_eq!(consumer.release(), Some(0));
        assert_eq!(feed(&mut receiver, b"C\n"), Ok(Some(2)));
    }

    #[test]
    fn full_queue_drops_line_and_signals() {
        let shared: SharedLineQueue<2> = SharedLineQueue::new();
        let (producer, mut consumer) = shared.split().unwrap();
        let mut receiver = LineReceiver::new(producer);

        feed(&mut receiver, b"A\nB\n").unwrap();
        assert_eq!(feed(&mut receiver, b"C\n"), Err(QueueError::Overflow));
        assert_eq!(consumer.take_fault(), Some(QueueError::Overflow));

        // unread lines survive
        let mut line = Line::new();
        consumer.receive_line(&mut line);
        assert_eq!(line.as_slice(), b"A");
    }

    #[test]
    fn overlong_line_is_dropped_and_receiver_recovers() {
        let shared: SharedLineQueue<4> = SharedLineQueue::new();
        let (producer, mut consumer) = shared.split().unwrap();
        let mut receiver = LineReceiver::new(producer);

        for _ in 0..LINE_CAPACITY + 10 {
            assert_eq!(receiver.on_byte(b'0'), Ok(None));
        }
        assert_eq!(receiver.on_byte(b'\n'), Err(QueueError::LineTooLong));
        assert!(!consumer.line_ready());
        assert_eq!(consumer.take_fault(), Some(QueueError::LineTooLong));

        assert_eq!(feed(&mut receiver, b"S9030000FC\n"), Ok(Some(0)));
    }
}
