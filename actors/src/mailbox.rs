// Copyright (C) 2023 QuerentAI LLC.
// This file is part of Querent.

// The Licensed Work is licensed under the Business Source License 1.1 (BSL 1.1).
// You may use this file in compliance with the BSL 1.1, subject to the following restrictions:
// 1. You may not use the Licensed Work for AI-related services, database services,
//    or any service or product offering that provides database, big data, or analytics
//    services to third parties unless explicitly authorized by QuerentAI LLC.
// 2. For more details, see the LICENSE file or visit https://mariadb.com/bsl11/.

// For inquiries about alternative licensing arrangements, please contact contact@querent.xyz.

// The Licensed Work is provided "AS IS", WITHOUT WARRANTY OF ANY KIND, express or implied,
// including but not limited to the warranties of merchantability, fitness for a particular purpose,
// and non-infringement. See the Business Source License for more details.

// This software includes code developed by QuerentAI LLC (https://querent.xyz).

use std::collections::VecDeque;

use crate::message::Message;

/// Bounded FIFO of the messages pending for one actor.
///
/// The capacity is fixed at spawn time. Overflow is fatal rather than
/// blocking: the only thread able to drain a mailbox may be the sender
/// itself, so a blocking policy could deadlock. All operations run with the
/// coordinator mutex held.
pub(crate) struct Mailbox {
	queue: VecDeque<Message>,
	capacity: usize,
}

impl Mailbox {
	pub(crate) fn new(capacity: usize) -> Mailbox {
		Mailbox { queue: VecDeque::with_capacity(capacity), capacity }
	}

	pub(crate) fn push(&mut self, message: Message) {
		if self.queue.len() == self.capacity {
			panic!("mailbox overflow: {} messages pending", self.capacity);
		}
		self.queue.push_back(message);
	}

	pub(crate) fn pop(&mut self) -> Message {
		self.queue.pop_front().unwrap_or_else(|| panic!("pop from an empty mailbox"))
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.queue.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::message::Message;

	#[test]
	fn test_messages_come_out_in_arrival_order() {
		let mut mailbox = Mailbox::new(8);
		for tag in 0..5u64 {
			mailbox.push(Message::new(tag, 0, None));
		}
		for tag in 0..5u64 {
			assert_eq!(mailbox.pop().message_type(), tag);
		}
		assert!(mailbox.is_empty());
	}

	#[test]
	fn test_fill_to_capacity_is_fine() {
		let mut mailbox = Mailbox::new(4);
		for tag in 0..4u64 {
			mailbox.push(Message::new(tag, 0, None));
		}
		assert_eq!(mailbox.len(), 4);
	}

	#[test]
	#[should_panic(expected = "mailbox overflow")]
	fn test_overflow_is_fatal() {
		let mut mailbox = Mailbox::new(2);
		for tag in 0..3u64 {
			mailbox.push(Message::new(tag, 0, None));
		}
	}

	#[test]
	#[should_panic(expected = "empty mailbox")]
	fn test_pop_from_empty_is_fatal() {
		Mailbox::new(2).pop();
	}

	#[test]
	fn test_capacity_is_reusable_after_draining() {
		// Cycle several times the capacity through the queue.
		let mut mailbox = Mailbox::new(3);
		for round in 0..4u64 {
			for tag in 0..3u64 {
				mailbox.push(Message::new(round * 3 + tag, 0, None));
			}
			for tag in 0..3u64 {
				assert_eq!(mailbox.pop().message_type(), round * 3 + tag);
			}
		}
	}
}
