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

use std::{any::Any, fmt, mem, sync::Arc};

use crate::role::Role;

/// Identifier of an actor.
///
/// Identifiers are dense: they are assigned in strictly increasing order
/// starting at 0 and are never reused, so they double as indices into the
/// actor table.
pub type ActorId = usize;

/// Tag of a message.
///
/// Apart from the three reserved tags below, a tag is an index into the
/// prompt table of the receiving actor's [`Role`].
pub type MessageType = u64;

/// First message delivered to every actor right after it is spawned.
///
/// Its payload is a boxed [`ActorId`] carrying the id of the actor that
/// processed the SPAWN (the root actor receives its own id, 0).
pub const MSG_HELLO: MessageType = 0;

/// Creates a child actor. The payload is the `Arc<Role>` of the child.
pub const MSG_SPAWN: MessageType = 0x0605_7a6e;

/// Tells the receiving actor to stop accepting new messages.
///
/// Messages already sitting in its mailbox are still processed; the actor
/// dies once the mailbox runs dry.
pub const MSG_STOP: MessageType = 0x60be_dead;

/// Opaque message payload.
///
/// Payloads flow through the runtime untouched: they are moved from the
/// sender to the handler of the receiving actor, which takes ownership.
/// Messages can carry payloads of different types but need to be pushed to
/// a queue with a single type, hence the erasure.
pub type Payload = Option<Box<dyn Any + Send>>;

/// A single message: a tag, a payload size hint and an opaque payload.
pub struct Message {
	message_type: MessageType,
	nbytes: usize,
	data: Payload,
}

impl Message {
	pub fn new(message_type: MessageType, nbytes: usize, data: Payload) -> Message {
		Message { message_type, nbytes, data }
	}

	/// A SPAWN message carrying the role of the child to create.
	pub fn spawn(role: Arc<Role>) -> Message {
		Message {
			message_type: MSG_SPAWN,
			nbytes: mem::size_of::<Arc<Role>>(),
			data: Some(Box::new(role)),
		}
	}

	/// A STOP message. No payload.
	pub fn stop() -> Message {
		Message { message_type: MSG_STOP, nbytes: 0, data: None }
	}

	/// The HELLO greeting enqueued by the runtime when an actor is spawned.
	pub(crate) fn hello(parent: ActorId) -> Message {
		Message {
			message_type: MSG_HELLO,
			nbytes: mem::size_of::<ActorId>(),
			data: Some(Box::new(parent)),
		}
	}

	pub fn message_type(&self) -> MessageType {
		self.message_type
	}

	pub(crate) fn into_parts(self) -> (MessageType, usize, Payload) {
		(self.message_type, self.nbytes, self.data)
	}

	/// Extracts the role descriptor of a SPAWN message.
	///
	/// A SPAWN without a role payload is a protocol violation, and fatal.
	pub(crate) fn expect_spawn_role(self) -> Arc<Role> {
		self.data
			.and_then(|data| data.downcast::<Arc<Role>>().ok())
			.map(|role| *role)
			.unwrap_or_else(|| panic!("SPAWN message does not carry a role descriptor"))
	}
}

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Message")
			.field("message_type", &self.message_type)
			.field("nbytes", &self.nbytes)
			.field("has_payload", &self.data.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::role::{Prompt, Role};

	fn noop(
		_ctx: &crate::ActorContext,
		_state: &mut crate::StatePtr,
		_nbytes: usize,
		_data: Payload,
	) {
	}

	#[test]
	fn test_hello_carries_parent_id() {
		let (message_type, nbytes, data) = Message::hello(42).into_parts();
		assert_eq!(message_type, MSG_HELLO);
		assert_eq!(nbytes, mem::size_of::<ActorId>());
		let parent = *data.unwrap().downcast::<ActorId>().unwrap();
		assert_eq!(parent, 42);
	}

	#[test]
	fn test_spawn_roundtrips_its_role() {
		let role = Arc::new(Role::new(vec![noop as Prompt]));
		let message = Message::spawn(role.clone());
		assert_eq!(message.message_type(), MSG_SPAWN);
		let extracted = message.expect_spawn_role();
		assert!(Arc::ptr_eq(&role, &extracted));
	}

	#[test]
	#[should_panic(expected = "does not carry a role descriptor")]
	fn test_spawn_without_role_is_fatal() {
		Message::new(MSG_SPAWN, 0, None).expect_spawn_role();
	}

	#[test]
	fn test_stop_has_no_payload() {
		let (message_type, nbytes, data) = Message::stop().into_parts();
		assert_eq!(message_type, MSG_STOP);
		assert_eq!(nbytes, 0);
		assert!(data.is_none());
	}
}
