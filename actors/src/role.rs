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

use std::{any::Any, fmt};

use crate::{actor_context::ActorContext, message::MessageType, Payload};

/// The mutable slot holding an actor's private state.
///
/// Roles are heterogeneous, so the state is type-erased: a prompt downcasts
/// it to whatever it stored there, and may replace it wholesale. It starts
/// out as `None` for a freshly spawned actor.
pub type StatePtr = Option<Box<dyn Any + Send>>;

/// A message handler.
///
/// Prompts run with the coordinator unlocked, one at a time per actor. The
/// context gives access to the running actor's id and to `send`. The last
/// two arguments are the size hint and the payload of the message being
/// handled; the payload is owned by the prompt from this point on.
pub type Prompt = fn(&ActorContext, &mut StatePtr, usize, Payload);

/// A role is the immutable dispatch table shared by every actor playing it.
///
/// A message with tag `t` dispatches to `prompts[t]`. Tags outside the
/// table that are not one of the reserved ones are a protocol violation.
pub struct Role {
	prompts: Vec<Prompt>,
}

impl Role {
	pub fn new(prompts: Vec<Prompt>) -> Role {
		Role { prompts }
	}

	pub fn nprompts(&self) -> usize {
		self.prompts.len()
	}

	/// Looks up the prompt dispatched for `message_type`. Fatal for any tag
	/// the table does not cover: such a message indicates a bug in the
	/// sending role that recovery would only mask.
	pub(crate) fn prompt(&self, message_type: MessageType) -> Prompt {
		usize::try_from(message_type)
			.ok()
			.and_then(|index| self.prompts.get(index))
			.copied()
			.unwrap_or_else(|| {
				panic!("no prompt registered for message type {message_type:#x}")
			})
	}
}

impl fmt::Debug for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Role").field("nprompts", &self.prompts.len()).finish()
	}
}
