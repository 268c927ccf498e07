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

use std::{fmt, sync::Arc};

use crate::{message::Message, scheduler::Scheduler, ActorId, SendError};

/// Handle given to every prompt invocation.
///
/// The runtime is not ambient global state, so this is how a running actor
/// reaches back into it: to learn its own id, and to send messages, to
/// other actors or to itself. Sending itself [`Message::spawn`] is how an
/// actor spawns a child, and [`Message::stop`] is how it retires.
pub struct ActorContext {
	scheduler: Arc<Scheduler>,
	actor_id: ActorId,
}

impl ActorContext {
	pub(crate) fn new(scheduler: Arc<Scheduler>, actor_id: ActorId) -> ActorContext {
		ActorContext { scheduler, actor_id }
	}

	/// Id of the actor whose prompt is currently running.
	pub fn self_id(&self) -> ActorId {
		self.actor_id
	}

	/// Sends a message. Exactly the same contract as
	/// [`ActorSystem::send`](crate::ActorSystem::send); in particular a send
	/// to the running actor itself just queues behind the message being
	/// handled.
	pub fn send(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		self.scheduler.send(target, message)
	}
}

impl fmt::Debug for ActorContext {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_tuple("ActorContext").field(&self.actor_id).finish()
	}
}
