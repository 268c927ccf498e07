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

use std::{
	collections::TryReserveError,
	ops::{Index, IndexMut},
	sync::Arc,
};

use crate::{mailbox::Mailbox, role::Role, ActorId, StatePtr, CAST_LIMIT, MAILBOX_CAPACITY};

/// Everything the runtime keeps about one actor.
pub(crate) struct CastEntry {
	/// The actor's private state slot, handed to every prompt.
	pub(crate) stateptr: StatePtr,
	pub(crate) role: Arc<Role>,
	/// Flips to false exactly once, when the last message is drained after a
	/// STOP (or after `accepting` went false).
	pub(crate) alive: bool,
	pub(crate) mailbox: Mailbox,
	/// False once the actor has processed a STOP; refuses further sends.
	pub(crate) accepting: bool,
	/// The interlock: true iff the actor sits in the ready queue or is being
	/// executed by a worker right now. It is what keeps a second worker from
	/// picking up an actor whose prompt is still running.
	pub(crate) queued: bool,
}

/// The actor table. Records are indexed by [`ActorId`] and live for the
/// whole life of the system; the table only ever grows.
pub(crate) struct Cast {
	entries: Vec<CastEntry>,
}

impl Cast {
	/// Fallible initial allocation, so `create` can report it as its own
	/// error rather than aborting.
	pub(crate) fn with_capacity(capacity: usize) -> Result<Cast, TryReserveError> {
		let mut entries = Vec::new();
		entries.try_reserve_exact(capacity)?;
		Ok(Cast { entries })
	}

	/// Adds a record for a new actor and returns its id. Ids are dense and
	/// assigned in creation order.
	pub(crate) fn add_member(&mut self, role: Arc<Role>) -> ActorId {
		if self.entries.len() >= *CAST_LIMIT {
			panic!("cast limit exceeded: {} actors already created", *CAST_LIMIT);
		}
		let id = self.entries.len();
		self.entries.push(CastEntry {
			stateptr: None,
			role,
			alive: true,
			mailbox: Mailbox::new(*MAILBOX_CAPACITY),
			accepting: true,
			queued: false,
		});
		id
	}

	/// Number of actors ever created; also the next id to be assigned.
	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}
}

impl Index<ActorId> for Cast {
	type Output = CastEntry;

	fn index(&self, id: ActorId) -> &CastEntry {
		&self.entries[id]
	}
}

impl IndexMut<ActorId> for Cast {
	fn index_mut(&mut self, id: ActorId) -> &mut CastEntry {
		&mut self.entries[id]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ActorContext, Payload, Prompt, StatePtr};

	fn noop(_ctx: &ActorContext, _state: &mut StatePtr, _nbytes: usize, _data: Payload) {}

	fn test_role() -> Arc<Role> {
		Arc::new(Role::new(vec![noop as Prompt]))
	}

	#[test]
	fn test_ids_are_dense_and_increasing() {
		let mut cast = Cast::with_capacity(4).unwrap();
		for expected_id in 0..10 {
			assert_eq!(cast.add_member(test_role()), expected_id);
		}
		assert_eq!(cast.len(), 10);
	}

	#[test]
	fn test_new_member_starts_idle_and_accepting() {
		let mut cast = Cast::with_capacity(4).unwrap();
		let id = cast.add_member(test_role());
		let entry = &cast[id];
		assert!(entry.alive);
		assert!(entry.accepting);
		assert!(!entry.queued);
		assert!(entry.stateptr.is_none());
		assert!(entry.mailbox.is_empty());
	}
}
