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

//! The coordinator: one mutex, one condition variable, and the worker loop.
//!
//! Every shared structure (the cast, each mailbox, the ready queue, the
//! counters) is guarded by the single scheduler mutex. That is enough
//! because the only long-running operation, a user prompt, runs with the
//! mutex released; what keeps a released actor from being entered twice is
//! the `queued` bit, not a lock.

use std::{cell::Cell, collections::VecDeque, sync::Arc};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::debug;

use crate::{
	actor_context::ActorContext,
	cast::Cast,
	drain::{self, DrainAgent},
	message::{Message, MSG_SPAWN, MSG_STOP},
	role::Role,
	ActorId, SendError,
};

/// Initial capacity of the ready queue, in actor ids.
const READY_QUEUE_INITIAL_CAPACITY: usize = 256;

thread_local! {
	static CURRENT_ACTOR: Cell<Option<ActorId>> = const { Cell::new(None) };
}

/// Id of the actor whose prompt is running on this thread, if any.
pub(crate) fn current_actor() -> Option<ActorId> {
	CURRENT_ACTOR.with(|current| current.get())
}

pub(crate) struct Scheduler {
	state: Mutex<SchedulerState>,
	/// Workers sleep here while the ready queue is empty. One waiter is
	/// signalled per enqueued actor; shutdown broadcasts to everyone.
	work_available: Condvar,
}

pub(crate) struct SchedulerState {
	pub(crate) cast: Cast,
	/// Global FIFO of actors that have messages and are not running.
	ready: VecDeque<ActorId>,
	pub(crate) n_alive: usize,
	sleeping_workers: usize,
	pub(crate) shutdown: bool,
	/// Set by the drain agent; SPAWN messages are ignored from then on.
	pub(crate) no_more_spawns: bool,
	pub(crate) drain: DrainAgent,
}

impl SchedulerState {
	/// Takes the next actor to run. The actor keeps `queued` set for as
	/// long as a worker holds it: the bit covers both "waiting on ready"
	/// and "executing", which is exactly what keeps the send path from
	/// scheduling a second worker onto a running actor.
	fn pop_ready(&mut self) -> ActorId {
		self.ready.pop_front().expect("ready queue is empty")
	}
}

impl Scheduler {
	pub(crate) fn new(cast: Cast) -> Scheduler {
		Scheduler {
			state: Mutex::new(SchedulerState {
				cast,
				ready: VecDeque::with_capacity(READY_QUEUE_INITIAL_CAPACITY),
				n_alive: 0,
				sleeping_workers: 0,
				shutdown: false,
				no_more_spawns: false,
				drain: DrainAgent::default(),
			}),
			work_available: Condvar::new(),
		}
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, SchedulerState> {
		self.state.lock()
	}

	pub(crate) fn wake_all(&self) {
		self.work_available.notify_all();
	}

	/// The send path. Callable from any thread, including from inside a
	/// prompt.
	pub(crate) fn send(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		let mut state = self.state.lock();
		self.send_locked(&mut state, target, message)
	}

	pub(crate) fn send_locked(
		&self,
		state: &mut SchedulerState,
		target: ActorId,
		message: Message,
	) -> Result<(), SendError> {
		if target >= state.cast.len() {
			return Err(SendError::OutOfRange);
		}
		let entry = &mut state.cast[target];
		if !entry.accepting {
			return Err(SendError::Refused);
		}
		entry.mailbox.push(message);
		// Idle means neither queued nor running; both keep `queued` true, so
		// one test covers both.
		if !entry.queued {
			self.enqueue_ready(state, target);
		}
		Ok(())
	}

	fn push_ready(&self, state: &mut SchedulerState, id: ActorId) {
		state.ready.push_back(id);
		// Signal a single sleeper; one message only needs one worker, and a
		// broadcast would stampede the rest onto the mutex for nothing.
		if state.sleeping_workers > 0 {
			self.work_available.notify_one();
		}
	}

	/// Takes an idle actor to ready. The caller must have checked `queued`.
	fn enqueue_ready(&self, state: &mut SchedulerState, id: ActorId) {
		state.cast[id].queued = true;
		self.push_ready(state, id);
	}

	/// Releases an actor a worker just finished a message for. More work
	/// waiting puts it straight back on ready; otherwise it goes idle and
	/// the next send may queue it again.
	fn leave_actor(&self, state: &mut SchedulerState, id: ActorId) {
		if state.cast[id].mailbox.is_empty() {
			state.cast[id].queued = false;
		} else {
			self.push_ready(state, id);
		}
	}

	/// Creates an actor, greets it with HELLO and schedules it. Returns
	/// `None` when the system is draining and no longer spawns.
	pub(crate) fn spawn_locked(
		&self,
		state: &mut SchedulerState,
		role: Arc<Role>,
		parent: ActorId,
	) -> Option<ActorId> {
		if state.no_more_spawns {
			return None;
		}
		let id = state.cast.add_member(role);
		state.n_alive += 1;
		state.cast[id].mailbox.push(Message::hello(parent));
		self.enqueue_ready(state, id);
		debug!(actor_id = id, parent_id = parent, "spawned actor");
		Some(id)
	}

	/// Pops the head of an actor's mailbox and evaluates the death
	/// condition right there: an actor whose mailbox just ran dry after a
	/// STOP (or after it stopped accepting) is dead from this instant, even
	/// though the prompt for the popped message has not run yet.
	fn pop_message(&self, state: &mut SchedulerState, id: ActorId) -> Message {
		let entry = &mut state.cast[id];
		let message = entry.mailbox.pop();
		if entry.mailbox.is_empty() &&
			(message.message_type() == MSG_STOP || !entry.accepting)
		{
			self.kill_actor(state, id);
		}
		message
	}

	fn kill_actor(&self, state: &mut SchedulerState, id: ActorId) {
		state.cast[id].alive = false;
		state.n_alive -= 1;
		debug!(actor_id = id, n_alive = state.n_alive, "actor died");
		if state.n_alive == 0 {
			// Quiescence: nobody is left to produce work. Stop the drain
			// agent if it is still parked on its signal, and wake every
			// worker so they observe the shutdown flag.
			state.shutdown = true;
			drain::cancel_agent(state);
			self.work_available.notify_all();
		}
	}

	/// Marks the end of spawning and broadcasts STOP to every actor created
	/// so far. Actors that already refused are skipped. Idempotent.
	pub(crate) fn initiate_drain(&self, state: &mut SchedulerState) {
		if state.no_more_spawns {
			return;
		}
		state.no_more_spawns = true;
		let cast_size = state.cast.len();
		let mut delivered = 0;
		for id in 0..cast_size {
			if self.send_locked(state, id, Message::stop()).is_ok() {
				delivered += 1;
			}
		}
		debug!(actors = cast_size, delivered, "broadcast stop to the whole cast");
	}

	/// Body of one worker thread.
	pub(crate) fn worker_loop(self: &Arc<Self>) {
		drain::mask_all_signals();
		loop {
			let mut state = self.state.lock();
			while !state.shutdown && state.ready.is_empty() {
				state.sleeping_workers += 1;
				self.work_available.wait(&mut state);
				state.sleeping_workers -= 1;
			}
			if state.shutdown {
				return;
			}

			let id = state.pop_ready();
			let message = self.pop_message(&mut state, id);

			match message.message_type() {
				MSG_SPAWN => {
					self.spawn_locked(&mut state, message.expect_spawn_role(), id);
				},
				MSG_STOP => {
					state.cast[id].accepting = false;
				},
				message_type => {
					// User dispatch. The mutex is released for the call:
					// the prompt may be arbitrarily slow and must not
					// serialize unrelated actors. `queued` stays true the
					// whole time, so no other worker can enter this actor;
					// concurrent sends still land safely in its mailbox
					// because mailbox pushes take the mutex.
					let (_, nbytes, data) = message.into_parts();
					let entry = &mut state.cast[id];
					let role = Arc::clone(&entry.role);
					let mut stateptr = entry.stateptr.take();
					drop(state);

					let prompt = role.prompt(message_type);
					let ctx = ActorContext::new(Arc::clone(self), id);
					CURRENT_ACTOR.with(|current| current.set(Some(id)));
					prompt(&ctx, &mut stateptr, nbytes, data);
					CURRENT_ACTOR.with(|current| current.set(None));

					state = self.state.lock();
					state.cast[id].stateptr = stateptr;
				},
			}

			self.leave_actor(&mut state, id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{message::MSG_HELLO, ActorContext, Payload, Prompt, StatePtr};

	fn noop(_ctx: &ActorContext, _state: &mut StatePtr, _nbytes: usize, _data: Payload) {}

	fn test_scheduler() -> Scheduler {
		Scheduler::new(Cast::with_capacity(8).unwrap())
	}

	fn test_role() -> Arc<Role> {
		Arc::new(Role::new(vec![noop as Prompt]))
	}

	#[test]
	fn test_spawn_greets_and_schedules() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		assert_eq!(id, 0);
		assert_eq!(state.n_alive, 1);
		assert!(state.cast[id].queued);
		assert_eq!(state.ready.len(), 1);
		assert!(!state.cast[id].mailbox.is_empty());
	}

	#[test]
	fn test_send_to_an_actor_never_created() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let result = scheduler.send_locked(&mut state, 3, Message::stop());
		assert_eq!(result, Err(SendError::OutOfRange));
	}

	#[test]
	fn test_send_to_a_queued_actor_does_not_requeue_it() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		scheduler.send_locked(&mut state, id, Message::new(MSG_HELLO, 0, None)).unwrap();
		assert_eq!(state.ready.len(), 1);
		assert_eq!(state.cast[id].mailbox.len(), 2);
	}

	#[test]
	fn test_running_actor_is_not_requeued_by_a_send() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		assert_eq!(state.pop_ready(), id);
		let _hello = scheduler.pop_message(&mut state, id);
		// A worker holds the actor now: a send lands in the mailbox only,
		// it must not hand the actor to a second worker.
		scheduler.send_locked(&mut state, id, Message::new(MSG_HELLO, 0, None)).unwrap();
		assert!(state.ready.is_empty());
		assert!(state.cast[id].queued);
		// Leaving with pending work puts the actor back on ready.
		scheduler.leave_actor(&mut state, id);
		assert_eq!(state.ready.len(), 1);
		assert!(state.cast[id].queued);
	}

	#[test]
	fn test_leaving_with_a_dry_mailbox_goes_idle() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		assert_eq!(state.pop_ready(), id);
		let _hello = scheduler.pop_message(&mut state, id);
		scheduler.leave_actor(&mut state, id);
		assert!(!state.cast[id].queued);
		assert!(state.ready.is_empty());
		// The next send finds the actor idle and queues it again.
		scheduler.send_locked(&mut state, id, Message::new(MSG_HELLO, 0, None)).unwrap();
		assert!(state.cast[id].queued);
		assert_eq!(state.ready.len(), 1);
	}

	#[test]
	fn test_death_is_decided_at_pop_time() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		scheduler.send_locked(&mut state, id, Message::stop()).unwrap();

		let ready = state.pop_ready();
		assert_eq!(ready, id);
		// HELLO is not the last message: the actor survives the pop.
		let hello = scheduler.pop_message(&mut state, id);
		assert_eq!(hello.message_type(), MSG_HELLO);
		assert!(state.cast[id].alive);

		// Popping the STOP empties the mailbox: death, quiescence, shutdown.
		let stop = scheduler.pop_message(&mut state, id);
		assert_eq!(stop.message_type(), MSG_STOP);
		assert!(!state.cast[id].alive);
		assert_eq!(state.n_alive, 0);
		assert!(state.shutdown);
	}

	#[test]
	fn test_draining_refuses_nothing_but_spawns() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		scheduler.initiate_drain(&mut state);
		assert!(state.no_more_spawns);
		// The broadcast queued a STOP but the actor has not processed it:
		// it still accepts regular messages.
		scheduler.send_locked(&mut state, id, Message::new(MSG_HELLO, 0, None)).unwrap();
		// Spawning is over, though.
		assert!(scheduler.spawn_locked(&mut state, test_role(), id).is_none());
		assert_eq!(state.cast.len(), 1);
	}

	#[test]
	fn test_drain_broadcast_is_idempotent() {
		let scheduler = test_scheduler();
		let mut state = scheduler.lock();
		let id = scheduler.spawn_locked(&mut state, test_role(), 0).unwrap();
		scheduler.initiate_drain(&mut state);
		let pending_after_first = state.cast[id].mailbox.len();
		scheduler.initiate_drain(&mut state);
		assert_eq!(state.cast[id].mailbox.len(), pending_after_first);
	}
}
