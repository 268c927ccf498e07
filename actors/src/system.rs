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
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	thread::{self, JoinHandle},
};

use tracing::{info, warn};

use crate::{
	cast::Cast,
	drain,
	message::Message,
	role::Role,
	scheduler::{self, Scheduler},
	ActorId, CreateError, SendError, POOL_SIZE,
};

/// Initial capacity of the actor table, in records.
const CAST_INITIAL_CAPACITY: usize = 1024;

/// Only one system may run per process at a time. `create` claims this and
/// `join` (or dropping the handle) releases it.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// ActorSystem is the top-level handle owning the worker pool, the drain
/// agent and every actor.
///
/// `create` starts the machinery and spawns the root actor (id 0), which
/// bootstraps everything else by spawning children from its prompts. The
/// system keeps running until every actor has died (an actor dies once it
/// drains its mailbox after processing a STOP); `join` blocks until that
/// point.
pub struct ActorSystem {
	scheduler: Arc<Scheduler>,
	workers: Vec<JoinHandle<()>>,
	drain_agent: Option<JoinHandle<()>>,
}

impl ActorSystem {
	/// Creates an actor system and its thread pool, and spawns the root
	/// actor. The root actor always has id 0 and receives a HELLO carrying
	/// its own id.
	pub fn create(role: Arc<Role>) -> Result<ActorSystem, CreateError> {
		if role.nprompts() == 0 {
			return Err(CreateError::EmptyRole);
		}
		if RUNNING.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
			return Err(CreateError::AlreadyRunning);
		}
		ActorSystem::start(role).map_err(|error| {
			RUNNING.store(false, Ordering::SeqCst);
			error
		})
	}

	fn start(role: Arc<Role>) -> Result<ActorSystem, CreateError> {
		// The calling thread must not be eligible for the interrupt either,
		// or a process-directed SIGINT could land here instead of in the
		// drain agent's sigwait. Runtime threads inherit this mask.
		drain::mask_all_signals();
		let cast = Cast::with_capacity(CAST_INITIAL_CAPACITY).map_err(CreateError::Allocation)?;
		let scheduler = Arc::new(Scheduler::new(cast));
		{
			let mut state = scheduler.lock();
			let root = scheduler.spawn_locked(&mut state, role, 0);
			debug_assert_eq!(root, Some(0));
		}

		let mut workers = Vec::with_capacity(*POOL_SIZE);
		for i in 0..*POOL_SIZE {
			let worker_scheduler = Arc::clone(&scheduler);
			let spawned = thread::Builder::new()
				.name(format!("actor-worker-{i}"))
				.spawn(move || worker_scheduler.worker_loop());
			match spawned {
				Ok(worker) => workers.push(worker),
				Err(error) => {
					// Tear down the part of the pool that did start.
					scheduler.lock().shutdown = true;
					scheduler.wake_all();
					for worker in workers {
						let _ = worker.join();
					}
					return Err(CreateError::SpawnThread(error));
				},
			}
		}

		let drain_scheduler = Arc::clone(&scheduler);
		let drain_agent = thread::Builder::new()
			.name("actor-drain".to_string())
			.spawn(move || drain::run(drain_scheduler))
			.map_err(|error| {
				scheduler.lock().shutdown = true;
				scheduler.wake_all();
				for worker in workers.drain(..) {
					let _ = worker.join();
				}
				CreateError::SpawnThread(error)
			})?;

		info!(workers = *POOL_SIZE, "actor system started");
		Ok(ActorSystem { scheduler, workers, drain_agent: Some(drain_agent) })
	}

	/// Sends a message.
	///
	/// Never blocks. `OutOfRange` if no actor ever had that id; `Refused`
	/// if the target has processed a STOP and no longer accepts. A refused
	/// or out-of-range message is dropped along with its payload.
	pub fn send(&self, target: ActorId, message: Message) -> Result<(), SendError> {
		self.scheduler.send(target, message)
	}

	/// Id of the actor whose prompt is running on the calling thread.
	///
	/// Panics when called from outside a prompt; prefer
	/// [`ActorContext::self_id`](crate::ActorContext::self_id) where a
	/// context is at hand.
	pub fn self_id(&self) -> ActorId {
		scheduler::current_actor().expect("self_id called outside of a prompt")
	}

	/// Initiates the graceful drain: no actor spawns after this point, and
	/// every actor created so far is sent a STOP. This is exactly what the
	/// drain agent does when the process receives an interrupt.
	pub fn drain(&self) {
		let mut state = self.scheduler.lock();
		self.scheduler.initiate_drain(&mut state);
	}

	/// Blocks until every actor has died and every runtime thread has
	/// exited, then releases everything the system owns. A fresh system may
	/// be created afterwards.
	pub fn join(mut self) {
		self.wait_for_shutdown();
	}

	fn wait_for_shutdown(&mut self) {
		for worker in self.workers.drain(..) {
			if worker.join().is_err() {
				warn!("a worker thread panicked");
			}
		}
		// On the graceful path the shutdown cascade has already cancelled
		// the agent; this covers the forced path, and is otherwise a no-op.
		{
			let mut state = self.scheduler.lock();
			drain::cancel_agent(&mut state);
		}
		if let Some(drain_agent) = self.drain_agent.take() {
			let _ = drain_agent.join();
		}
		RUNNING.store(false, Ordering::SeqCst);
		info!("actor system terminated");
	}
}

impl Drop for ActorSystem {
	fn drop(&mut self) {
		if self.workers.is_empty() && self.drain_agent.is_none() {
			// Already joined.
			return;
		}
		{
			let mut state = self.scheduler.lock();
			if !state.shutdown {
				warn!("actor system dropped before quiescence, forcing shutdown");
				state.shutdown = true;
			}
		}
		self.scheduler.wake_all();
		self.wait_for_shutdown();
	}
}
