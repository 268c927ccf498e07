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

#![deny(clippy::disallowed_methods)]

//! actors is a small threaded actor runtime.
//!
//! It solves the following problem:
//! - run many isolated units of state that communicate only by
//!   asynchronous messages,
//! - on a fixed pool of preemptive worker threads,
//! - with messages of one actor handled strictly one at a time, in arrival
//!   order, while unrelated actors run in parallel.
//!
//! An actor is spawned with a [`Role`]: an immutable table of prompts
//! (message handlers) indexed by message tag. Three tags are reserved and
//! handled by the runtime itself: [`MSG_SPAWN`] creates a child actor,
//! [`MSG_STOP`] retires the receiver, and [`MSG_HELLO`] is the greeting
//! every fresh actor receives first. The system terminates once every
//! actor has died; an external interrupt triggers a graceful drain.

use std::num::NonZeroUsize;

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::warn;

mod actor_context;
mod cast;
mod drain;
mod mailbox;
mod message;
mod role;
pub(crate) mod scheduler;
mod system;

pub use actor_context::ActorContext;
pub use message::{ActorId, Message, MessageType, Payload, MSG_HELLO, MSG_SPAWN, MSG_STOP};
pub use role::{Prompt, Role, StatePtr};
pub use system::ActorSystem;

/// Number of worker threads in the pool.
///
/// - Derived from `ACTORS_POOL_SIZE` if set and valid.
/// - Defaults to 3.
pub static POOL_SIZE: Lazy<usize> = Lazy::new(|| env_or_default("ACTORS_POOL_SIZE", 3));

/// Capacity of every actor's mailbox. Enqueueing into a full mailbox is
/// fatal: producers are expected to respect the bound.
///
/// - Derived from `ACTORS_MAILBOX_CAPACITY` if set and valid.
/// - Defaults to 1024.
pub static MAILBOX_CAPACITY: Lazy<usize> =
	Lazy::new(|| env_or_default("ACTORS_MAILBOX_CAPACITY", 1024));

/// Upper bound on the number of actors ever created by one system.
///
/// - Derived from `ACTORS_CAST_LIMIT` if set and valid.
/// - Defaults to 2^20.
pub static CAST_LIMIT: Lazy<usize> = Lazy::new(|| env_or_default("ACTORS_CAST_LIMIT", 1 << 20));

fn env_or_default(var: &str, default: usize) -> usize {
	match std::env::var(var) {
		Ok(value_str) => {
			if let Ok(value) = value_str.parse::<NonZeroUsize>() {
				return value.get();
			}
			warn!(
				"failed to parse `{var}={value_str}` as a positive integer, using the default \
                 ({default})"
			);
		},
		Err(std::env::VarError::NotUnicode(os_str)) => {
			warn!(
				"failed to parse `{var}={os_str:?}` as a valid unicode string, using the default \
                 ({default})"
			);
		},
		Err(std::env::VarError::NotPresent) => {},
	}
	default
}

/// Error returned by [`ActorSystem::send`] and [`ActorContext::send`].
///
/// Both cases are recoverable from the sender's point of view; the message
/// and its payload are dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
	/// No actor was ever created with this id.
	#[error("actor id is out of range")]
	OutOfRange,
	/// The target has processed a STOP and refuses new messages. Its id
	/// stays in range forever.
	#[error("actor is no longer accepting messages")]
	Refused,
}

/// Error returned by [`ActorSystem::create`].
#[derive(Error, Debug)]
pub enum CreateError {
	/// At most one actor system may run per process at a time.
	#[error("an actor system is already running in this process")]
	AlreadyRunning,
	/// The root role has no prompts, so the root actor could not even
	/// handle its own HELLO.
	#[error("the root role has an empty prompt table")]
	EmptyRole,
	/// A runtime thread could not be started.
	#[error("failed to start a runtime thread: {0}")]
	SpawnThread(#[from] std::io::Error),
	/// The actor table could not be allocated.
	#[error("failed to allocate the actor table: {0}")]
	Allocation(#[from] std::collections::TryReserveError),
}
