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

//! The drain agent: a thread parked on SIGINT.
//!
//! On interrupt it freezes spawning and broadcasts STOP to the whole cast,
//! then lets the actors die of natural causes. If the system reaches
//! quiescence first, the shutdown cascade cancels the agent by throwing the
//! very signal it is waiting for back at it.

use std::sync::Arc;

use nix::sys::{
	pthread::{pthread_kill, pthread_self, Pthread},
	signal::{pthread_sigmask, SigSet, SigmaskHow, Signal},
};
use tracing::{info, warn};

use crate::scheduler::{Scheduler, SchedulerState};

/// Bookkeeping shared with the scheduler, under the coordinator mutex.
#[derive(Default)]
pub(crate) struct DrainAgent {
	/// pthread of the agent while it is parked on `sigwait`.
	thread: Option<Pthread>,
	cancelled: bool,
}

/// Blocks every signal on the calling thread. Workers run this on startup
/// so that a process-directed interrupt can only ever be claimed by the
/// agent's `sigwait`.
pub(crate) fn mask_all_signals() {
	if let Err(errno) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::all()), None) {
		warn!(%errno, "failed to mask signals on a runtime thread");
	}
}

/// Cancels the agent. Called by the shutdown cascade, with the coordinator
/// mutex held. Safe to call at any point of the agent's life, including
/// before it registered or after it exited.
pub(crate) fn cancel_agent(state: &mut SchedulerState) {
	state.drain.cancelled = true;
	if let Some(thread) = state.drain.thread.take() {
		if let Err(errno) = pthread_kill(thread, Signal::SIGINT) {
			warn!(%errno, "failed to interrupt the drain agent");
		}
	}
}

/// Body of the drain agent thread.
pub(crate) fn run(scheduler: Arc<Scheduler>) {
	mask_all_signals();
	let mut interrupt = SigSet::empty();
	interrupt.add(Signal::SIGINT);

	{
		let mut state = scheduler.lock();
		if state.drain.cancelled {
			// The system came and went before this thread even started.
			return;
		}
		state.drain.thread = Some(pthread_self());
	}

	let signal = interrupt.wait();
	let mut state = scheduler.lock();
	state.drain.thread = None;
	if state.drain.cancelled {
		return;
	}
	match signal {
		Ok(_) => {
			info!("interrupt received, draining the actor system");
			scheduler.initiate_drain(&mut state);
		},
		Err(errno) => {
			warn!(%errno, "sigwait failed, the drain agent is giving up");
		},
	}
}
