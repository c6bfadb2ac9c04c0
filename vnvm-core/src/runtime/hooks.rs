//! Hook synchronizer: named, non-latched rendezvous between threads, with
//! deadlock avoidance when every thread would otherwise be parked.
//!
//! A single mutex covers both the per-thread run/park bookkeeping and the
//! hook epoch counters, per the design notes' "guarded by the runtime
//! lock". One shared condvar (rather than one per hook) keeps the
//! deadlock-avoidance sweep atomic: when the last runnable thread parks,
//! every currently-parked thread must be released together, and that's
//! only provable under a single lock acquisition.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

/// Opaque per-thread identifier, assigned by [`super::Shared::fork_at`].
pub type ThreadId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Running,
    Parked(String),
    Stopped,
}

#[derive(Debug, Default)]
struct State {
    threads: HashMap<ThreadId, Status>,
    hook_epoch: HashMap<String, u64>,
}

impl State {
    fn runnable_count(&self) -> usize {
        self.threads.values().filter(|s| **s == Status::Running).count()
    }
}

/// Shared hook/park registry for one [`Runtime`](super::Runtime).
#[derive(Debug, Default)]
pub struct Scheduler {
    state: Mutex<State>,
    cvar: Condvar,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly spawned thread as runnable.
    pub fn register(&self, id: ThreadId) {
        let mut state = self.state.lock().unwrap();
        state.threads.insert(id, Status::Running);
    }

    /// Mark a thread stopped (it exited or was reset). Wakes parked
    /// threads so they can re-evaluate the deadlock-avoidance condition.
    pub fn unregister(&self, id: ThreadId) {
        let mut state = self.state.lock().unwrap();
        state.threads.insert(id, Status::Stopped);
        self.cvar.notify_all();
    }

    /// Drop all bookkeeping, for `reset()`.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.threads.clear();
        state.hook_epoch.clear();
        self.cvar.notify_all();
    }

    /// Park the calling thread on `name`, unless doing so would leave the
    /// runtime with no runnable thread — in which case this call (and
    /// every other currently-parked thread) returns immediately.
    pub fn wait_hook(&self, id: ThreadId, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.threads.insert(id, Status::Parked(name.to_owned()));

        if state.runnable_count() == 0 {
            release_all_parked(&mut state);
            self.cvar.notify_all();
            return;
        }

        let start_epoch = state.hook_epoch.get(name).copied().unwrap_or(0);
        loop {
            state = self.cvar.wait(state).unwrap();
            match state.threads.get(&id) {
                Some(Status::Running) => return,
                _ => {}
            }
            let now_epoch = state.hook_epoch.get(name).copied().unwrap_or(0);
            if now_epoch != start_epoch {
                state.threads.insert(id, Status::Running);
                return;
            }
            if state.runnable_count() == 0 {
                release_all_parked(&mut state);
                self.cvar.notify_all();
                return;
            }
        }
    }

    /// Unpark every thread currently waiting on `name`. A no-op if none
    /// are parked there — hooks are not latched.
    pub fn fire(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        *state.hook_epoch.entry(name.to_owned()).or_insert(0) += 1;
        self.cvar.notify_all();
    }
}

fn release_all_parked(state: &mut State) {
    for status in state.threads.values_mut() {
        if matches!(status, Status::Parked(_)) {
            *status = Status::Running;
        }
    }
}
