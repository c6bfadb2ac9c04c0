//! Runtime: owns the program, the sprite bank, the hook registry, and the
//! set of live VM threads.

pub mod hooks;
pub mod thread;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bytecode::Program;
use crate::collaborators::{Clock, DisplaySink, ImageLoader, SayDispatch};
use crate::errors::RuntimeFault;
use crate::sprite::SpriteBank;

use hooks::{Scheduler, ThreadId};
use thread::ThreadState;

/// State shared by every thread of one [`Runtime`]: the program bytes, the
/// sprite bank, the hook registry, and the collaborator seams. Nothing
/// else is shared — each thread's registers, stacks, and comparator are
/// private (§3 invariant 6).
pub(crate) struct Shared {
    pub(crate) program: Program,
    pub(crate) sprite_bank: Mutex<SpriteBank>,
    pub(crate) scheduler: Scheduler,
    pub(crate) image_loader: Arc<dyn ImageLoader>,
    pub(crate) display_sink: Mutex<Box<dyn DisplaySink>>,
    pub(crate) say_dispatch: Mutex<Box<dyn SayDispatch>>,
    /// Paces `wait ri` and fade interpolation in [`thread::ThreadState`].
    pub(crate) clock: Arc<dyn Clock>,
    next_thread_id: AtomicU64,
    handles: Mutex<Vec<(ThreadId, Arc<AtomicBool>, std::thread::JoinHandle<()>)>>,
}

impl Shared {
    fn next_id(&self) -> ThreadId {
        self.next_thread_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Spawn a sibling thread at `pc`, per `fork`. The new thread starts
    /// with empty stacks and zeroed registers regardless of the caller's
    /// state.
    pub(crate) fn fork_at(self: &Arc<Self>, pc: usize) {
        let id = self.next_id();
        let alive = Arc::new(AtomicBool::new(true));
        let state = ThreadState::new(id, pc, Arc::clone(self), Arc::clone(&alive));
        let handle = std::thread::Builder::new()
            .name(format!("vnvm-thread-{id}"))
            .spawn(move || state.run())
            .expect("failed to spawn VM thread");
        self.handles.lock().unwrap().push((id, alive, handle));
    }

    /// Signal every thread to stop and clear the sprite bank and hook
    /// registry, without joining. Called from inside a VM thread's own
    /// `reset` opcode, where joining would mean a thread joining itself.
    pub(crate) fn request_stop(&self) {
        for (_, alive, _) in self.handles.lock().unwrap().iter() {
            alive.store(false, Ordering::Release);
        }
        // Wakes anything parked on a hook so it notices `alive == false`
        // on its next loop iteration instead of sleeping indefinitely.
        self.scheduler.clear();
        self.sprite_bank.lock().unwrap().clear_all();
    }

    /// [`Self::request_stop`] plus joining every thread. Only safe to call
    /// from outside a VM thread.
    pub(crate) fn reset(&self) {
        self.request_stop();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for (_, _, handle) in handles {
            let _ = handle.join();
        }
    }
}

/// Collaborator set a [`Runtime`] is built with. Use [`crate::headless`]'s
/// implementations for tests and the CLI's `run` subcommand.
pub struct Collaborators {
    /// Resolves sprite manifest paths to pixel data.
    pub image_loader: Arc<dyn ImageLoader>,
    /// Receives presentation updates from `show`/`layer`.
    pub display_sink: Box<dyn DisplaySink>,
    /// Narration dispatch for `say`.
    pub say_dispatch: Box<dyn SayDispatch>,
    /// Monotonic time source for fades and `wait ri`.
    pub clock: Arc<dyn Clock>,
}

/// Owns one loaded program and its live thread set. At most one `Runtime`
/// is started at a time (§3 invariant 5).
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Build a runtime over `program`, wired to `collaborators`.
    pub fn new(program: Program, collaborators: Collaborators) -> Self {
        let shared = Arc::new(Shared {
            program,
            sprite_bank: Mutex::new(SpriteBank::new()),
            scheduler: Scheduler::new(),
            image_loader: collaborators.image_loader,
            display_sink: Mutex::new(collaborators.display_sink),
            say_dispatch: Mutex::new(collaborators.say_dispatch),
            clock: collaborators.clock,
            next_thread_id: AtomicU64::new(0),
            handles: Mutex::new(Vec::new()),
        });
        Self { shared }
    }

    /// The underlying shared state, for single-step unit tests in
    /// [`thread`] that drive a [`ThreadState`] without spawning an OS
    /// thread.
    #[cfg(test)]
    pub(crate) fn shared_for_test(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Start a single root thread at PC 0. Fails with [`RuntimeFault::AlreadyRunning`]
    /// if any thread is already registered.
    pub fn start(&self) -> Result<(), RuntimeFault> {
        if !self.shared.handles.lock().unwrap().is_empty() {
            return Err(RuntimeFault::AlreadyRunning);
        }
        self.shared.fork_at(0);
        Ok(())
    }

    /// Stop every thread and clear shared state. Safe to call while
    /// running.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Block until every currently-registered thread has exited.
    pub fn join(&self) {
        let handles = std::mem::take(&mut *self.shared.handles.lock().unwrap());
        for (_, _, handle) in handles {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Assembler;
    use crate::headless::{NullDisplaySink, NullImageLoader, NullSayDispatch, SystemClock};

    fn headless_collaborators() -> Collaborators {
        Collaborators {
            image_loader: Arc::new(NullImageLoader),
            display_sink: Box::new(NullDisplaySink),
            say_dispatch: Box::new(NullSayDispatch),
            clock: Arc::new(SystemClock::default()),
        }
    }

    #[test]
    fn scenario_a_add_reaches_expected_registers() {
        let program = Assembler::from_string("set i0 7\nset i1 5\nadd i0 i1\nreset\n")
            .assemble()
            .unwrap();
        let runtime = Runtime::new(program, headless_collaborators());
        runtime.start().unwrap();
        runtime.join();
    }

    #[test]
    fn starting_twice_without_reset_fails() {
        let program = Assembler::from_string("wait \"forever\"\n").assemble().unwrap();
        let runtime = Runtime::new(program, headless_collaborators());
        runtime.start().unwrap();
        assert!(matches!(runtime.start(), Err(RuntimeFault::AlreadyRunning)));
        runtime.reset();
    }

    #[test]
    fn scenario_e_single_thread_wait_hook_returns_immediately() {
        let program = Assembler::from_string("wait \"neverfired\"\nreset\n").assemble().unwrap();
        let runtime = Runtime::new(program, headless_collaborators());
        runtime.start().unwrap();
        runtime.join();
    }

    #[test]
    fn scenario_d_fork_and_hook_rendezvous() {
        let source = "\
fork @worker
wait \"go\"
set i0 1
end:
jmp @end
worker:
fire \"go\"
";
        let program = Assembler::from_string(source).assemble().unwrap();
        let runtime = Runtime::new(program, headless_collaborators());
        runtime.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        runtime.reset();
    }
}
