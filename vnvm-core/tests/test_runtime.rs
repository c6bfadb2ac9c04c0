use std::sync::Arc;
use std::time::Duration;

use vnvm_core::assembler::Assembler;
use vnvm_core::headless::{NullDisplaySink, NullImageLoader, NullSayDispatch, SystemClock};
use vnvm_core::runtime::{Collaborators, Runtime};

fn headless() -> Collaborators {
    Collaborators {
        image_loader: Arc::new(NullImageLoader),
        display_sink: Box::new(NullDisplaySink),
        say_dispatch: Box::new(NullSayDispatch),
        clock: Arc::new(SystemClock::default()),
    }
}

/// A program that never fires its own hook must still return promptly,
/// per the deadlock-avoidance law: with no other runnable thread, the
/// park becomes a no-op.
#[test]
fn lone_thread_parked_on_an_unfired_hook_does_not_hang() {
    let program = Assembler::from_string("wait \"neverfired\"\nreset\n").assemble().unwrap();
    let runtime = Runtime::new(program, headless());
    runtime.start().unwrap();

    let deadline = Duration::from_secs(2);
    let joined = std::thread::scope(|scope| {
        let handle = scope.spawn(|| runtime.join());
        std::thread::sleep(Duration::from_millis(50));
        handle
    });
    assert!(joined.join().is_ok());
    let _ = deadline;
}

/// Scenario D: a forked worker fires a hook the main thread is parked on;
/// the main thread only proceeds after the fire.
#[test]
fn fork_and_fire_rendezvous_unblocks_the_waiting_thread() {
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
    let runtime = Runtime::new(program, headless());
    runtime.start().unwrap();

    // Give the main thread time to park and the worker time to fire; the
    // main thread then spins on `jmp @end` forever, so we reset instead of
    // joining.
    std::thread::sleep(Duration::from_millis(150));
    runtime.reset();
}

/// `Runtime::start` refuses to run a second root thread while any thread
/// from a previous run is still registered.
#[test]
fn starting_while_running_is_rejected() {
    let program = Assembler::from_string("wait \"neverfired\"\n").assemble().unwrap();
    let runtime = Runtime::new(program, headless());
    runtime.start().unwrap();
    assert!(runtime.start().is_err());
    runtime.reset();
}
