//! Per-thread VM state and the fetch/decode/execute dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::bytecode::{Operand, VmInt, MAX_REGISTERS};
use crate::errors::RuntimeFault;
use crate::sprite::SpriteSurface;

use super::hooks::ThreadId;
use super::Shared;

/// One `attr` accumulator value: the presentation ops read these back by
/// name and clear the whole map once consumed.
#[derive(Debug, Clone)]
enum AttrValue {
    Int(VmInt),
    Str(String),
}

/// A single VM thread's private state: registers, both typed stacks, the
/// call stack, the comparator, and its pending attribute accumulator.
///
/// Nothing here is shared with any other thread (§3 invariant 6); only
/// [`Shared`] — the sprite bank, program bytes, and hook registry — is.
pub struct ThreadState {
    id: ThreadId,
    pc: usize,
    regints: [VmInt; MAX_REGISTERS],
    regstrs: [String; MAX_REGISTERS],
    int_stack: Vec<VmInt>,
    str_stack: Vec<String>,
    call_stack: Vec<usize>,
    attrs: HashMap<String, AttrValue>,
    comparator: VmInt,
    alive: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl ThreadState {
    /// A fresh thread at `pc`, with empty stacks and zeroed registers —
    /// `fork` never inherits the parent's state (§3 invariant, §4.6).
    pub fn new(id: ThreadId, pc: usize, shared: Arc<Shared>, alive: Arc<AtomicBool>) -> Self {
        Self {
            id,
            pc,
            regints: [0; MAX_REGISTERS],
            regstrs: std::array::from_fn(|_| String::new()),
            int_stack: Vec::new(),
            str_stack: Vec::new(),
            call_stack: Vec::new(),
            attrs: HashMap::new(),
            comparator: 0,
            alive,
            shared,
        }
    }

    /// Run until the program ends, a `reset` executes, or a fault occurs.
    /// Faults are logged and end only this thread; they never propagate to
    /// siblings.
    pub fn run(mut self) {
        self.shared.scheduler.register(self.id);
        loop {
            if !self.alive.load(Ordering::Acquire) {
                break;
            }
            if self.pc >= self.shared.program.len() {
                trace!(thread = self.id, pc = self.pc, "thread ran off the end of the program");
                break;
            }
            match self.step() {
                Ok(()) => {}
                Err(fault) => {
                    tracing::error!(thread = self.id, pc = self.pc, %fault, "thread fault");
                    break;
                }
            }
        }
        self.shared.scheduler.unregister(self.id);
    }

    /// Fetch, decode, and execute exactly one instruction.
    ///
    /// `decode_at`'s `cursor` is the offset of the byte *after* the last
    /// operand — already the start of the next instruction. The dispatcher
    /// sets `pc` one short of that (`cursor - 1`) before executing, so that
    /// the trailing `pc += 1` below lands exactly on it for a normal
    /// instruction, and a jump handler's `pc = target - 1` lands exactly on
    /// `target` instead.
    fn step(&mut self) -> Result<(), RuntimeFault> {
        let (mnemonic, args, cursor) = self.shared.program.decode_at(self.pc)?;
        self.pc = cursor - 1;
        trace!(thread = self.id, pc = self.pc, mnemonic, "exec");
        self.execute(mnemonic, &args)?;
        self.pc += 1;
        Ok(())
    }

    fn execute(&mut self, mnemonic: &str, args: &[Operand]) -> Result<(), RuntimeFault> {
        match (mnemonic, args) {
            ("reset", []) => {
                // `request_stop`, not `reset`: this runs on a VM thread, and
                // `reset` joins every thread including the caller.
                self.shared.request_stop();
            }
            ("loadspr", [Operand::RegStr(rs), Operand::RegInt(ri)]) => {
                let path = self.regstrs[*rs as usize].clone();
                let bank_index = self.regints[*ri as usize] as usize;
                let surface = SpriteSurface::load_manifest(&path, self.shared.image_loader.as_ref())?;
                self.shared.sprite_bank.lock().unwrap().slot_set(bank_index, surface)?;
            }
            ("unloadspr", [Operand::RegInt(ri)]) => {
                let bank_index = self.regints[*ri as usize] as usize;
                self.shared.sprite_bank.lock().unwrap().slot_clear(bank_index)?;
            }
            ("fork", [Operand::LitInt(target)]) => {
                self.shared.fork_at(*target as usize);
            }
            ("ret", []) => {
                self.pc = self.call_stack.pop().ok_or(RuntimeFault::StackUnderflow { pc: self.pc })?;
            }
            ("call", [Operand::LitInt(target)]) => {
                self.call_stack.push(self.pc);
                self.pc = (*target as usize).wrapping_sub(1);
            }
            ("pushs", [Operand::RegStr(rs)]) => {
                self.str_stack.push(self.regstrs[*rs as usize].clone());
            }
            ("pops", [Operand::RegStr(rs)]) => {
                self.regstrs[*rs as usize] =
                    self.str_stack.pop().ok_or(RuntimeFault::StackUnderflow { pc: self.pc })?;
            }
            ("pushi", [Operand::RegInt(ri)]) => {
                self.int_stack.push(self.regints[*ri as usize]);
            }
            ("popi", [Operand::RegInt(ri)]) => {
                self.regints[*ri as usize] =
                    self.int_stack.pop().ok_or(RuntimeFault::StackUnderflow { pc: self.pc })?;
            }
            ("wait", [Operand::RegInt(ri)]) => {
                let millis = self.regints[*ri as usize].max(0) as u64;
                self.wait_millis(millis);
            }
            ("wait", [Operand::LitStr(hook)]) => {
                self.shared.scheduler.wait_hook(self.id, hook);
            }
            ("fire", [Operand::LitStr(hook)]) => {
                self.shared.scheduler.fire(hook);
            }
            ("say", [Operand::RegInt(ri), Operand::RegStr(rs)]) => {
                let bank = self.regints[*ri as usize] as usize;
                let message = self.regstrs[*rs as usize].clone();
                self.take_attrs();
                self.shared.say_dispatch.lock().unwrap().say(bank, &message)?;
            }
            ("set", [Operand::RegStr(rs), Operand::LitStr(value)]) => {
                self.regstrs[*rs as usize] = value.clone();
            }
            ("set", [Operand::RegInt(ri), Operand::LitInt(value)]) => {
                self.regints[*ri as usize] = *value;
            }
            ("set", [Operand::RegStr(rs1), Operand::RegStr(rs2)]) => {
                self.regstrs[*rs1 as usize] = self.regstrs[*rs2 as usize].clone();
            }
            ("set", [Operand::RegInt(ri1), Operand::RegInt(ri2)]) => {
                self.regints[*ri1 as usize] = self.regints[*ri2 as usize];
            }
            ("show", [Operand::RegInt(ri_bank), Operand::RegInt(ri_alpha)]) => {
                let bank = self.regints[*ri_bank as usize] as usize;
                let target_alpha = self.regints[*ri_alpha as usize];
                let fade_ms = self.take_fade_attr();
                self.take_attrs();
                self.run_fade(bank, target_alpha, fade_ms)?;
            }
            ("layer", [Operand::RegInt(ri_bank), Operand::RegInt(ri_layer)]) => {
                let bank = self.regints[*ri_bank as usize] as usize;
                let layer = self.regints[*ri_layer as usize];
                self.take_attrs();
                let snapshot = {
                    let mut sprite_bank = self.shared.sprite_bank.lock().unwrap();
                    let surface = sprite_bank.slot_mut(bank)?;
                    surface.set_layer(layer);
                    surface.snapshot()
                };
                self.shared.display_sink.lock().unwrap().present(bank, &snapshot);
            }
            ("attr", [Operand::LitStr(name), Operand::RegInt(ri)]) => {
                self.attrs.insert(name.clone(), AttrValue::Int(self.regints[*ri as usize]));
            }
            ("attr", [Operand::LitStr(name), Operand::RegStr(rs)]) => {
                self.attrs.insert(name.clone(), AttrValue::Str(self.regstrs[*rs as usize].clone()));
            }
            ("openbank", [Operand::RegInt(ri)]) => {
                if let Some(index) = self.shared.sprite_bank.lock().unwrap().first_empty() {
                    self.regints[*ri as usize] = index as VmInt;
                }
            }
            ("add", [Operand::RegInt(ri1), Operand::RegInt(ri2)]) => {
                self.regints[*ri1 as usize] =
                    self.regints[*ri1 as usize].wrapping_add(self.regints[*ri2 as usize]);
            }
            ("sub", [Operand::RegInt(ri1), Operand::RegInt(ri2)]) => {
                self.regints[*ri1 as usize] =
                    self.regints[*ri1 as usize].wrapping_sub(self.regints[*ri2 as usize]);
            }
            ("concat", [Operand::RegStr(rs), Operand::LitStr(literal)]) => {
                self.regstrs[*rs as usize].push_str(literal);
            }
            ("concat", [Operand::RegStr(rs1), Operand::RegStr(rs2)]) => {
                let appended = self.regstrs[*rs2 as usize].clone();
                self.regstrs[*rs1 as usize].push_str(&appended);
            }
            ("cmp", [Operand::RegInt(ri), Operand::LitInt(literal)]) => {
                self.comparator = self.regints[*ri as usize].wrapping_sub(*literal);
            }
            ("cmp", [Operand::RegInt(ri1), Operand::RegInt(ri2)]) => {
                self.comparator = self.regints[*ri1 as usize].wrapping_sub(self.regints[*ri2 as usize]);
            }
            ("jl", [Operand::LitInt(target)]) => {
                if self.comparator < 0 {
                    self.pc = (*target as usize).wrapping_sub(1);
                }
            }
            ("je", [Operand::LitInt(target)]) => {
                if self.comparator == 0 {
                    self.pc = (*target as usize).wrapping_sub(1);
                }
            }
            ("jg", [Operand::LitInt(target)]) => {
                if self.comparator > 0 {
                    self.pc = (*target as usize).wrapping_sub(1);
                }
            }
            ("jmp", [Operand::LitInt(target)]) => {
                self.pc = (*target as usize).wrapping_sub(1);
            }
            (other, operands) => {
                return Err(RuntimeFault::DecodeFault {
                    pc: self.pc,
                    detail: format!("no handler for {other} with operands {operands:?}"),
                });
            }
        }
        Ok(())
    }

    fn take_attrs(&mut self) -> HashMap<String, AttrValue> {
        std::mem::take(&mut self.attrs)
    }

    /// Integer register value, for tests that check a program's end state.
    #[cfg(test)]
    pub(crate) fn regint(&self, idx: usize) -> VmInt {
        self.regints[idx]
    }

    /// String register value, for tests that check a program's end state.
    #[cfg(test)]
    pub(crate) fn regstr(&self, idx: usize) -> &str {
        &self.regstrs[idx]
    }

    /// Current program counter, for tests.
    #[cfg(test)]
    pub(crate) fn pc(&self) -> usize {
        self.pc
    }

    /// Peek the `fade` attribute (a non-negative int) without clearing the
    /// map yet; the caller clears it via [`Self::take_attrs`] right after.
    fn take_fade_attr(&self) -> Option<u64> {
        match self.attrs.get("fade") {
            Some(AttrValue::Int(ms)) if *ms >= 0 => Some(*ms as u64),
            _ => None,
        }
    }

    /// Sleep for `millis`, paced against the injected [`Clock`](crate::collaborators::Clock)
    /// rather than a single raw `thread::sleep` — this is the seam `wait ri`
    /// and fade timing actually run on, so a host's clock governs both.
    fn wait_millis(&self, millis: u64) {
        if millis == 0 {
            return;
        }
        let deadline = self.shared.clock.now_ms() + millis;
        loop {
            let now = self.shared.clock.now_ms();
            if now >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis((deadline - now).min(16)));
        }
    }

    /// Drive `show`'s alpha to `target`, either immediately or via a
    /// linear fade at roughly 60 Hz when the `fade` attribute was set.
    fn run_fade(&mut self, bank: usize, target: VmInt, fade_ms: Option<u64>) -> Result<(), RuntimeFault> {
        const STEP_MS: u64 = 16;
        if !(0..=255).contains(&target) {
            return Err(RuntimeFault::AlphaRange { value: target as i64 });
        }

        let start = {
            let mut sprite_bank = self.shared.sprite_bank.lock().unwrap();
            sprite_bank.slot(bank)?.alpha() as i64
        };

        let steps = match fade_ms {
            Some(ms) if ms > STEP_MS => (ms / STEP_MS).max(1),
            _ => 1,
        };

        for step in 1..=steps {
            let t = step as f64 / steps as f64;
            let alpha = (start as f64 + (target as f64 - start as f64) * t).round() as i64;
            let snapshot = {
                let mut sprite_bank = self.shared.sprite_bank.lock().unwrap();
                let surface = sprite_bank.slot_mut(bank)?;
                surface.set_alpha(alpha.clamp(0, 255))?;
                surface.snapshot()
            };
            self.shared.display_sink.lock().unwrap().present(bank, &snapshot);
            if step < steps {
                self.wait_millis(STEP_MS);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::assembler::Assembler;
    use crate::headless::{NullDisplaySink, NullImageLoader, NullSayDispatch, SystemClock};
    use crate::runtime::{Collaborators, Runtime};

    /// Assemble `source` and single-step it on the calling thread (no OS
    /// thread spawned), returning the thread state once it runs off the
    /// end of the program. Only valid for programs with no `fork`/`wait`.
    fn run_to_completion(source: &str) -> ThreadState {
        let program = Assembler::from_string(source).assemble().unwrap();
        let runtime = Runtime::new(program, Collaborators {
            image_loader: Arc::new(NullImageLoader),
            display_sink: Box::new(NullDisplaySink),
            say_dispatch: Box::new(NullSayDispatch),
            clock: Arc::new(SystemClock::default()),
        });
        let shared = runtime.shared_for_test();
        let alive = Arc::new(AtomicBool::new(true));
        let mut state = ThreadState::new(0, 0, shared, alive);
        while state.pc < state.shared.program.len() {
            state.step().unwrap();
        }
        state
    }

    #[test]
    fn scenario_a_add_updates_registers() {
        let state = run_to_completion("set i0 7\nset i1 5\nadd i0 i1\n");
        assert_eq!(state.regint(0), 12);
        assert_eq!(state.regint(1), 5);
    }

    #[test]
    fn scenario_b_equal_compare_takes_the_jump() {
        let state = run_to_completion("set i0 3\ncmp i0 3\nje @eq\nset i0 99\neq:\n");
        assert_eq!(state.regint(0), 3);
    }

    #[test]
    fn scenario_c_loop_runs_to_completion() {
        let source = "\
set i0 0
loop:
cmp i0 3
jg @done
set i1 1
add i0 i1
jmp @loop
done:
";
        let state = run_to_completion(source);
        assert_eq!(state.regint(0), 4);
    }

    #[test]
    fn scenario_f_concat_is_in_place_with_rs1_as_accumulator() {
        let state = run_to_completion("set s0 \"hi \"\nset s1 \"there\"\nconcat s0 s1\n");
        assert_eq!(state.regstr(0), "hi there");
    }

    #[test]
    fn stack_discipline_pushi_then_popi_round_trips() {
        let state = run_to_completion("set i0 42\npushi i0\nset i0 0\npopi i1\n");
        assert_eq!(state.regint(1), 42);
    }

    #[test]
    fn call_ret_locality_leaves_pc_after_the_call() {
        let source = "\
call @sub
set i0 1
jmp @end
sub:
ret
end:
";
        let state = run_to_completion(source);
        assert_eq!(state.regint(0), 1);
    }

    #[test]
    fn add_and_sub_wrap_on_overflow() {
        let state = run_to_completion("set i0 2147483647\nset i1 1\nadd i0 i1\n");
        assert_eq!(state.regint(0), i32::MIN);
    }

    #[test]
    fn jump_lands_exactly_on_the_label_byte_skipping_what_precedes_it() {
        let state = run_to_completion("jmp @here\nset i0 99\nhere:\nset i1 1\n");
        assert_eq!(state.regint(0), 0);
        assert_eq!(state.regint(1), 1);
    }

    #[test]
    fn show_out_of_range_alpha_faults_without_mutating_the_sprite() {
        use std::collections::HashMap as StdHashMap;
        use crate::collaborators::Bitmap;

        let program = Assembler::from_string("reset\n").assemble().unwrap();
        let runtime = Runtime::new(program, Collaborators {
            image_loader: Arc::new(NullImageLoader),
            display_sink: Box::new(NullDisplaySink),
            say_dispatch: Box::new(NullSayDispatch),
            clock: Arc::new(SystemClock::default()),
        });
        let shared = runtime.shared_for_test();

        let mut images = StdHashMap::new();
        images.insert("default".to_owned(), Bitmap::new(1, 1, vec![1, 2, 3, 255]));
        let surface = SpriteSurface::from_images(images).unwrap();
        shared.sprite_bank.lock().unwrap().slot_set(0, surface).unwrap();

        let alive = Arc::new(AtomicBool::new(true));
        let mut state = ThreadState::new(0, 0, Arc::clone(&shared), alive);
        state.regints[0] = 0;
        state.regints[1] = 999;

        let err = state.execute("show", &[Operand::RegInt(0), Operand::RegInt(1)]);
        assert!(matches!(err, Err(RuntimeFault::AlphaRange { .. })));
        assert_eq!(shared.sprite_bank.lock().unwrap().slot(0).unwrap().alpha(), 255);
    }
}
