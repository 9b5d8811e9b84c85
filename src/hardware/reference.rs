//! ReferenceHardware — a small deterministic machine for running demes
//!
//! Each context owns a call stack of frames; a frame runs one function from
//! its first instruction and returns when it runs off the end. Binding picks
//! the function whose tag is most similar (ties go to the lowest index).
//! If/While/Countdown skip to just past the next Close when their condition is
//! zero and fall through otherwise; Close and Break are no-ops.

use super::{HardwareLimits, Memory, TaskEnvironment, VirtualHardware};
use crate::genome::{Genome, Instruction, Opcode, Tag};
use crate::oracle::TaskValue;

#[derive(Debug, Clone, Default)]
struct Frame {
    function: usize,
    ip: usize,
    local: Memory,
    input: Memory,
    output: Memory,
}

#[derive(Debug, Clone, Default)]
struct Context {
    stack: Vec<Frame>,
}

fn read(mem: &Memory, addr: i32) -> TaskValue {
    mem.get(&addr).copied().unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ReferenceHardware {
    program: Genome,
    limits: HardwareLimits,
    contexts: Vec<Context>,
    pending: Vec<Context>,
    shared: Memory,
    executing: bool,
}

impl ReferenceHardware {
    pub fn new(limits: HardwareLimits) -> Self {
        Self {
            program: Genome::new(),
            limits,
            contexts: Vec::new(),
            pending: Vec::new(),
            shared: Memory::new(),
            executing: false,
        }
    }

    pub fn limits(&self) -> &HardwareLimits {
        &self.limits
    }

    /// Read-only view of shared memory
    pub fn shared_memory(&self) -> &Memory {
        &self.shared
    }

    fn bind(&self, tag: Tag, min_bind_threshold: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, function) in self.program.functions.iter().enumerate() {
            let score = tag.similarity(&function.tag);
            if score < min_bind_threshold {
                continue;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn running(&self) -> usize {
        self.contexts.len() + self.pending.len()
    }

    /// Pop the top frame, handing its output memory to the caller
    fn return_from(ctx: &mut Context) {
        if let Some(done) = ctx.stack.pop() {
            if let Some(caller) = ctx.stack.last_mut() {
                caller.local.extend(done.output);
            }
        }
    }

    fn step(&mut self, ctx: &mut Context, env: &mut dyn TaskEnvironment) {
        let inst = {
            let Some(frame) = ctx.stack.last_mut() else {
                return;
            };
            let Some(function) = self.program.functions.get(frame.function) else {
                ctx.stack.clear();
                return;
            };
            match function.instructions.get(frame.ip) {
                Some(inst) => {
                    frame.ip += 1;
                    *inst
                }
                None => {
                    Self::return_from(ctx);
                    return;
                }
            }
        };
        self.execute(ctx, inst, env);
    }

    fn execute(&mut self, ctx: &mut Context, inst: Instruction, env: &mut dyn TaskEnvironment) {
        let [a0, a1, a2] = inst.args;
        match inst.opcode {
            Opcode::Call => {
                if ctx.stack.len() >= self.limits.max_call_depth {
                    return;
                }
                if let Some(function) = self.bind(inst.tag, self.limits.min_bind_threshold) {
                    let input = ctx.stack.last().map(|f| f.local.clone()).unwrap_or_default();
                    ctx.stack.push(Frame { function, input, ..Frame::default() });
                }
                return;
            }
            Opcode::Return => {
                Self::return_from(ctx);
                return;
            }
            Opcode::Terminate => {
                ctx.stack.clear();
                return;
            }
            Opcode::Fork => {
                let local = ctx.stack.last().map(|f| f.local.clone()).unwrap_or_default();
                self.spawn_context(inst.tag, self.limits.min_bind_threshold, local);
                return;
            }
            _ => {}
        }

        let Some(frame) = ctx.stack.last_mut() else {
            return;
        };
        let local = &mut frame.local;
        match inst.opcode {
            Opcode::Inc => {
                let v = read(local, a0).wrapping_add(1);
                local.insert(a0, v);
            }
            Opcode::Dec => {
                let v = read(local, a0).wrapping_sub(1);
                local.insert(a0, v);
            }
            Opcode::Not => {
                let v = TaskValue::from(read(local, a0) == 0);
                local.insert(a0, v);
            }
            Opcode::Add => {
                let v = read(local, a0).wrapping_add(read(local, a1));
                local.insert(a2, v);
            }
            Opcode::Sub => {
                let v = read(local, a0).wrapping_sub(read(local, a1));
                local.insert(a2, v);
            }
            Opcode::Mult => {
                let v = read(local, a0).wrapping_mul(read(local, a1));
                local.insert(a2, v);
            }
            Opcode::Div => {
                let d = read(local, a1);
                if d != 0 {
                    local.insert(a2, read(local, a0) / d);
                }
            }
            Opcode::Mod => {
                let d = read(local, a1);
                if d != 0 {
                    local.insert(a2, read(local, a0) % d);
                }
            }
            Opcode::TestEqu => {
                let v = TaskValue::from(read(local, a0) == read(local, a1));
                local.insert(a2, v);
            }
            Opcode::TestNEqu => {
                let v = TaskValue::from(read(local, a0) != read(local, a1));
                local.insert(a2, v);
            }
            Opcode::TestLess => {
                let v = TaskValue::from(read(local, a0) < read(local, a1));
                local.insert(a2, v);
            }
            Opcode::If | Opcode::While | Opcode::Countdown => {
                let cond = read(local, a0);
                if cond == 0 {
                    let insts = &self.program.functions[frame.function].instructions;
                    let start = frame.ip.min(insts.len());
                    frame.ip = insts[start..]
                        .iter()
                        .position(|i| i.opcode == Opcode::Close)
                        .map_or(insts.len(), |offset| start + offset + 1);
                } else if inst.opcode == Opcode::Countdown {
                    local.insert(a0, cond - 1);
                }
            }
            Opcode::SetMem => {
                local.insert(a0, a1 as TaskValue);
            }
            Opcode::CopyMem => {
                let v = read(local, a1);
                local.insert(a0, v);
            }
            Opcode::SwapMem => {
                let (x, y) = (read(local, a0), read(local, a1));
                local.insert(a0, y);
                local.insert(a1, x);
            }
            Opcode::Input => {
                let v = read(&frame.input, a0);
                frame.local.insert(a1, v);
            }
            Opcode::Output => {
                let v = read(&frame.local, a0);
                frame.output.insert(a1, v);
            }
            Opcode::Commit => {
                let v = read(local, a0);
                self.shared.insert(a1, v);
            }
            Opcode::Pull => {
                let v = read(&self.shared, a0);
                local.insert(a1, v);
            }
            Opcode::Nand => {
                let v = !(read(local, a0) & read(local, a1));
                local.insert(a2, v);
            }
            Opcode::Load1 => {
                local.insert(a0, env.next_task_input());
            }
            Opcode::Load2 => {
                local.insert(a0, env.task_input(0));
                local.insert(a1, env.task_input(1));
            }
            Opcode::Submit => {
                env.submit(read(local, a0));
            }
            Opcode::Close | Opcode::Break | Opcode::Nop => {}
            Opcode::Call | Opcode::Return | Opcode::Terminate | Opcode::Fork => {}
        }
    }
}

impl VirtualHardware for ReferenceHardware {
    fn load_program(&mut self, program: &Genome) {
        self.program.clone_from(program);
        self.reset();
    }

    fn reset(&mut self) {
        self.contexts.clear();
        self.pending.clear();
        self.shared.clear();
        self.executing = false;
    }

    fn single_process(&mut self, env: &mut dyn TaskEnvironment) {
        self.executing = true;
        for idx in 0..self.contexts.len() {
            let mut ctx = std::mem::take(&mut self.contexts[idx]);
            self.step(&mut ctx, env);
            self.contexts[idx] = ctx;
        }
        self.executing = false;

        self.contexts.retain(|ctx| !ctx.stack.is_empty());
        let room = self.limits.max_contexts.saturating_sub(self.contexts.len());
        let admitted = self.pending.len().min(room);
        self.contexts.extend(self.pending.drain(..admitted));
        self.pending.clear();
    }

    fn spawn_context(&mut self, tag: Tag, min_bind_threshold: f64, input: Memory) -> bool {
        if self.running() >= self.limits.max_contexts {
            return false;
        }
        let Some(function) = self.bind(tag, min_bind_threshold) else {
            return false;
        };
        let ctx = Context {
            stack: vec![Frame { function, input, ..Frame::default() }],
        };
        if self.executing {
            self.pending.push(ctx);
        } else {
            self.contexts.push(ctx);
        }
        true
    }

    fn active_contexts(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingEnv {
        inputs: [TaskValue; 2],
        load_id: usize,
        submitted: Vec<TaskValue>,
    }

    impl RecordingEnv {
        fn new(a: TaskValue, b: TaskValue) -> Self {
            Self { inputs: [a, b], load_id: 0, submitted: Vec::new() }
        }
    }

    impl TaskEnvironment for RecordingEnv {
        fn task_input(&self, slot: usize) -> TaskValue {
            self.inputs[slot]
        }

        fn next_task_input(&mut self) -> TaskValue {
            let v = self.inputs[self.load_id];
            self.load_id = (self.load_id + 1) % 2;
            v
        }

        fn submit(&mut self, value: TaskValue) {
            self.submitted.push(value);
        }
    }

    fn hardware(text: &str) -> ReferenceHardware {
        let mut hw = ReferenceHardware::new(HardwareLimits::default());
        hw.load_program(&Genome::parse(text).unwrap());
        hw
    }

    fn run(hw: &mut ReferenceHardware, env: &mut RecordingEnv, steps: usize) {
        for _ in 0..steps {
            hw.single_process(env);
        }
    }

    #[test]
    fn test_nand_submission() {
        let mut hw = hardware(
            "Fn-0000000000000000:\n  Load-2(0,1)\n  Nand(0,1,2)\n  Submit(2)\n",
        );
        assert!(hw.spawn_context(Tag::zero(), 0.0, Memory::new()));
        let mut env = RecordingEnv::new(5, 3);
        run(&mut hw, &mut env, 3);
        assert_eq!(env.submitted, vec![!(5u32 & 3)]);
        // Runs off the end on the next step and retires.
        run(&mut hw, &mut env, 1);
        assert_eq!(hw.active_contexts(), 0);
    }

    #[test]
    fn test_load1_rotates_inputs() {
        let mut hw = hardware("Fn-0000000000000000:\n  Load-1(0)\n  Submit(0)\n  Load-1(1)\n  Submit(1)\n");
        hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        let mut env = RecordingEnv::new(11, 22);
        run(&mut hw, &mut env, 4);
        assert_eq!(env.submitted, vec![11, 22]);
    }

    #[test]
    fn test_spawn_respects_threshold_and_capacity() {
        let mut hw = ReferenceHardware::new(HardwareLimits { max_contexts: 2, ..HardwareLimits::default() });
        hw.load_program(&Genome::parse("Fn-0000000000000000:\n  Nop()\n").unwrap());
        assert!(!hw.spawn_context(Tag::new(u16::MAX), 0.5, Memory::new()));
        assert!(hw.spawn_context(Tag::zero(), 0.5, Memory::new()));
        assert!(hw.spawn_context(Tag::new(0x0001), 0.5, Memory::new()));
        assert!(!hw.spawn_context(Tag::zero(), 0.5, Memory::new()));
        assert_eq!(hw.active_contexts(), 2);
        hw.reset();
        assert_eq!(hw.active_contexts(), 0);
    }

    #[test]
    fn test_fork_admits_after_step() {
        let mut hw = hardware("Fn-0000000000000000:\n  Fork()\n  Nop()\n  Nop()\n");
        hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        let mut env = RecordingEnv::new(1, 2);
        run(&mut hw, &mut env, 1);
        assert_eq!(hw.active_contexts(), 2);
    }

    #[test]
    fn test_call_returns_output_to_caller() {
        let mut hw = hardware(
            "Fn-0000000000000000:\n  Call[1111111111111111]()\n  Submit(4)\n\
             Fn-1111111111111111:\n  SetMem(0,9)\n  Output(0,4)\n",
        );
        hw.spawn_context(Tag::zero(), 0.5, Memory::new());
        let mut env = RecordingEnv::new(0, 0);
        run(&mut hw, &mut env, 5);
        assert_eq!(env.submitted, vec![9]);
    }

    #[test]
    fn test_if_skips_block_when_zero() {
        let mut hw = hardware(
            "Fn-0000000000000000:\n  If(0)\n  SetMem(1,5)\n  Close()\n  Inc(1)\n  Submit(1)\n",
        );
        hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        let mut env = RecordingEnv::new(0, 0);
        run(&mut hw, &mut env, 3);
        assert_eq!(env.submitted, vec![1]);
    }

    #[test]
    fn test_terminate_ends_context() {
        let mut hw = hardware("Fn-0000000000000000:\n  Terminate()\n  Submit(0)\n");
        hw.spawn_context(Tag::zero(), 0.0, Memory::new());
        let mut env = RecordingEnv::new(0, 0);
        run(&mut hw, &mut env, 3);
        assert!(env.submitted.is_empty());
        assert_eq!(hw.active_contexts(), 0);
    }
}
