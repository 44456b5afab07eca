use std::fmt;

use crate::bytemath;
use crate::error::Result;
use crate::image::{MEMORY_SIZE, ProgramImage};
use crate::isa::{Indicators, Instruction, InstructionTable, Kind, MemoryOp, Unary};

/// Options for driving a machine to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum instructions to execute.
    pub step_limit: usize,
    /// Reject undocumented opcodes instead of falling back.
    pub strict: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            step_limit: 1000,
            strict: false,
        }
    }
}

/// Ahmes CPU state: accumulator, program counter, 256 bytes of memory.
///
/// State:
/// - `ac`: accumulator, starts at 0
/// - `pc`: program counter, starts at 0, wraps modulo 256
/// - `memory`: 256 cells, shared by program and data
/// - `running`: cleared by HLT
///
/// Two counters are kept for the learner: executed instructions, and data
/// memory accesses (loads and stores). Instruction-stream fetches of opcodes
/// and operands are not counted as accesses.
///
/// Indicators are derived from the accumulator on demand and cannot be set.
pub struct Machine<'t> {
    table: &'t InstructionTable,
    ac: u8,
    pc: u8,
    memory: [u8; MEMORY_SIZE],
    instructions: u64,
    accesses: u64,
    running: bool,
}

impl Default for Machine<'static> {
    fn default() -> Self {
        Machine::new(InstructionTable::shared())
    }
}

impl<'t> Machine<'t> {
    pub fn new(table: &'t InstructionTable) -> Self {
        Self {
            table,
            ac: 0,
            pc: 0,
            memory: [0; MEMORY_SIZE],
            instructions: 0,
            accesses: 0,
            running: true,
        }
    }

    /// Back to power-on state, memory cleared.
    pub fn reset(&mut self) {
        *self = Machine::new(self.table);
    }

    /// Copy `image` into memory. Registers and counters are untouched.
    pub fn load_program(&mut self, image: &ProgramImage) {
        self.memory.copy_from_slice(image.bytes());
    }

    pub fn accumulator(&self) -> u8 {
        self.ac
    }

    pub fn pc(&self) -> u8 {
        self.pc
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn indicators(&self) -> Indicators {
        Indicators::from_accumulator(self.ac)
    }

    pub fn instruction_count(&self) -> u64 {
        self.instructions
    }

    pub fn memory_accesses(&self) -> u64 {
        self.accesses
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_accumulator(&mut self, value: i64) -> Result<()> {
        self.ac = bytemath::require_byte_value(value)?;
        Ok(())
    }

    pub fn set_pc(&mut self, value: i64) -> Result<()> {
        self.pc = bytemath::require_byte_value(value)?;
        Ok(())
    }

    pub fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1);
    }

    /// Data load. Counts as one memory access.
    pub fn load_byte(&mut self, addr: i64) -> Result<u8> {
        let addr = bytemath::require_byte_value(addr)?;
        Ok(self.load(addr))
    }

    /// Data store. Counts as one memory access; only `addr` changes.
    pub fn store_byte(&mut self, addr: i64, value: i64) -> Result<()> {
        let addr = bytemath::require_byte_value(addr)?;
        let value = bytemath::require_byte_value(value)?;
        self.store(addr, value);
        Ok(())
    }

    fn load(&mut self, addr: u8) -> u8 {
        self.accesses += 1;
        self.memory[addr as usize]
    }

    fn store(&mut self, addr: u8, value: u8) {
        self.accesses += 1;
        self.memory[addr as usize] = value;
    }

    /// Instruction-stream read at PC, then advance. Not a memory access.
    fn fetch(&mut self) -> u8 {
        let byte = self.memory[self.pc as usize];
        self.increment_pc();
        byte
    }

    /// Run one fetch/decode/execute cycle and return what was executed.
    ///
    /// The opcode at PC is resolved permissively, so any memory content can
    /// be executed. PC moves past the opcode before the operand is fetched,
    /// and past the operand before the operation applies; a taken jump then
    /// overrides it.
    pub fn execute_one(&mut self) -> Instruction {
        let at = self.pc;
        let opcode = self.fetch();
        let ins = self.table.resolve_permissive(opcode);
        if ins.opcode != opcode {
            log::debug!(
                "undocumented opcode {opcode} at {at}, executing as {}",
                ins.mnemonic
            );
        }

        match ins.kind {
            Kind::NoOperand(op) => {
                log::debug!("{at:3}: {}", ins.mnemonic);
                self.apply_unary(op);
            }
            Kind::OneOperand(op) => {
                let addr = self.fetch();
                log::debug!("{at:3}: {} {addr}", ins.mnemonic);
                self.apply_memory(op, addr);
            }
            Kind::Jump(cond) => {
                let target = self.fetch();
                log::debug!("{at:3}: {} {target}", ins.mnemonic);
                if cond.holds(self.indicators()) {
                    self.pc = target;
                }
            }
        }

        self.instructions += 1;
        ins
    }

    fn apply_unary(&mut self, op: Unary) {
        match op {
            Unary::Shr => self.ac = bytemath::shift_right(self.ac),
            Unary::Shl => self.ac = bytemath::shift_left(self.ac),
            Unary::Ror => self.ac = bytemath::rotate_right(self.ac),
            Unary::Rol => self.ac = bytemath::rotate_left(self.ac),
            Unary::Hlt => self.running = false,
            // NOT has no ALU effect yet.
            Unary::Nop | Unary::Not => {}
        }
    }

    fn apply_memory(&mut self, op: MemoryOp, addr: u8) {
        match op {
            MemoryOp::Sta => self.store(addr, self.ac),
            // Known incomplete: the value is read but never reaches AC.
            MemoryOp::Lda => {
                let _ = self.load(addr);
            }
            // No ALU effect yet.
            MemoryOp::Add | MemoryOp::Or | MemoryOp::And | MemoryOp::Sub => {}
        }
    }

    /// Execute one instruction, first checking that the opcode at PC is
    /// documented. An undocumented opcode leaves the machine untouched.
    pub fn step_strict(&mut self) -> Result<Instruction> {
        self.table.resolve_strict(self.memory[self.pc as usize])?;
        Ok(self.execute_one())
    }

    /// Execute until HLT or until `step_limit` instructions have run.
    ///
    /// Returns the number of instructions executed by this call.
    pub fn run(&mut self, step_limit: usize) -> usize {
        let mut steps = 0;
        while self.running && steps < step_limit {
            self.execute_one();
            steps += 1;
        }
        self.log_stop(steps, step_limit);
        steps
    }

    /// Like [`run`](Self::run), but stops with `UnmappedOpcode` on
    /// the first undocumented opcode.
    pub fn run_strict(&mut self, step_limit: usize) -> Result<usize> {
        let mut steps = 0;
        while self.running && steps < step_limit {
            self.step_strict()?;
            steps += 1;
        }
        self.log_stop(steps, step_limit);
        Ok(steps)
    }

    pub fn run_with(&mut self, config: &RunConfig) -> Result<usize> {
        if config.strict {
            self.run_strict(config.step_limit)
        } else {
            Ok(self.run(config.step_limit))
        }
    }

    fn log_stop(&self, steps: usize, step_limit: usize) {
        if !self.running {
            log::info!("halted at pc={} after {steps} steps", self.pc);
        } else if steps >= step_limit {
            log::info!("step budget of {step_limit} exhausted at pc={}", self.pc);
        }
    }
}

impl fmt::Display for Machine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ind = self.indicators();
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "AC={:3} PC={:3} [{}{}{}{}{}] instructions={} accesses={}{}",
            self.ac,
            self.pc,
            flag(ind.negative, 'N'),
            flag(ind.zero, 'Z'),
            flag(ind.overflow, 'V'),
            flag(ind.carry, 'C'),
            flag(ind.borrow, 'B'),
            self.instructions,
            self.accesses,
            if self.running { "" } else { " halted" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn is_out_of_range<T>(result: &Result<T>) -> bool {
        matches!(result, Err(Error::OutOfRange(_)))
    }

    fn machine_with(program: &[u8]) -> Machine<'static> {
        let mut bytes = [0u8; MEMORY_SIZE];
        bytes[..program.len()].copy_from_slice(program);
        let mut m = Machine::default();
        m.load_program(&ProgramImage::from_bytes(&bytes).unwrap());
        m
    }

    #[test]
    fn test_power_on_state() {
        let m = Machine::default();
        assert_eq!(m.accumulator(), 0);
        assert_eq!(m.pc(), 0);
        assert!(m.memory().iter().all(|&b| b == 0));
        assert!(m.is_running());
        assert_eq!(m.instruction_count(), 0);
        assert_eq!(m.memory_accesses(), 0);
        assert!(m.indicators().zero);
        assert!(!m.indicators().negative);
    }

    #[test]
    fn test_setters_reject_out_of_range() {
        let mut m = Machine::default();
        m.set_accumulator(42).unwrap();
        m.set_pc(7).unwrap();
        assert!(is_out_of_range(&m.set_accumulator(256)));
        assert!(is_out_of_range(&m.set_accumulator(-1)));
        assert!(is_out_of_range(&m.set_pc(300)));
        assert!(is_out_of_range(&m.set_pc(-5)));
        assert_eq!(m.accumulator(), 42);
        assert_eq!(m.pc(), 7);
    }

    #[test]
    fn test_memory_access_validation() {
        let mut m = Machine::default();
        assert!(is_out_of_range(&m.load_byte(256)));
        assert!(is_out_of_range(&m.store_byte(-1, 0)));
        assert!(is_out_of_range(&m.store_byte(0, 256)));
        assert_eq!(m.memory_accesses(), 0);
        assert!(m.memory().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_store_then_load() {
        let mut m = machine_with(&[1, 2, 3, 4, 5]);
        let before = *m.memory();
        m.store_byte(3, 200).unwrap();
        assert_eq!(m.memory_accesses(), 1);
        assert_eq!(m.load_byte(3).unwrap(), 200);
        assert_eq!(m.memory_accesses(), 2);
        for i in 0..MEMORY_SIZE {
            if i != 3 {
                assert_eq!(m.memory()[i], before[i]);
            }
        }
    }

    #[test]
    fn test_pc_wraps_past_255() {
        let mut m = Machine::default();
        m.set_pc(255).unwrap();
        m.increment_pc();
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn test_nop_advances_pc() {
        let mut m = machine_with(&[0]);
        let ins = m.execute_one();
        assert_eq!(ins.mnemonic, "NOP");
        assert_eq!(m.pc(), 1);
        assert_eq!(m.instruction_count(), 1);
        assert_eq!(m.memory_accesses(), 0);
    }

    #[test]
    fn test_sta_stores_accumulator() {
        let mut m = machine_with(&[16, 100]);
        m.set_accumulator(77).unwrap();
        m.execute_one();
        assert_eq!(m.memory()[100], 77);
        assert_eq!(m.pc(), 2);
        assert_eq!(m.memory_accesses(), 1);
    }

    #[test]
    fn test_lda_reads_but_leaves_accumulator() {
        let mut m = machine_with(&[32, 10]);
        m.store_byte(10, 99).unwrap();
        m.set_accumulator(5).unwrap();
        m.execute_one();
        assert_eq!(m.accumulator(), 5);
        assert_eq!(m.pc(), 2);
        assert_eq!(m.memory_accesses(), 2);
    }

    #[test]
    fn test_alu_instructions_have_no_effect() {
        // ADD 10, OR 10, AND 10, NOT, SUB 10
        let mut m = machine_with(&[48, 10, 64, 10, 80, 10, 96, 112, 10]);
        m.store_byte(10, 3).unwrap();
        m.set_accumulator(12).unwrap();
        let accesses = m.memory_accesses();
        let memory = *m.memory();
        for _ in 0..5 {
            m.execute_one();
        }
        assert_eq!(m.accumulator(), 12);
        assert_eq!(m.pc(), 9);
        assert_eq!(m.memory_accesses(), accesses);
        assert_eq!(*m.memory(), memory);
        assert_eq!(m.instruction_count(), 5);
    }

    #[test]
    fn test_shifts_and_rotations() {
        let mut m = machine_with(&[224, 225, 226, 227]);
        m.set_accumulator(0b1000_0011).unwrap();
        m.execute_one(); // SHR
        assert_eq!(m.accumulator(), 0b0100_0001);
        m.execute_one(); // SHL
        assert_eq!(m.accumulator(), 0b1000_0010);
        m.execute_one(); // ROR
        assert_eq!(m.accumulator(), 0b0100_0001);
        m.execute_one(); // ROL
        assert_eq!(m.accumulator(), 0b1000_0010);
        assert_eq!(m.memory_accesses(), 0);
        assert_eq!(m.pc(), 4);
    }

    #[test]
    fn test_hlt_stops_running() {
        let mut m = machine_with(&[240]);
        m.execute_one();
        assert!(!m.is_running());
        assert_eq!(m.pc(), 1);
    }

    #[test]
    fn test_jmp_always_taken() {
        let mut m = machine_with(&[128, 50]);
        m.execute_one();
        assert_eq!(m.pc(), 50);
    }

    #[test]
    fn test_conditional_jumps_follow_indicators() {
        // JZ 50 with AC = 0: taken.
        let mut m = machine_with(&[160, 50]);
        m.execute_one();
        assert_eq!(m.pc(), 50);

        // JZ 50 with AC != 0: falls through past the operand.
        let mut m = machine_with(&[160, 50]);
        m.set_accumulator(1).unwrap();
        m.execute_one();
        assert_eq!(m.pc(), 2);

        // JN 50 with AC negative: taken. JP not taken.
        let mut m = machine_with(&[148, 70, 144, 50]);
        m.set_accumulator(0x90).unwrap();
        m.execute_one();
        assert_eq!(m.pc(), 2);
        m.execute_one();
        assert_eq!(m.pc(), 50);
    }

    #[test]
    fn test_flag_jumps_never_taken_for_unset_indicators() {
        // JV, JC, JB all fall through; JNV, JNC, JNB all jump.
        for (op, taken) in [(152, false), (176, false), (184, false), (156, true), (180, true), (188, true)] {
            let mut m = machine_with(&[op, 99]);
            m.execute_one();
            assert_eq!(m.pc(), if taken { 99 } else { 2 }, "opcode {op}");
        }
    }

    #[test]
    fn test_undocumented_opcode_falls_back() {
        // 17 executes as STA.
        let mut m = machine_with(&[17, 30]);
        m.set_accumulator(9).unwrap();
        let ins = m.execute_one();
        assert_eq!(ins.mnemonic, "STA");
        assert_eq!(m.memory()[30], 9);
    }

    #[test]
    fn test_operand_fetch_wraps_pc() {
        let mut m = Machine::default();
        m.store_byte(255, 128).unwrap();
        m.store_byte(0, 42).unwrap();
        m.set_pc(255).unwrap();
        m.execute_one();
        assert_eq!(m.pc(), 42);
    }

    #[test]
    fn test_step_strict_rejects_undocumented() {
        let mut m = machine_with(&[17, 30]);
        assert!(matches!(m.step_strict(), Err(Error::UnmappedOpcode(17))));
        assert_eq!(m.pc(), 0);
        assert_eq!(m.instruction_count(), 0);

        let mut m = machine_with(&[16, 30]);
        assert_eq!(m.step_strict().unwrap().mnemonic, "STA");
    }

    #[test]
    fn test_run_until_halt() {
        // STA 100, SHL, JMP 6, HLT at 6
        let mut m = machine_with(&[16, 100, 225, 128, 6, 0, 240]);
        m.set_accumulator(3).unwrap();
        let steps = m.run(1000);
        assert_eq!(steps, 4);
        assert!(!m.is_running());
        assert_eq!(m.memory()[100], 3);
        assert_eq!(m.accumulator(), 6);
        assert_eq!(m.pc(), 7);
    }

    #[test]
    fn test_run_respects_step_limit() {
        // JMP 0 forever.
        let mut m = machine_with(&[128, 0]);
        assert_eq!(m.run(100), 100);
        assert!(m.is_running());
        assert_eq!(m.instruction_count(), 100);
    }

    #[test]
    fn test_run_strict_stops_on_undocumented() {
        let mut m = machine_with(&[0, 0, 1]);
        assert!(matches!(m.run_strict(10), Err(Error::UnmappedOpcode(1))));
        assert_eq!(m.pc(), 2);
        assert_eq!(m.instruction_count(), 2);
    }

    #[test]
    fn test_run_with_config() {
        let mut m = machine_with(&[0, 1, 240]);
        let lenient = RunConfig {
            step_limit: 10,
            ..Default::default()
        };
        assert_eq!(m.run_with(&lenient).unwrap(), 3);

        let mut m = machine_with(&[0, 1, 240]);
        let strict = RunConfig {
            step_limit: 10,
            strict: true,
        };
        assert!(matches!(m.run_with(&strict), Err(Error::UnmappedOpcode(1))));
    }

    #[test]
    fn test_reset_restores_power_on() {
        let mut m = machine_with(&[16, 1, 240]);
        m.set_accumulator(4).unwrap();
        m.run(10);
        m.reset();
        assert_eq!(m.accumulator(), 0);
        assert_eq!(m.pc(), 0);
        assert!(m.is_running());
        assert_eq!(m.instruction_count(), 0);
        assert_eq!(m.memory_accesses(), 0);
        assert!(m.memory().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_loaded_image_does_not_alias_memory() {
        let image = ProgramImage::from_bytes(&[5u8; MEMORY_SIZE]).unwrap();
        let mut m = Machine::default();
        m.load_program(&image);
        m.store_byte(0, 1).unwrap();
        assert_eq!(image.bytes()[0], 5);
        assert_eq!(m.memory()[1], 5);
    }

    #[test]
    fn test_display_summary() {
        let mut m = machine_with(&[240]);
        m.set_accumulator(200).unwrap();
        m.run(5);
        let line = m.to_string();
        assert!(line.starts_with("AC=200 PC=  1 [N----]"));
        assert!(line.ends_with("halted"));
    }
}
