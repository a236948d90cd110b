//! Control unit: the fetch/decode/execute loop driving the data path.
//!
//! Execution is fully synchronous. Every micro-operation advances a logical
//! clock tick, and the tick protocol per opcode is fixed, so tick counts are
//! reproducible for a given program and input. Normal termination (`halt`,
//! exhausted input, the step limit) is reported in the run status; machine
//! faults are a distinct error type and never fold into normal termination.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::isa::{CompiledProgram, Instruction, Opcode};
use crate::machine::data_path::{DataPath, SpSelect};

pub mod data_path;

/// Memory cells available to the machine unless overridden.
pub const DEFAULT_MEMORY_SIZE: usize = 150;

/// Executed-instruction bound unless overridden, the safety valve for
/// programs that never reach `halt`.
pub const DEFAULT_STEP_LIMIT: u64 = 3000;

/// Fatal machine conditions. These abort a run; they are never reported as a
/// normal termination status.
#[derive(Debug, Error)]
pub enum MachineFault {
    #[error("address {addr} is outside memory of {capacity} cells")]
    AddressOutOfBounds { addr: i64, capacity: usize },

    #[error("cell {0} holds an instruction where a value was expected")]
    InstructionAsValue(usize),

    #[error("cell {0} holds a value where an instruction was expected")]
    ValueAsInstruction(usize),

    #[error("division by zero")]
    DivisionByZero,

    #[error(
        "{data} data cells and {program} instructions do not fit in {capacity} memory cells"
    )]
    ProgramTooLarge {
        data: usize,
        program: usize,
        capacity: usize,
    },
}

/// Result type for machine execution
pub type Result<T> = std::result::Result<T, MachineFault>;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The program executed `halt`.
    Halted,
    /// An `input` instruction found the input buffer empty.
    InputExhausted,
    /// The executed-instruction bound was reached.
    LimitReached,
}

/// Knobs for one simulation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub memory_size: usize,
    pub step_limit: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            memory_size: DEFAULT_MEMORY_SIZE,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// Everything a finished run reports.
#[derive(Debug)]
pub struct RunReport {
    pub output: String,
    pub instructions: u64,
    pub ticks: u64,
    pub status: RunStatus,
}

/// Outcome of executing a single instruction.
enum StepOutcome {
    Continue,
    Halted,
    InputExhausted,
}

struct ControlUnit {
    program_counter: i64,
    tick: u64,
    data_path: DataPath,
}

impl ControlUnit {
    fn new(data_path: DataPath, start_addr: i64) -> ControlUnit {
        ControlUnit {
            program_counter: start_addr,
            tick: 0,
            data_path,
        }
    }

    fn tick(&mut self) {
        self.tick += 1;
    }

    /// Fetch, decode, and execute one instruction.
    fn step(&mut self) -> Result<StepOutcome> {
        let instr = self.data_path.fetch(self.program_counter)?;
        self.tick();

        match instr.code {
            Opcode::Halt => return Ok(StepOutcome::Halted),
            Opcode::Jmp => {
                self.program_counter = instr.arg;
                self.tick();
            }
            Opcode::Jz => {
                // The condition was already consumed by the `inc` the
                // translator emits in front of every `jz`; the stack pointer
                // names the cell it sits in.
                let condition = self.data_path.read_top(false)?;
                self.tick();

                if condition == 0 {
                    self.program_counter = instr.arg;
                } else {
                    self.program_counter += 1;
                }
                self.tick();
            }
            Opcode::Eq
            | Opcode::Neq
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod => self.binary(instr)?,
            Opcode::Mov => {
                self.data_path.latch_rbp();
                self.tick();

                self.data_path.latch_stack_pointer(SpSelect::Mov(instr.arg));
                self.tick();

                self.advance();
            }
            Opcode::Inc => {
                self.data_path.latch_stack_pointer(SpSelect::Inc);
                self.tick();
                self.advance();
            }
            Opcode::Dec => {
                self.data_path.latch_stack_pointer(SpSelect::Dec);
                self.tick();
                self.advance();
            }
            Opcode::MovRbp => {
                self.data_path.latch_stack_pointer(SpSelect::Rbp);
                self.tick();
                self.advance();
            }
            Opcode::Dup => {
                self.data_path.latch_stack_pointer(SpSelect::Inc);
                self.tick();

                self.data_path.read_top(true)?;
                self.tick();

                self.data_path.latch_stack_pointer(SpSelect::Dec);
                self.tick();

                let acc = self.data_path.acc;
                self.data_path.write(acc)?;
                self.tick();

                self.data_path.latch_stack_pointer(SpSelect::Dec);
                self.tick();

                self.advance();
            }
            Opcode::Input => {
                let Some(ch) = self.data_path.pop_input() else {
                    return Ok(StepOutcome::InputExhausted);
                };
                self.data_path.write(ch as i64)?;
                self.data_path.latch_stack_pointer(SpSelect::Dec);
                self.advance();
            }
            Opcode::Output => {
                self.data_path.latch_stack_pointer(SpSelect::Inc);
                self.data_path.emit_top()?;
                self.advance();
            }
            Opcode::Push => {
                self.data_path.write(instr.arg)?;
                self.data_path.latch_stack_pointer(SpSelect::Dec);
                self.advance();
            }
        }

        Ok(StepOutcome::Continue)
    }

    /// Two pops, one push: read both operands off the stack, apply the
    /// operation, and write the result over the deeper operand.
    fn binary(&mut self, instr: Instruction) -> Result<()> {
        self.data_path.latch_stack_pointer(SpSelect::Inc);
        self.tick();

        let first = self.data_path.read_top(false)?;
        self.tick();

        self.data_path.latch_stack_pointer(SpSelect::Inc);
        self.tick();

        let second = self.data_path.read_top(false)?;
        self.tick();

        let result = alu(instr.code, first, second)?;
        self.tick();

        self.data_path.write(result)?;
        self.data_path.latch_stack_pointer(SpSelect::Dec);
        self.tick();

        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        self.program_counter += 1;
        self.tick();
    }
}

impl fmt::Display for ControlUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TICK: {:3} PC: {:3} SP: {:3} ACC: {}",
            self.tick, self.program_counter, self.data_path.stack_pointer, self.data_path.acc
        )
    }
}

/// Apply a binary opcode to the two popped operands. `first` is the value
/// popped first (the former top of stack).
///
/// Division and modulo floor toward negative infinity, so the remainder
/// takes the sign of the divisor.
fn alu(code: Opcode, first: i64, second: i64) -> Result<i64> {
    let result = match code {
        Opcode::Eq => (first == second) as i64,
        Opcode::Neq => (first != second) as i64,
        Opcode::Add => first.wrapping_add(second),
        Opcode::Sub => first.wrapping_sub(second),
        Opcode::Mul => first.wrapping_mul(second),
        Opcode::Div => floor_div(first, second)?,
        Opcode::Mod => floor_mod(first, second)?,
        _ => unreachable!("not a binary opcode: {code}"),
    };
    Ok(result)
}

fn floor_div(dividend: i64, divisor: i64) -> Result<i64> {
    if divisor == 0 {
        return Err(MachineFault::DivisionByZero);
    }
    let quotient = dividend.wrapping_div(divisor);
    let remainder = dividend.wrapping_rem(divisor);
    if remainder != 0 && (remainder < 0) != (divisor < 0) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn floor_mod(dividend: i64, divisor: i64) -> Result<i64> {
    if divisor == 0 {
        return Err(MachineFault::DivisionByZero);
    }
    let remainder = dividend.wrapping_rem(divisor);
    if remainder != 0 && (remainder < 0) != (divisor < 0) {
        Ok(remainder + divisor)
    } else {
        Ok(remainder)
    }
}

/// Execute a translated program against an input text.
///
/// The program counter starts at the first instruction, one cell past the
/// data segment. The run stops on `halt`, on an empty input buffer, or after
/// `step_limit` executed instructions, whichever comes first; the two
/// non-halt stops are reported with a warning and whatever output had
/// accumulated.
pub fn simulate(program: &CompiledProgram, input: &str, options: &RunOptions) -> Result<RunReport> {
    let data_path = DataPath::new(options.memory_size, &program.data, &program.program, input)?;
    let mut control_unit = ControlUnit::new(data_path, program.data.len() as i64);

    let mut instructions = 0;
    debug!("{control_unit}");

    let status = loop {
        if instructions >= options.step_limit {
            warn!("step limit of {} exceeded", options.step_limit);
            break RunStatus::LimitReached;
        }

        match control_unit.step()? {
            StepOutcome::Continue => {
                instructions += 1;
                debug!("{control_unit}");
            }
            StepOutcome::Halted => break RunStatus::Halted,
            StepOutcome::InputExhausted => {
                warn!("input buffer is empty");
                break RunStatus::InputExhausted;
            }
        }
    };

    let output = control_unit.data_path.output_text();
    info!("output buffer: {output:?}");

    Ok(RunReport {
        output,
        instructions,
        ticks: control_unit.tick,
        status,
    })
}
