pub mod isa;
pub mod machine;
pub mod translator;

pub use isa::{CompiledProgram, Instruction, Opcode};
pub use machine::{RunOptions, RunReport, RunStatus, simulate};
pub use translator::translate;
