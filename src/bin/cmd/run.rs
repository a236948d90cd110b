use std::path::PathBuf;

use miette::IntoDiagnostic;
use sigil::{CompiledProgram, RunOptions};
use tokio::fs;
use tracing::Level;

/// Execute a translated program image against an input file
#[derive(clap::Args)]
pub struct Args {
    /// Translated program (JSON) to execute
    program: PathBuf,

    /// File whose characters fill the machine's input buffer
    input: PathBuf,

    /// Number of memory cells available to the machine
    #[clap(long, default_value_t = sigil::machine::DEFAULT_MEMORY_SIZE)]
    memory_size: usize,

    /// Maximum number of instructions to execute
    #[clap(long, default_value_t = sigil::machine::DEFAULT_STEP_LIMIT)]
    limit: u64,

    /// Log the machine state after every executed instruction
    #[clap(long)]
    debug: bool,
}

impl Args {
    pub async fn exec(self) -> miette::Result<()> {
        if self.debug {
            init_tracing(Level::DEBUG);
        } else {
            init_tracing(Level::WARN);
        }

        let json = fs::read_to_string(&self.program).await.into_diagnostic()?;
        let program = CompiledProgram::from_json(&json).into_diagnostic()?;

        let input = fs::read_to_string(&self.input).await.into_diagnostic()?;

        let options = RunOptions {
            memory_size: self.memory_size,
            step_limit: self.limit,
        };
        let report = sigil::simulate(&program, &input, &options).into_diagnostic()?;

        println!("{}", report.output);
        println!(
            "instructions: {} ticks: {}",
            report.instructions, report.ticks
        );

        Ok(())
    }
}

fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}
