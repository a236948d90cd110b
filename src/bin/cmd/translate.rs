use std::path::PathBuf;

use miette::IntoDiagnostic;
use tokio::fs;

/// Translate a source file into an executable program image
#[derive(clap::Args)]
pub struct Args {
    /// Source file to translate
    input: PathBuf,

    /// Where to write the translated program (JSON)
    output: PathBuf,
}

impl Args {
    pub async fn exec(self) -> miette::Result<()> {
        let source = fs::read_to_string(&self.input).await.into_diagnostic()?;

        let program = sigil::translate(&source).into_diagnostic()?;
        let json = program.to_json().into_diagnostic()?;

        fs::write(&self.output, json).await.into_diagnostic()?;
        eprintln!("Wrote {}", self.output.display());

        Ok(())
    }
}
