use clap::Parser;

mod run;
mod translate;

pub const BANNER: &str = color_print::cstr! {
r#"
     _       _ _
 ___(_) __ _(_) |      A Forth-like language toolchain for the
/ __| |/ _` | | |      <yellow><bold>sigil</bold></yellow> accumulator/stack machine:
\__ \ | (_| | | |      <bold>translate</bold> compiles source to a program image,
|___/_|\__, |_|_|      <bold>run</bold> executes it with cycle-level reporting.
       |___/"#
};

#[derive(Parser)]
#[clap(version, about, long_about = Some(BANNER))]
#[clap(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Default for Cli {
    fn default() -> Self {
        Self::parse()
    }
}

impl Cli {
    pub async fn exec(self) -> miette::Result<()> {
        self.cmd.exec().await
    }
}

#[derive(clap::Subcommand)]
pub enum Cmd {
    Translate(translate::Args),
    Run(run::Args),
}

impl Cmd {
    pub async fn exec(self) -> miette::Result<()> {
        match self {
            Cmd::Translate(args) => args.exec().await,
            Cmd::Run(args) => args.exec().await,
        }
    }
}
