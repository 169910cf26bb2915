//! Shell completion scripts
//!
//! ```bash
//! source <(calrisk completions bash)
//! calrisk completions fish > ~/.config/fish/completions/calrisk.fish
//! ```

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use miette::Result;
use std::io;

use crate::cli::Cli;

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    generate(args.shell, &mut Cli::command(), "calrisk", &mut io::stdout());
    Ok(())
}
