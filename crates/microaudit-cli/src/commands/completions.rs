//! `microaudit completions <shell>`
//!
//! Prints a completion script for the `microaudit` binary, covering every
//! subcommand (`auth`, `notes`, `tasks`, `workspaces`, `config`). For bash:
//! `microaudit completions bash > ~/.local/share/bash-completion/completions/microaudit`

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub fn execute(&self) -> Result<()> {
        let mut stdout = io::stdout().lock();
        self.write_to(&mut stdout)?;
        stdout.flush().context("Failed to write completions")
    }

    fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        let mut cmd = crate::Cli::command();
        let bin = cmd.get_name().to_string();
        clap_complete::generate(self.shell, &mut cmd, bin, out);
        Ok(())
    }
}
