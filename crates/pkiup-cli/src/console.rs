use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use pkiup_engine::UpgradeConsole;

use crate::render::StageProgress;

/// Terminal-backed console: banners go to stdout, confirmations block on a
/// stdin line. Unrecognized answers re-prompt.
pub struct StdioConsole {
    verbose: bool,
}

impl StdioConsole {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl UpgradeConsole for StdioConsole {
    fn notice(&mut self, text: &str) {
        println!("{text}");
    }

    fn log(&mut self, text: &str) {
        if self.verbose {
            println!("{text}");
        }
    }

    fn confirm(&mut self, prompt: &str, default_yes: bool) -> Result<bool> {
        let options = if default_yes { "Yes/no" } else { "yes/No" };
        let stdin = io::stdin();
        loop {
            print!("{prompt} ({options}) ");
            io::stdout().flush().context("failed to flush stdout")?;

            let mut answer = String::new();
            let read = stdin
                .lock()
                .read_line(&mut answer)
                .context("failed to read answer")?;
            if read == 0 {
                // closed stdin takes the default
                println!();
                return Ok(default_yes);
            }

            if let Some(choice) = interpret_answer(&answer, default_yes) {
                return Ok(choice);
            }
            println!("Please answer yes or no.");
        }
    }
}

/// Console for silent rich runs: banners print above the live progress bar
/// and confirmations never happen, so the default answer stands.
pub struct ProgressConsole {
    progress: StageProgress,
    verbose: bool,
}

impl ProgressConsole {
    pub fn new(progress: StageProgress, verbose: bool) -> Self {
        Self { progress, verbose }
    }

    pub fn advance(&mut self, steps: u64) {
        self.progress.advance(steps);
    }

    pub fn finish_success(self) {
        self.progress.finish_success();
    }

    pub fn finish_abandon(self) {
        self.progress.finish_abandon();
    }
}

impl UpgradeConsole for ProgressConsole {
    fn notice(&mut self, text: &str) {
        self.progress.println(text);
    }

    fn log(&mut self, text: &str) {
        if self.verbose {
            self.progress.println(text);
        }
    }

    fn confirm(&mut self, _prompt: &str, default_yes: bool) -> Result<bool> {
        Ok(default_yes)
    }
}

pub fn interpret_answer(answer: &str, default_yes: bool) -> Option<bool> {
    let normalized = answer.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Some(default_yes),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
