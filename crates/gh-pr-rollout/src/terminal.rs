//! Interactive console on stdin/stdout

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;
use rollout_core::{BatchState, Console, Notice};

use crate::table;

pub struct TerminalConsole;

impl TerminalConsole {
    /// Print `prompt` and read one line; `None` on end of input
    fn read_answer(&self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl Console for TerminalConsole {
    fn heading(&self, text: &str) {
        println!("\n{}", text.bold());
    }

    fn repo(&self, name: &str) {
        println!("{}", name.cyan().bold());
    }

    fn notice(&self, level: Notice, message: &str) {
        let marker = match level {
            Notice::Success => "✓".green().bold(),
            Notice::Warning => "!".yellow().bold(),
            Notice::Failure => "✗".red().bold(),
        };
        println!("  {} {}", marker, message);
    }

    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn show_state(&self, state: &BatchState, repo: Option<&str>) {
        print!("{}", table::render(state, repo));
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.read_answer(&format!("{} [y/N] ", question.bold()))?;
        Ok(answer.is_some_and(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes")))
    }

    fn select(&self, question: &str, choices: &[String]) -> Result<Option<usize>> {
        println!("{}", question.bold());
        for (index, choice) in choices.iter().enumerate() {
            println!("  {:>2}) {}", index + 1, choice);
        }

        loop {
            let Some(answer) = self.read_answer("Choice (empty to cancel): ")? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match parse_choice(&answer, choices.len()) {
                Some(index) => return Ok(Some(index)),
                None => println!("{}", format!("Pick a number between 1 and {}", choices.len()).yellow()),
            }
        }
    }

    fn input(&self, question: &str) -> Result<String> {
        self.read_answer(&format!("{} ", question.bold()))?
            .context("No answer given")
    }
}

/// 1-based answer to a 0-based index
fn parse_choice(answer: &str, len: usize) -> Option<usize> {
    match answer.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}
