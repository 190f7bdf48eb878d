//! Human-in-the-loop input for tasks that need the user's word

use std::io::{self, BufRead, Write};

use grocer_error::{Error, Result};

/// Source of answers to questions asked during a task.
pub trait HumanInput: Send + Sync {
    fn ask(&self, question: &str) -> Result<String>;
}

/// Ask on stderr, read one line from stdin.
#[derive(Debug, Default)]
pub struct StdinHumanInput;

impl HumanInput for StdinHumanInput {
    fn ask(&self, question: &str) -> Result<String> {
        ask_line(&mut io::stdin().lock(), &mut io::stderr().lock(), question)
    }
}

/// Write the prompt to `out` and read one trimmed line from `input`.
fn ask_line<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> Result<String> {
    write!(out, "\n{}\n> ", question)?;
    out.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Err(Error::invalid_argument("stdin closed before an answer was given")
            .with_operation("human::ask"));
    }
    Ok(line.trim().to_string())
}

/// A pre-recorded answer, e.g. from `--consumed`.
#[derive(Debug, Clone)]
pub struct FixedHumanInput {
    answer: String,
}

impl FixedHumanInput {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

impl HumanInput for FixedHumanInput {
    fn ask(&self, _question: &str) -> Result<String> {
        Ok(self.answer.clone())
    }
}
