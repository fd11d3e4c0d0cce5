//! Asking the user questions on the terminal.
//!
//! Commands that can ask (main-script selection) take a [`Prompter`]. When
//! stdin is not a terminal the binary hands them [`NoPrompt`], which answers
//! every question with its default.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use crate::error::PippyError;

pub trait Prompter {
    /// Yes/no question; an empty answer picks `default_yes`.
    fn confirm(&self, question: &str, default_yes: bool) -> Result<bool, PippyError>;

    /// Pick one of `options`; `None` skips.
    fn choose(&self, heading: &str, options: &[String]) -> Result<Option<usize>, PippyError>;

    /// Free-form answer, trimmed; empty when skipped.
    fn text(&self, question: &str) -> Result<String, PippyError>;
}

/// Prompter for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn confirm(&self, _question: &str, default_yes: bool) -> Result<bool, PippyError> {
        Ok(default_yes)
    }

    fn choose(&self, _heading: &str, _options: &[String]) -> Result<Option<usize>, PippyError> {
        Ok(None)
    }

    fn text(&self, _question: &str) -> Result<String, PippyError> {
        Ok(String::new())
    }
}

/// Line-based prompter over any reader and writer.
///
/// End of input counts as accepting the default.
pub struct LinePrompter<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl LinePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn say(&self, text: &str) -> Result<(), PippyError> {
        let mut output = self.output.borrow_mut();
        output
            .write_all(text.as_bytes())
            .and_then(|()| output.flush())
            .map_err(|e| PippyError::io("write prompt", e))
    }

    /// Print `prompt` and read one line; `None` at end of input.
    fn ask(&self, prompt: &str) -> Result<Option<String>, PippyError> {
        self.say(prompt)?;
        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .map_err(|e| PippyError::io("read answer", e))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn confirm(&self, question: &str, default_yes: bool) -> Result<bool, PippyError> {
        let suffix = if default_yes { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{question} {suffix} "))? else {
                return Ok(default_yes);
            };
            match answer.to_lowercase().as_str() {
                "" => return Ok(default_yes),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer 'yes' or 'no'.\n")?,
            }
        }
    }

    fn choose(&self, heading: &str, options: &[String]) -> Result<Option<usize>, PippyError> {
        self.say(&format!("{heading}\n"))?;
        for (index, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {option}\n", index + 1))?;
        }
        loop {
            let Some(answer) = self.ask("Select a number (0 to skip) [0]: ")? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(choice) if choice <= options.len() => return Ok(Some(choice - 1)),
                Ok(_) => self.say("Invalid selection.\n")?,
                Err(_) => self.say("Invalid input. Please enter a number.\n")?,
            }
        }
    }

    fn text(&self, question: &str) -> Result<String, PippyError> {
        Ok(self.ask(&format!("{question}: "))?.unwrap_or_default())
    }
}
