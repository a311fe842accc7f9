use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

/// Where interactive answers come from.
///
/// The installer asks all of its questions through this seam so the prompts
/// can be scripted in tests instead of blocking on a terminal.
pub trait InputSource {
	/// Display `prompt` and read one trimmed line.
	fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Answers typed by the operator on the controlling terminal.
pub struct Console;

impl InputSource for Console {
	fn read_line(&mut self, prompt: &str) -> Result<String> {
		print!("{}", prompt);
		io::stdout().flush()?;
		let mut line = String::new();
		let read = io::stdin()
			.lock()
			.read_line(&mut line)
			.context("Failed to read from stdin")?;
		if read == 0 {
			// Re-prompt loops must not spin on a closed stdin.
			bail!("End of input while waiting for an answer");
		}
		Ok(line.trim().to_string())
	}
}

/// Canned answers for tests. Fails once the script runs out, which also
/// bounds otherwise-unbounded re-prompt loops.
#[cfg(test)]
pub struct Scripted {
	answers: std::collections::VecDeque<String>,
}

#[cfg(test)]
impl Scripted {
	pub fn new<I>(answers: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<String>,
	{
		Scripted {
			answers: answers.into_iter().map(Into::into).collect(),
		}
	}
}

#[cfg(test)]
impl InputSource for Scripted {
	fn read_line(&mut self, _prompt: &str) -> Result<String> {
		self.answers
			.pop_front()
			.context("Scripted input exhausted")
	}
}
