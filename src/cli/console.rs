//! Line input and output for the driver.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use termimad::MadSkin;

use crate::error::{Error, Result};

pub trait Console {
    /// Read one line after showing `prompt`. `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Print a plain line.
    fn say(&mut self, line: &str);

    /// Print model output formatted as markdown.
    fn render(&mut self, markdown: &str) {
        self.say(markdown);
    }
}

/// Interactive terminal backed by rustyline, rendering answers with termimad.
pub struct TerminalConsole {
    editor: DefaultEditor,
    skin: MadSkin,
}

impl TerminalConsole {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| Error::Terminal(e.to_string()))?;
        Ok(Self {
            editor,
            skin: MadSkin::default(),
        })
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(Error::Terminal(e.to_string())),
        }
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn render(&mut self, markdown: &str) {
        self.skin.print_text(markdown);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Feeds queued lines and records everything shown.
    pub struct ScriptedConsole {
        input: VecDeque<String>,
        prompts: Vec<String>,
        output: Vec<String>,
    }

    impl ScriptedConsole {
        pub fn new<I, S>(lines: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                input: lines.into_iter().map(Into::into).collect(),
                prompts: Vec::new(),
                output: Vec::new(),
            }
        }

        pub fn prompts(&self) -> Vec<&str> {
            self.prompts.iter().map(String::as_str).collect()
        }

        pub fn lines(&self) -> &[String] {
            &self.output
        }

        pub fn printed(&self, line: &str) -> bool {
            self.output.iter().any(|l| l == line)
        }
    }

    impl Console for ScriptedConsole {
        fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
            self.prompts.push(prompt.to_string());
            Ok(self.input.pop_front())
        }

        fn say(&mut self, line: &str) {
            self.output.push(line.to_string());
        }
    }
}
