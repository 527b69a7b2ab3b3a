use std::{
    fmt::Display,
    io::{self, BufRead, Write},
};

use anyhow::Result;
use thiserror::Error;
use tracing::trace;

/// Typed at any prompt to leave the current flow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    #[error("Quit requested")]
    Quit,
    #[error("Back to the menu")]
    Menu,
}

impl Interrupt {
    /// `q`, `quit` and `menu` are only recognized in lowercase, so `Q` still works as a code.
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer {
            "q" | "quit" => Some(Interrupt::Quit),
            "menu" => Some(Interrupt::Menu),
            _ => None,
        }
    }
}

/// Line based conversation with the user.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Shows `prompt` and returns the next line without its line ending.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    fn say(&mut self, message: &str);
}

/// Prompter over the process stdin and stdout.
pub struct StdinPrompter {
    stdin: io::StdinLock<'static>,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for StdinPrompter {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} ")?;
        stdout.flush()?;

        let mut line = String::new();
        if self.stdin.read_line(&mut line)? == 0 {
            // Closed stdin behaves like quitting.
            return Err(Interrupt::Quit.into());
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn say(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Asks until `parse` accepts the answer. Rejected answers are explained and asked again, the
/// interrupt words end the flow with an [Interrupt] error.
pub fn ask<T, E: Display>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T> {
    loop {
        let answer = prompter.read_line(prompt)?;
        let answer = answer.trim();
        if let Some(interrupt) = Interrupt::from_answer(answer) {
            return Err(interrupt.into());
        }
        match parse(answer) {
            Ok(value) => return Ok(value),
            Err(e) => {
                trace!("Rejected answer {answer:?}");
                prompter.say(&format!("Invalid input: {e}"));
            }
        }
    }
}

/// Whether `error` is the given interrupt.
pub fn is_interrupt(error: &anyhow::Error, interrupt: Interrupt) -> bool {
    error.downcast_ref::<Interrupt>() == Some(&interrupt)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use anyhow::Result;
    use mockall::{predicate::eq, Sequence};

    use crate::cli::input::parse_yes_no;

    use super::{ask, is_interrupt, Interrupt, MockPrompter, Prompter};

    /// Prompter replaying scripted answers and recording everything shown.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        answers: VecDeque<String>,
        pub prompts: Vec<String>,
        pub output: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
            Self {
                answers: answers.into_iter().map(String::from).collect(),
                ..Default::default()
            }
        }

        pub fn printed(&self, text: &str) -> bool {
            self.output.iter().any(|line| line.contains(text))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn read_line(&mut self, prompt: &str) -> Result<String> {
            self.prompts.push(prompt.to_string());
            Ok(self
                .answers
                .pop_front()
                .unwrap_or_else(|| panic!("No answer left for {prompt:?}")))
        }

        fn say(&mut self, message: &str) {
            self.output.push(message.to_string());
        }
    }

    #[test]
    fn test_ask_retries_until_valid() {
        let mut prompter = MockPrompter::new();
        let mut seq = Sequence::new();
        prompter
            .expect_read_line()
            .with(eq("Continue? (Y/N)"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("maybe".into()));
        prompter
            .expect_say()
            .with(eq("Invalid input: Please answer Y or N"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        prompter
            .expect_read_line()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(" y ".into()));

        assert!(ask(&mut prompter, "Continue? (Y/N)", parse_yes_no).unwrap());
    }

    #[test]
    fn test_interrupts() {
        let mut prompter = ScriptedPrompter::new(["quit"]);
        let error = ask(&mut prompter, "Anything", parse_yes_no).unwrap_err();
        assert!(is_interrupt(&error, Interrupt::Quit));

        let mut prompter = ScriptedPrompter::new(["menu"]);
        let error = ask(&mut prompter, "Anything", parse_yes_no).unwrap_err();
        assert!(is_interrupt(&error, Interrupt::Menu));
        assert!(!is_interrupt(&error, Interrupt::Quit));
    }

    #[test]
    fn test_uppercase_q_is_an_answer() {
        assert_eq!(Interrupt::from_answer("Q"), None);
        assert_eq!(Interrupt::from_answer("q"), Some(Interrupt::Quit));
    }
}
