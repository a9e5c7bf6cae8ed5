//! Styled terminal prompter for connection questions

use std::io::{self, Write};

use async_trait::async_trait;
use conncred_core::{AnswerValue, Answers, PromptError, Prompter, Question, QuestionKind};
use crossterm::cursor::MoveUp;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

/// How many times an empty answer to a required question is re-asked
const MAX_ATTEMPTS: usize = 3;

/// Asks questions on the controlling terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter {
    header: Option<String>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print `title` above the first question of each batch
    pub fn with_header(mut self, title: impl Into<String>) -> Self {
        self.header = Some(title.into());
        self
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, questions: &[Question]) -> Result<Answers, PromptError> {
        let questions = questions.to_vec();
        let header = self.header.clone();

        tokio::task::spawn_blocking(move || {
            let mut session = Session::new()?;
            session.run(header.as_deref(), &questions)
        })
        .await
        .map_err(|e| PromptError::Io(format!("prompt task failed: {}", e)))?
    }
}

/// One batch of questions on stdout/stdin
struct Session {
    stdout: io::Stdout,
    editor: Editor<(), DefaultHistory>,
}

impl Session {
    fn new() -> Result<Self, PromptError> {
        let config = Config::builder().auto_add_history(false).build();
        let editor = Editor::with_config(config).map_err(io_error)?;

        Ok(Self {
            stdout: io::stdout(),
            editor,
        })
    }

    fn run(&mut self, header: Option<&str>, questions: &[Question]) -> Result<Answers, PromptError> {
        let mut answers = Answers::new();

        if let Some(title) = header {
            println!();
            self.print_header(title)?;
            println!();
        }

        let total = questions.len();
        for (index, question) in questions.iter().enumerate() {
            self.print_step(index + 1, total, &question.message)?;

            let Some(value) = self.ask(question)? else {
                tracing::debug!(question = %question.name, "question left unanswered");
                continue;
            };

            self.clear_prompt_lines(2)?;
            self.print_success(&format!("{}: {}", question.message, summarize(question, &value)))?;
            answers.insert(question.name.clone(), value);
        }

        Ok(answers)
    }

    fn ask(&mut self, question: &Question) -> Result<Option<AnswerValue>, PromptError> {
        for _ in 0..MAX_ATTEMPTS {
            let answer = match &question.kind {
                QuestionKind::Input => self.ask_text(question)?.map(AnswerValue::Text),
                QuestionKind::Password => self.ask_password()?.map(AnswerValue::Text),
                QuestionKind::Confirm => self.ask_confirm(question)?.map(AnswerValue::Bool),
                QuestionKind::List(choices) => {
                    self.ask_choice(choices)?.map(AnswerValue::Text)
                }
            };

            match answer {
                Some(AnswerValue::Text(text)) if text.is_empty() && question.required => {
                    self.print_error(&format!("{} is required.", question.message))?;
                }
                other => return Ok(other),
            }
        }

        Ok(None)
    }

    fn ask_text(&mut self, question: &Question) -> Result<Option<String>, PromptError> {
        let line = self.read_line(question.default.as_deref())?;
        Ok(Some(match (line.is_empty(), &question.default) {
            (true, Some(default)) => default.clone(),
            _ => line,
        }))
    }

    fn ask_confirm(&mut self, question: &Question) -> Result<Option<bool>, PromptError> {
        let default = question.default.as_deref().and_then(parse_confirm);
        let hint = match default {
            Some(true) => "Y/n",
            Some(false) => "y/N",
            None => "y/n",
        };

        loop {
            let line = self.read_line(Some(hint))?;
            if line.is_empty() {
                return Ok(default);
            }
            match parse_confirm(&line) {
                Some(value) => return Ok(Some(value)),
                None => self.print_error("Please answer yes or no.")?,
            }
        }
    }

    fn ask_choice(&mut self, choices: &[String]) -> Result<Option<String>, PromptError> {
        println!();
        for (index, choice) in choices.iter().enumerate() {
            self.print_dim(&format!("{}) {}", index + 1, choice))?;
        }

        loop {
            let line = self.read_line(Some("number or name"))?;
            if line.is_empty() {
                return Ok(None);
            }
            match parse_choice(&line, choices) {
                Some(choice) => return Ok(Some(choice)),
                None => self.print_error("Not one of the listed choices.")?,
            }
        }
    }

    fn read_line(&mut self, placeholder: Option<&str>) -> Result<String, PromptError> {
        if let Some(placeholder) = placeholder {
            execute!(
                self.stdout,
                SetForegroundColor(Color::DarkGrey),
                Print(format!("  ({})", placeholder)),
                ResetColor,
            )
            .map_err(io_error)?;
        }
        println!();

        // Build colored prompt
        let prompt = "\x1b[36m  › \x1b[0m";

        match self.editor.readline(prompt) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Err(PromptError::Cancelled),
            Err(e) => Err(io_error(e)),
        }
    }

    /// Read a password without echo, printing one `*` per character
    fn ask_password(&mut self) -> Result<Option<String>, PromptError> {
        println!();
        execute!(self.stdout, SetForegroundColor(Color::Cyan), Print("  › "), ResetColor)
            .map_err(io_error)?;

        terminal::enable_raw_mode().map_err(io_error)?;
        let result = read_masked(&mut self.stdout);
        terminal::disable_raw_mode().map_err(io_error)?;
        println!();

        result.map(Some)
    }

    fn clear_prompt_lines(&mut self, lines: u16) -> Result<(), PromptError> {
        for _ in 0..lines {
            execute!(self.stdout, MoveUp(1), Clear(ClearType::CurrentLine)).map_err(io_error)?;
        }
        Ok(())
    }

    fn print_header(&mut self, title: &str) -> Result<(), PromptError> {
        execute!(
            self.stdout,
            SetForegroundColor(Color::Cyan),
            SetAttribute(Attribute::Bold),
            Print(format!("◆ {}", title)),
            ResetColor,
            SetAttribute(Attribute::Reset),
        )
        .map_err(io_error)?;
        println!();
        Ok(())
    }

    fn print_step(&mut self, current: usize, total: usize, title: &str) -> Result<(), PromptError> {
        execute!(
            self.stdout,
            SetForegroundColor(Color::Blue),
            Print(format!("[{}/{}] ", current, total)),
            SetForegroundColor(Color::White),
            SetAttribute(Attribute::Bold),
            Print(title),
            ResetColor,
            SetAttribute(Attribute::Reset),
        )
        .map_err(io_error)?;
        Ok(())
    }

    fn print_success(&mut self, message: &str) -> Result<(), PromptError> {
        execute!(
            self.stdout,
            SetForegroundColor(Color::Green),
            Print("  ✓ "),
            ResetColor,
            Print(message),
        )
        .map_err(io_error)?;
        println!();
        Ok(())
    }

    fn print_error(&mut self, message: &str) -> Result<(), PromptError> {
        execute!(
            self.stdout,
            SetForegroundColor(Color::Red),
            Print("  ✗ "),
            ResetColor,
            Print(message),
        )
        .map_err(io_error)?;
        println!();
        Ok(())
    }

    fn print_dim(&mut self, message: &str) -> Result<(), PromptError> {
        execute!(
            self.stdout,
            SetForegroundColor(Color::DarkGrey),
            Print(format!("  {}", message)),
            ResetColor,
        )
        .map_err(io_error)?;
        println!();
        Ok(())
    }
}

/// Raw-mode key loop; the caller restores cooked mode
fn read_masked(stdout: &mut io::Stdout) -> Result<String, PromptError> {
    let mut password = String::new();

    loop {
        let Event::Key(key) = event::read().map_err(io_error)? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Esc => return Err(PromptError::Cancelled),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(PromptError::Cancelled)
            }
            KeyCode::Char(c) => {
                password.push(c);
                execute!(stdout, Print("*")).map_err(io_error)?;
            }
            KeyCode::Backspace => {
                if password.pop().is_some() {
                    execute!(stdout, Print("\u{8} \u{8}")).map_err(io_error)?;
                }
            }
            _ => {}
        }
        stdout.flush().map_err(io_error)?;
    }
}

fn io_error(e: impl std::fmt::Display) -> PromptError {
    PromptError::Io(e.to_string())
}

/// Text echoed back after an answer; passwords are masked
fn summarize(question: &Question, value: &AnswerValue) -> String {
    match (value, &question.kind) {
        (AnswerValue::Text(text), QuestionKind::Password) if text.is_empty() => {
            "(empty)".to_string()
        }
        (AnswerValue::Text(_), QuestionKind::Password) => "********".to_string(),
        (AnswerValue::Text(text), _) => text.clone(),
        (AnswerValue::Bool(true), _) => "yes".to_string(),
        (AnswerValue::Bool(false), _) => "no".to_string(),
    }
}

fn parse_confirm(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => Some(true),
        "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

fn parse_choice(input: &str, choices: &[String]) -> Option<String> {
    if let Ok(index) = input.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| choices.get(i))
            .cloned();
    }

    choices
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(input))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confirm() {
        assert_eq!(parse_confirm("Y"), Some(true));
        assert_eq!(parse_confirm(" no "), Some(false));
        assert_eq!(parse_confirm("maybe"), None);
    }

    #[test]
    fn test_parse_choice() {
        let choices = vec!["SqlLogin".to_string(), "Integrated".to_string()];
        assert_eq!(parse_choice("2", &choices).as_deref(), Some("Integrated"));
        assert_eq!(parse_choice("sqllogin", &choices).as_deref(), Some("SqlLogin"));
        assert_eq!(parse_choice("0", &choices), None);
        assert_eq!(parse_choice("3", &choices), None);
        assert_eq!(parse_choice("AzureMFA", &choices), None);
    }

    #[test]
    fn test_summarize_masks_passwords() {
        let question = Question::new(QuestionKind::Password, "password", "Password");
        let shown = summarize(&question, &AnswerValue::Text("hunter2".into()));
        assert_eq!(shown, "********");
        let shown = summarize(&question, &AnswerValue::Text(String::new()));
        assert_eq!(shown, "(empty)");

        let question = Question::new(QuestionKind::Confirm, "save_password", "Save?");
        assert_eq!(summarize(&question, &AnswerValue::Bool(false)), "no");
    }
}
