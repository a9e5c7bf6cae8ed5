//! Typed questions and the prompter interface

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Kind of input a question expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Free text
    Input,
    /// Text entered without echo
    Password,
    /// Yes / no
    Confirm,
    /// One of a fixed set of choices
    List(Vec<String>),
}

/// A single question put to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub kind: QuestionKind,
    /// Key of the answer in [`Answers`]
    pub name: String,
    pub message: String,
    pub default: Option<String>,
    /// Whether an empty answer is rejected by the prompter
    pub required: bool,
}

impl Question {
    pub fn new(kind: QuestionKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            message: message.into(),
            default: None,
            required: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// An answer value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Text(String),
    Bool(bool),
}

/// Answers keyed by question name. Missing keys mean "not answered".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(HashMap<String, AnswerValue>);

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AnswerValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, AnswerValue::Text(value.into()));
        self
    }

    pub fn with_bool(mut self, name: impl Into<String>, value: bool) -> Self {
        self.insert(name, AnswerValue::Bool(value));
        self
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(AnswerValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(AnswerValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Errors a prompter can report
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("prompt failed: {0}")]
    Io(String),
}

/// Asks the user a batch of questions
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask `questions` in order and collect the answers
    async fn prompt(&self, questions: &[Question]) -> Result<Answers, PromptError>;
}
