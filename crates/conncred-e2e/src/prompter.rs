//! Prompter double that replays canned answers

use async_trait::async_trait;
use parking_lot::Mutex;

use conncred_core::{Answers, PromptError, Prompter, Question};

/// What the next prompt returns
#[derive(Debug, Clone)]
enum Script {
    Answer(Answers),
    Cancel,
    Fail(String),
}

/// Returns the same scripted response to every prompt and records the
/// questions it was asked
#[derive(Debug)]
pub struct ScriptedPrompter {
    script: Script,
    asked: Mutex<Vec<Vec<Question>>>,
}

impl ScriptedPrompter {
    /// Answer every prompt with `answers`
    pub fn answering(answers: Answers) -> Self {
        Self::with_script(Script::Answer(answers))
    }

    /// Answer every prompt with nothing
    pub fn silent() -> Self {
        Self::answering(Answers::new())
    }

    /// Behave like a user pressing Ctrl-C
    pub fn cancelling() -> Self {
        Self::with_script(Script::Cancel)
    }

    /// Fail like a terminal that can't be read
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Number of times `prompt` was called
    pub fn call_count(&self) -> usize {
        self.asked.lock().len()
    }

    /// Question names of every prompt, in call order
    pub fn asked_names(&self) -> Vec<Vec<String>> {
        self.asked
            .lock()
            .iter()
            .map(|batch| batch.iter().map(|q| q.name.clone()).collect())
            .collect()
    }

    /// Questions of the most recent prompt
    pub fn last_questions(&self) -> Option<Vec<Question>> {
        self.asked.lock().last().cloned()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, questions: &[Question]) -> Result<Answers, PromptError> {
        self.asked.lock().push(questions.to_vec());
        tracing::debug!(questions = questions.len(), "scripted prompt");

        match &self.script {
            Script::Answer(answers) => Ok(answers.clone()),
            Script::Cancel => Err(PromptError::Cancelled),
            Script::Fail(message) => Err(PromptError::Io(message.clone())),
        }
    }
}
