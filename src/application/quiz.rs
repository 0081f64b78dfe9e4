use crate::domain::attempt::{Answer, AttemptId, HistoryItem, Question, QuizResult};
use crate::domain::ports::QuizBackendRef;
use crate::domain::session::{AuthEvent, User};
use crate::domain::storage::{CURRENT_ANSWERS, CURRENT_QUESTION_INDEX, Storage};
use crate::error::{ClientError, Result};
use tracing::{debug, info};

/// One user's quiz progress plus the last result they looked at.
///
/// The cached result lives here rather than in a global so that it disappears
/// with the session: feed auth events to [`QuizSession::observe`].
pub struct QuizSession {
    backend: QuizBackendRef,
    storage: Storage,
    last_result: Option<QuizResult>,
}

impl QuizSession {
    pub fn new(backend: QuizBackendRef, storage: Storage) -> Self {
        Self {
            backend,
            storage,
            last_result: None,
        }
    }

    pub async fn questions(&self) -> Result<Vec<Question>> {
        self.backend.questions().await
    }

    pub async fn answers(&self) -> Result<Vec<Answer>> {
        Ok(self.storage.get(CURRENT_ANSWERS).await?.unwrap_or_default())
    }

    pub async fn current_index(&self) -> Result<usize> {
        Ok(self
            .storage
            .get(CURRENT_QUESTION_INDEX)
            .await?
            .unwrap_or_default())
    }

    /// Free users get a single quiz: once history exists only premium users
    /// may start another one.
    pub async fn can_start_quiz(&self, user: &User) -> Result<bool> {
        if user.is_premium {
            return Ok(true);
        }
        Ok(self.history().await?.is_empty())
    }

    pub async fn ensure_can_start(&self, user: &User) -> Result<()> {
        if self.can_start_quiz(user).await? {
            Ok(())
        } else {
            info!(user = %user.id, "Free quiz limit reached");
            Err(ClientError::FreeQuizLimitReached)
        }
    }

    /// Stores an answer, replacing any earlier answer to the same question.
    ///
    /// The stored question index moves to the question after the answered one
    /// in `questions`. Returns that index, or `None` once the last question has
    /// been answered.
    pub async fn record_answer(
        &self,
        questions: &[Question],
        answer: Answer,
    ) -> Result<Option<usize>> {
        let position = questions
            .iter()
            .position(|q| q.id == answer.question_id)
            .ok_or_else(|| {
                ClientError::ValidationError(format!("Unknown question {}", answer.question_id))
            })?;

        let mut answers = self.answers().await?;
        match answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => existing.value = answer.value,
            None => answers.push(answer),
        }
        self.storage.set(CURRENT_ANSWERS, &answers).await?;

        let next = position + 1;
        if next < questions.len() {
            self.storage.set(CURRENT_QUESTION_INDEX, &next).await?;
            debug!(question = answer.question_id, next, "Answer recorded");
            Ok(Some(next))
        } else {
            self.storage.set(CURRENT_QUESTION_INDEX, &position).await?;
            debug!(question = answer.question_id, "Last question answered");
            Ok(None)
        }
    }

    pub async fn reset_answers(&self) -> Result<()> {
        self.storage.remove(CURRENT_ANSWERS).await?;
        self.storage.remove(CURRENT_QUESTION_INDEX).await
    }

    /// Submits the locally stored answers.
    pub async fn submit(&mut self) -> Result<QuizResult> {
        let answers = self.answers().await?;
        self.submit_answers(&answers).await
    }

    /// Submits answers and, once the backend has stored them, drops local progress.
    pub async fn submit_answers(&mut self, answers: &[Answer]) -> Result<QuizResult> {
        if answers.is_empty() {
            return Err(ClientError::ValidationError(
                "No answers to submit".to_string(),
            ));
        }

        let result = self.backend.submit(answers).await?;
        info!(attempt = ?result.id, answers = answers.len(), "Quiz submitted");
        self.reset_answers().await?;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    pub async fn result(&mut self, attempt: &AttemptId) -> Result<QuizResult> {
        let result = self.backend.result(attempt).await?;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    pub async fn history(&self) -> Result<Vec<HistoryItem>> {
        self.backend.history().await
    }

    pub fn last_result(&self) -> Option<&QuizResult> {
        self.last_result.as_ref()
    }

    pub fn remember(&mut self, result: QuizResult) {
        self.last_result = Some(result);
    }

    pub fn invalidate(&mut self) {
        self.last_result = None;
    }

    pub fn observe(&mut self, event: &AuthEvent) {
        if matches!(event, AuthEvent::SignedOut | AuthEvent::SessionExpired) {
            self.invalidate();
        }
    }
}
