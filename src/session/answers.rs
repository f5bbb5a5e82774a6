//! Answer state operations.
//!
//! Every mutation is mirrored to the local snapshot store so an unintended
//! reload can restore the participant's position. The store goes read-only
//! once the session closes; post-commit the persisted copy is gone entirely.

use crate::types::AnswerRecord;

use super::Session;

impl Session {
    /// Record a selection for a question. Re-selecting the identical value
    /// is a no-op; changing a previously-set answer is allowed until
    /// submission. An empty selection clears the answer.
    pub async fn set_answer(&self, question_id: &str, selection: &str) -> Result<(), String> {
        if self.is_closed().await {
            return Err("Session is closed".to_string());
        }

        let index = self
            .index_of(question_id)
            .ok_or_else(|| format!("Question {} not in this session", question_id))?;

        if !selection.is_empty() && !self.questions[index].options.contains(&selection.to_string())
        {
            return Err(format!("Not an option of question {}", question_id));
        }

        {
            let mut sheet = self.answers.write().await;
            let record = &mut sheet.records[index];
            if record.selected == selection {
                return Ok(());
            }
            record.selected = selection.to_string();
            record.visited = true;
        }

        self.persist().await;
        Ok(())
    }

    /// Mark a question as visited and make it the current position.
    pub async fn mark_visited(&self, index: usize) -> Result<(), String> {
        if self.is_closed().await {
            return Err("Session is closed".to_string());
        }

        {
            let mut sheet = self.answers.write().await;
            if index >= sheet.records.len() {
                return Err(format!("Question index {} out of range", index));
            }
            if sheet.records[index].visited && sheet.current_index == index {
                return Ok(());
            }
            sheet.records[index].visited = true;
            sheet.current_index = index;
        }

        self.persist().await;
        Ok(())
    }

    pub async fn toggle_review(&self, index: usize) -> Result<(), String> {
        if self.is_closed().await {
            return Err("Session is closed".to_string());
        }

        {
            let mut sheet = self.answers.write().await;
            if index >= sheet.records.len() {
                return Err(format!("Question index {} out of range", index));
            }
            let record = &mut sheet.records[index];
            record.marked_for_review = !record.marked_for_review;
        }

        self.persist().await;
        Ok(())
    }

    /// Full per-question status, used by the navigation palette and as the
    /// basis of the submission payload.
    pub async fn snapshot(&self) -> (Vec<AnswerRecord>, usize) {
        let sheet = self.answers.read().await;
        (sheet.records.clone(), sheet.current_index)
    }
}
