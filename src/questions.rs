use std::sync::Arc;

use crate::types::Question;

/// Read-only, ordered question bank shared by every session.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Arc<[Question]>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: questions.into(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
