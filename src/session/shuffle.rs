//! Per-participant randomization of question and option order.
//!
//! Runs exactly once, at session materialization. The input contest data is
//! never mutated, so re-fetching or retrying cannot compound shuffles.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{Question, ShuffledQuestion};

/// Produce this participant's question order: a uniform permutation of the
/// contest's questions, each with its options independently permuted.
pub fn shuffle_questions(questions: &[Question]) -> Vec<ShuffledQuestion> {
    let mut rng = rand::rng();
    let mut shuffled: Vec<ShuffledQuestion> = questions
        .iter()
        .map(|q| shuffle_options(q, &mut rng))
        .collect();
    shuffled.shuffle(&mut rng);
    shuffled
}

/// Permute one question's options and re-derive the correct-answer set by
/// value lookup against the new order.
fn shuffle_options(question: &Question, rng: &mut impl Rng) -> ShuffledQuestion {
    let mut options = question.options.clone();
    options.shuffle(rng);

    // Membership by value, not by original index.
    let correct_answers: Vec<String> = options
        .iter()
        .filter(|o| question.correct_answers.contains(o))
        .cloned()
        .collect();

    ShuffledQuestion {
        id: question.id.clone(),
        prompt: question.prompt.clone(),
        options,
        correct_answers,
        explanation: question.explanation.clone(),
        difficulty: question.difficulty.clone(),
    }
}
