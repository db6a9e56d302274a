use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::symbol::AnswerKey;

/// Count answered cells whose digit matches the key. Unanswered cells are
/// neither right nor wrong.
pub fn score<'a, I>(cells: I, key: &AnswerKey) -> u32
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells
        .into_iter()
        .filter(|cell| matches!(cell.answer, Some(answer) if key.is_correct(cell.symbol, answer)))
        .count() as u32
}

/// Final record of one completed run, handed to the result sink
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: String,
    pub date: NaiveDate,
    pub score: u32,
    pub time_spent_secs: u32,
    pub answers: Vec<Cell>,
}

/// Acknowledgement from the result sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub success: bool,
    pub id: i64,
}
