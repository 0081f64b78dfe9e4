use crate::domain::attempt::Answer;
use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AnswerRecord {
    question_id: u32,
    value: i32,
}

/// Reads quiz answers from a CSV source with a `question_id,value` header.
///
/// Whitespace around fields is trimmed, so hand-edited files work as-is.
pub struct AnswerReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AnswerReader<R> {
    /// Creates a new `AnswerReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes answers.
    pub fn answers(self) -> impl Iterator<Item = Result<Answer>> {
        self.reader.into_deserialize().map(|result| {
            result
                .map(|record: AnswerRecord| Answer {
                    question_id: record.question_id,
                    value: record.value,
                })
                .map_err(ClientError::from)
        })
    }
}
