pub mod answer_reader;
pub mod history_writer;
