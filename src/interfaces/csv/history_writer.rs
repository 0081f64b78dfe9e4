use crate::domain::attempt::HistoryItem;
use crate::error::Result;
use std::io::Write;

/// Writes quiz history as CSV: `id,date,type,paid`.
pub struct HistoryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> HistoryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_history(&mut self, items: &[HistoryItem]) -> Result<()> {
        self.writer.write_record(["id", "date", "type", "paid"])?;
        for item in items {
            self.writer.write_record([
                item.id.as_str(),
                item.date.as_str(),
                item.result_type_name.as_str(),
                if item.is_paid { "true" } else { "false" },
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
