use std::io::Write;

use polars::prelude::DataFrame;

use crate::error::SinkError;
use crate::render::render_values;

/// Writes a frame as CSV: header row, no index column, `\n` line endings, quoting only
/// where a field needs it, nulls as empty fields.
pub fn write_csv<W: Write>(frame: &DataFrame, writer: W) -> Result<(), SinkError> {
    let mut out = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    out.write_record(frame.get_column_names().iter().map(|name| name.as_str()))?;

    let rendered = frame
        .get_columns()
        .iter()
        .map(|column| render_values(column.as_materialized_series()))
        .collect::<Result<Vec<_>, _>>()?;

    for row in 0..frame.height() {
        out.write_record(
            rendered
                .iter()
                .map(|values| values[row].as_deref().unwrap_or("")),
        )?;
    }

    out.flush()?;
    Ok(())
}
