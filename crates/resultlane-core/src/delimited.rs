//! CSV and LAB results: one block of rows per channel, blocks separated by a
//! blank line. Rows are `TIME, END|DURATION, LABEL|VALUE|BINS..., EXTRA...`.

use std::{
    io::{BufRead, Write},
    mem,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    format::ColumnSeparator,
    model::{Frame, Marker, Point, Results, ResultsData, Shape},
    selection::Selection,
};

const PROGRESS_STRIDE: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Newline,
    /// `;` before the line break, closing a Pure Data or Max message.
    Semicolon,
}

impl LineTerminator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::Semicolon => ";\n",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub separator: ColumnSeparator,
    pub include_header: bool,
    pub use_end_time: bool,
    pub escape_labels: bool,
    pub line_terminator: LineTerminator,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: ColumnSeparator::Comma,
            include_header: false,
            use_end_time: false,
            escape_labels: true,
            line_terminator: LineTerminator::Newline,
        }
    }
}

impl CsvOptions {
    /// LAB files: tab separated, end times, no header.
    #[must_use]
    pub fn lab() -> Self {
        Self {
            separator: ColumnSeparator::Tab,
            use_end_time: true,
            ..Self::default()
        }
    }

    /// Pure Data and Max messages: space separated, durations, no header,
    /// one `;` terminated message per frame.
    #[must_use]
    pub fn messages() -> Self {
        Self {
            separator: ColumnSeparator::Space,
            line_terminator: LineTerminator::Semicolon,
            ..Self::default()
        }
    }
}

#[instrument(skip_all, fields(shape = %results.shape(), separator = ?options.separator))]
pub fn write_csv<W: Write>(
    results: &Results,
    writer: &mut W,
    options: &CsvOptions,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    let mut sheet = Sheet {
        writer,
        options,
        line: String::new(),
        written: 0,
        total: results.num_frames(),
    };
    match results.data() {
        ResultsData::Markers(channels) => {
            sheet.channels(channels, selection, control, &["LABEL".to_string()], true, |line, marker| {
                if options.escape_labels {
                    line.push_str(&escape_label(&marker.label));
                } else {
                    line.push_str(&marker.label);
                }
            })?;
        }
        ResultsData::Points(channels) => {
            sheet.channels(channels, selection, control, &["VALUE".to_string()], true, |line, point| {
                if let Some(value) = point.value {
                    line.push_str(&value.to_string());
                }
            })?;
        }
        ResultsData::Columns(channels) => {
            let separator = options.separator.as_char();
            let bins: Vec<_> = (0..results.num_bins()).map(|bin| format!("BIN{bin}")).collect();
            // Extras would read back as bins.
            sheet.channels(channels, selection, control, &bins, false, |line, column| {
                for (index, value) in column.values.iter().enumerate() {
                    if index > 0 {
                        line.push(separator);
                    }
                    line.push_str(&value.to_string());
                }
            })?;
        }
    }
    sheet.writer.flush().map_err(ResultsError::writing)?;
    control.report(1.0);
    Ok(())
}

struct Sheet<'a, W> {
    writer: &'a mut W,
    options: &'a CsvOptions,
    line: String,
    written: usize,
    total: usize,
}

impl<W: Write> Sheet<'_, W> {
    fn channels<F: Frame>(
        &mut self,
        channels: &[Vec<F>],
        selection: &Selection,
        control: &Control,
        headers: &[String],
        with_extra: bool,
        mut primary: impl FnMut(&mut String, &F),
    ) -> Result<()> {
        let separator = self.options.separator.as_char();
        for (position, (_, frames)) in selection.channels(channels).enumerate() {
            control.checkpoint()?;
            if position > 0 {
                self.writer.write_all(b"\n").map_err(ResultsError::writing)?;
            }
            if self.options.include_header {
                self.line.push_str("TIME");
                self.line.push(separator);
                self.line
                    .push_str(if self.options.use_end_time { "END" } else { "DURATION" });
                for header in headers {
                    self.line.push(separator);
                    self.line.push_str(header);
                }
                self.flush_line()?;
            }
            for frame in frames {
                control.checkpoint()?;
                let second = if self.options.use_end_time {
                    frame.end()
                } else {
                    frame.duration()
                };
                self.line
                    .push_str(&format!("{}{separator}{second}{separator}", frame.time()));
                primary(&mut self.line, frame);
                if with_extra {
                    for value in frame.extra() {
                        self.line.push_str(&format!("{separator}{value}"));
                    }
                }
                self.flush_line()?;
                self.written += 1;
                if self.written % PROGRESS_STRIDE == 0 {
                    control.report_fraction(self.written, self.total, 0.0, 1.0);
                }
            }
        }
        Ok(())
    }

    fn flush_line(&mut self) -> Result<()> {
        self.line.push_str(self.options.line_terminator.as_str());
        self.writer
            .write_all(self.line.as_bytes())
            .map_err(ResultsError::writing)?;
        self.line.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub separator: ColumnSeparator,
    pub use_end_time: bool,
    pub line_terminator: LineTerminator,
}

impl From<&CsvOptions> for CsvReadOptions {
    fn from(options: &CsvOptions) -> Self {
        Self {
            separator: options.separator,
            use_end_time: options.use_end_time,
            line_terminator: options.line_terminator,
        }
    }
}

#[derive(Debug)]
enum Cell {
    Label(String),
    Value(f32),
    Empty,
}

#[derive(Debug)]
struct Row {
    time: f64,
    duration: f64,
    cell: Cell,
    extra: Vec<f32>,
}

/// Reads delimited results. The shape is taken from the first row whose third
/// field decides it: quoted or non-numeric text makes markers, a number makes
/// points. Rows of the other shape are then rejected.
#[instrument(skip_all, fields(separator = ?options.separator, use_end_time = options.use_end_time))]
pub fn read_csv<R: BufRead>(
    reader: R,
    options: CsvReadOptions,
    len_hint: Option<u64>,
    control: &Control,
) -> Result<Results> {
    let separator = options.separator.as_char();
    let mut channels: Vec<Vec<Row>> = Vec::new();
    let mut current = Vec::new();
    let mut shape = None;
    let mut consumed = 0_u64;

    for (index, line) in reader.lines().enumerate() {
        control.checkpoint()?;
        let number = index + 1;
        let line =
            line.map_err(|error| ResultsError::parsing(format!("line {number}: {error}")))?;
        consumed += line.len() as u64 + 1;
        if index % PROGRESS_STRIDE == 0 {
            if let Some(len) = len_hint.filter(|len| *len > 0) {
                #[allow(clippy::cast_precision_loss)]
                control.report((consumed as f64 / len as f64) as f32);
            }
        }

        let mut line = line.strip_suffix('\r').unwrap_or(&line);
        if options.line_terminator == LineTerminator::Semicolon {
            line = line.trim_end();
            line = line.strip_suffix(';').unwrap_or(line);
        }
        if line.trim().is_empty() {
            channels.push(mem::take(&mut current));
            continue;
        }

        let fields = split_fields(line, separator)
            .map_err(|reason| ResultsError::parsing(format!("line {number}: {reason}")))?;
        let Some(time) = fields.first().and_then(|field| field.number::<f64>()) else {
            if current.is_empty() {
                continue;
            }
            return Err(ResultsError::parsing(format!(
                "line {number}: the time is not a number"
            )));
        };
        let second = fields
            .get(1)
            .and_then(|field| field.number::<f64>())
            .ok_or_else(|| {
                ResultsError::parsing(format!("line {number}: the duration is not a number"))
            })?;
        if !time.is_finite() || !second.is_finite() {
            return Err(ResultsError::parsing(format!(
                "line {number}: numeric overflow"
            )));
        }
        let duration = if options.use_end_time {
            (second - time).max(0.0)
        } else {
            second
        };

        let cell = match fields.get(2) {
            None => Cell::Empty,
            Some(field) if !field.quoted && field.text.is_empty() => Cell::Empty,
            Some(field) => match field.number::<f32>() {
                Some(value) if !field.quoted => Cell::Value(value),
                _ => Cell::Label(field.text.clone()),
            },
        };
        let row_shape = match cell {
            Cell::Label(_) => Some(Shape::Marker),
            Cell::Value(_) => Some(Shape::Point),
            Cell::Empty => None,
        };
        if let Some(row_shape) = row_shape {
            match shape {
                None => shape = Some(row_shape),
                Some(established) if established != row_shape => {
                    return Err(ResultsError::parsing(format!(
                        "line {number}: {row_shape} cannot be mixed with {established}"
                    )));
                }
                Some(_) => {}
            }
        }

        let extra = fields
            .iter()
            .skip(3)
            .map(|field| field.number::<f32>())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ResultsError::parsing(format!("line {number}: extra values must be numbers"))
            })?;

        current.push(Row {
            time,
            duration,
            cell,
            extra,
        });
    }
    channels.push(current);

    let results = if shape == Some(Shape::Point) {
        Results::points(
            channels
                .into_iter()
                .map(|rows| {
                    rows.into_iter()
                        .map(|row| Point {
                            time: row.time,
                            duration: row.duration,
                            value: match row.cell {
                                Cell::Value(value) => Some(value),
                                Cell::Label(_) | Cell::Empty => None,
                            },
                            extra: row.extra,
                        })
                        .collect()
                })
                .collect(),
        )
    } else {
        Results::markers(
            channels
                .into_iter()
                .map(|rows| {
                    rows.into_iter()
                        .map(|row| Marker {
                            time: row.time,
                            duration: row.duration,
                            label: match row.cell {
                                Cell::Label(label) => label,
                                Cell::Value(value) => value.to_string(),
                                Cell::Empty => String::new(),
                            },
                            extra: row.extra,
                        })
                        .collect()
                })
                .collect(),
        )
    };
    control.report(1.0);
    debug!(
        shape = %results.shape(),
        channels = results.num_channels(),
        frames = results.num_frames(),
        "delimited results parsed"
    );
    Ok(results)
}

#[derive(Debug, PartialEq)]
struct Field {
    text: String,
    quoted: bool,
}

impl Field {
    fn number<T: std::str::FromStr>(&self) -> Option<T> {
        if self.quoted {
            return None;
        }
        self.text.trim().parse().ok()
    }
}

/// Wraps a label in double quotes, escaping quotes, backslashes, tabs and line
/// breaks so it stays on one line and inside one field.
#[must_use]
pub fn escape_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len() + 2);
    escaped.push('"');
    for character in label.chars() {
        match character {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped.push('"');
    escaped
}

fn split_fields(line: &str, separator: char) -> std::result::Result<Vec<Field>, String> {
    let mut fields = Vec::new();
    let mut characters = line.chars().peekable();
    loop {
        if characters.peek() == Some(&'"') {
            characters.next();
            let mut text = String::new();
            loop {
                match characters.next() {
                    None => return Err("unterminated quoted field".to_string()),
                    Some('"') => break,
                    Some('\\') => match characters.next() {
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some('n') => text.push('\n'),
                        Some(other) => text.push(other),
                        None => return Err("unterminated escape sequence".to_string()),
                    },
                    Some(other) => text.push(other),
                }
            }
            fields.push(Field { text, quoted: true });
            match characters.next() {
                None => return Ok(fields),
                Some(next) if next == separator => {}
                Some(next) => return Err(format!("unexpected '{next}' after a quoted field")),
            }
        } else {
            let mut text = String::new();
            let mut ended = true;
            for character in characters.by_ref() {
                if character == separator {
                    ended = false;
                    break;
                }
                text.push(character);
            }
            fields.push(Field {
                text,
                quoted: false,
            });
            if ended {
                return Ok(fields);
            }
        }
    }
}
