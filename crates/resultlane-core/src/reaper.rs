//! Reaper marker and region lists: `#,Name,Start,End,Length`.

use std::io::{BufRead, Write};

use tracing::{debug, instrument};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    format::ReaperType,
    model::{Marker, Results, ResultsData},
    selection::Selection,
};

pub const HEADER: &str = "#,Name,Start,End,Length";

fn quoted(label: &str) -> String {
    format!("\"{}\"", label.replace('"', "\"\"").replace(['\r', '\n'], " "))
}

#[instrument(skip_all, fields(shape = %results.shape(), reaper_type = ?reaper_type))]
pub fn write_reaper<W: Write>(
    results: &Results,
    writer: &mut W,
    reaper_type: ReaperType,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    let ResultsData::Markers(channels) = results.data() else {
        return Err(ResultsError::unsupported(format!(
            "Reaper {} lists can only hold markers, not {}",
            match reaper_type {
                ReaperType::Marker => "marker",
                ReaperType::Region => "region",
            },
            results.shape()
        )));
    };
    let mut text = String::from(HEADER);
    text.push('\n');
    let mut number = 0_usize;
    for (_, frames) in selection.channels(channels) {
        control.checkpoint()?;
        for marker in frames {
            control.checkpoint()?;
            number += 1;
            let label = quoted(&marker.label);
            text.push_str(&match reaper_type {
                ReaperType::Marker => format!("M{number},{label},{},,\n", marker.time),
                ReaperType::Region => format!(
                    "R{number},{label},{},{},{}\n",
                    marker.time,
                    marker.time + marker.duration,
                    marker.duration
                ),
            });
        }
    }
    writer
        .write_all(text.as_bytes())
        .map_err(ResultsError::writing)?;
    writer.flush().map_err(ResultsError::writing)?;
    control.report(1.0);
    Ok(())
}

/// Reads a Reaper list back as one channel of markers; region lengths become
/// marker durations.
#[instrument(skip_all)]
pub fn read_reaper<R: BufRead>(reader: R, control: &Control) -> Result<Results> {
    let mut markers = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        control.checkpoint()?;
        let number = index + 1;
        let line =
            line.map_err(|error| ResultsError::parsing(format!("line {number}: {error}")))?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_row(line)
            .ok_or_else(|| ResultsError::parsing(format!("line {number}: unterminated quote")))?;
        let number_field = |position: usize| -> Result<Option<f64>> {
            match fields.get(position).map(|field| field.trim()) {
                None | Some("") => Ok(None),
                Some(text) => text.parse().map(Some).map_err(|_| {
                    ResultsError::parsing(format!("line {number}: {text:?} is not a time"))
                }),
            }
        };
        let start = number_field(2)?
            .ok_or_else(|| ResultsError::parsing(format!("line {number}: missing start")))?;
        let duration = match (number_field(4)?, number_field(3)?) {
            (Some(length), _) => length,
            (None, Some(end)) => end - start,
            (None, None) => 0.0,
        };
        let label = fields.get(1).cloned().unwrap_or_default();
        markers.push(Marker::new(start, duration.max(0.0), label));
    }
    debug!(markers = markers.len(), "Reaper list parsed");
    control.report(1.0);
    Ok(Results::markers(vec![markers]))
}

fn split_row(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut characters = line.chars().peekable();
    while let Some(character) = characters.next() {
        match character {
            '"' if in_quotes && characters.peek() == Some(&'"') => {
                characters.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            other => field.push(other),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}
