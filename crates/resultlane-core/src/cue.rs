use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use tracing::{debug, instrument, warn};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    model::{Marker, Results, ResultsData},
    selection::Selection,
};

pub const FRAMES_PER_SECOND: f64 = 75.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueOptions {
    pub title: String,
    pub file: Option<PathBuf>,
}

/// `mm:ss:ff` with 75 frames per second, every field clamped to two digits.
#[must_use]
pub fn format_timestamp(time: f64) -> String {
    let time = time.max(0.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |value: f64| value.floor().clamp(0.0, 99.0) as u8;
    let minutes = clamp(time / 60.0);
    let seconds = clamp(time % 60.0);
    let frames = clamp(time.fract() * FRAMES_PER_SECOND);
    format!("{minutes:02}:{seconds:02}:{frames:02}")
}

fn parse_timestamp(text: &str) -> Option<f64> {
    let mut fields = text.split(':').map(|field| field.trim().parse::<u32>().ok());
    let (Some(Some(minutes)), Some(Some(seconds)), Some(Some(frames)), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return None;
    };
    Some(f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(frames) / FRAMES_PER_SECOND)
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "'").replace(['\r', '\n'], " "))
}

/// Writes marker results as a CUE sheet, one `TRACK` per marker. Tracks are
/// numbered consecutively across the selected channels.
#[instrument(skip_all, fields(shape = %results.shape(), title = %options.title))]
pub fn write_cue<W: Write>(
    results: &Results,
    writer: &mut W,
    options: &CueOptions,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    let ResultsData::Markers(channels) = results.data() else {
        return Err(ResultsError::unsupported(format!(
            "CUE sheets can only hold markers, not {}",
            results.shape()
        )));
    };
    let mut sheet = format!("TITLE {}\n", quoted(&options.title));
    if let Some(file) = &options.file {
        sheet.push_str(&format!("FILE {} WAVE\n", quoted(&file.to_string_lossy())));
    }
    let mut number = 0_usize;
    for (_, frames) in selection.channels(channels) {
        control.checkpoint()?;
        for marker in frames {
            control.checkpoint()?;
            number += 1;
            if number > 99 {
                warn!(number, "CUE sheet has more than 99 tracks");
            }
            sheet.push_str(&format!(
                "  TRACK {number:02} AUDIO\n    TITLE {}\n    INDEX 01 {}\n",
                quoted(&marker.label),
                format_timestamp(marker.time)
            ));
        }
    }
    writer
        .write_all(sheet.as_bytes())
        .map_err(ResultsError::writing)?;
    writer.flush().map_err(ResultsError::writing)?;
    control.report(1.0);
    Ok(())
}

/// Reads the tracks of a CUE sheet back as a single channel of markers.
#[instrument(skip_all)]
pub fn read_cue<R: BufRead>(reader: R, control: &Control) -> Result<Results> {
    let mut markers = Vec::new();
    let mut current: Option<(String, Option<f64>)> = None;
    let finish = |track: Option<(String, Option<f64>)>, markers: &mut Vec<Marker>| {
        if let Some((label, time)) = track {
            match time {
                Some(time) => markers.push(Marker::new(time, 0.0, label)),
                None => warn!(label = %label, "CUE track without INDEX 01 skipped"),
            }
        }
    };

    for (index, line) in reader.lines().enumerate() {
        control.checkpoint()?;
        let number = index + 1;
        let line =
            line.map_err(|error| ResultsError::parsing(format!("line {number}: {error}")))?;
        let line = line.trim();
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "TRACK" => {
                finish(current.take(), &mut markers);
                current = Some((String::new(), None));
            }
            "TITLE" => {
                if let Some((label, _)) = current.as_mut() {
                    *label = rest.trim_matches('"').to_string();
                }
            }
            "INDEX" => {
                let Some((label, time)) = current.as_mut() else {
                    return Err(ResultsError::parsing(format!(
                        "line {number}: INDEX outside of a TRACK"
                    )));
                };
                let (index_number, timestamp) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if index_number != "01" {
                    continue;
                }
                let parsed = parse_timestamp(timestamp).ok_or_else(|| {
                    ResultsError::parsing(format!(
                        "line {number}: invalid CUE timestamp {timestamp:?} for {label:?}"
                    ))
                })?;
                *time = Some(parsed);
            }
            _ => {}
        }
    }
    finish(current.take(), &mut markers);
    debug!(markers = markers.len(), "CUE sheet parsed");
    control.report(1.0);
    Ok(Results::markers(vec![markers]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Point};

    #[test]
    fn timestamps_use_seventy_five_frames_and_clamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(61.5), "01:01:37");
        assert_eq!(format_timestamp(-3.0), "00:00:00");
        assert_eq!(format_timestamp(10_000.0), "99:40:00");
    }

    #[test]
    fn sheet_lists_markers_and_reads_back() {
        let results = Results::markers(vec![
            vec![Marker::new(0.0, 0.0, "Intro"), Marker::new(61.5, 0.0, "Verse \"1\"")],
            vec![Marker::new(90.0, 0.0, "Chorus")],
        ]);
        let options = CueOptions {
            title: "Song".to_string(),
            file: Some(PathBuf::from("song.wav")),
        };
        let mut bytes = Vec::new();
        write_cue(&results, &mut bytes, &options, &Selection::all(), &Control::default())
            .expect("markers can be written");
        let text = String::from_utf8(bytes).expect("utf-8");
        assert!(text.starts_with("TITLE \"Song\"\nFILE \"song.wav\" WAVE\n"));
        assert!(text.contains("  TRACK 02 AUDIO\n    TITLE \"Verse '1'\"\n    INDEX 01 01:01:37\n"));
        assert!(text.contains("  TRACK 03 AUDIO\n"));

        let restored = read_cue(text.as_bytes(), &Control::default()).expect("valid sheet");
        let markers = &restored.get_markers().expect("markers")[0];
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[2].label, "Chorus");
        assert!((markers[1].time - (61.0 + 37.0 / 75.0)).abs() < 1e-9);
    }

    #[test]
    fn points_and_columns_are_unsupported() {
        for results in [
            Results::points(vec![vec![Point::new(0.0, 0.0, Some(1.0))]]),
            Results::columns(vec![vec![Column::new(0.0, 0.0, vec![1.0, 2.0])]]),
        ] {
            let mut bytes = Vec::new();
            let error = write_cue(
                &results,
                &mut bytes,
                &CueOptions::default(),
                &Selection::all(),
                &Control::default(),
            )
            .expect_err("only markers fit a CUE sheet");
            assert!(matches!(error, ResultsError::FormatUnsupported(_)));
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn invalid_index_is_a_parsing_error() {
        let sheet = "TRACK 01 AUDIO\nINDEX 01 aa:00:00\n";
        assert!(matches!(
            read_cue(sheet.as_bytes(), &Control::default()),
            Err(ResultsError::ParsingError(_))
        ));
    }
}
