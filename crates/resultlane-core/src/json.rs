//! JSON results: `{"track": {...}, "results": [[frame, ...], ...]}`.
//!
//! Older files hold the bare channel array without the enclosing document.

use std::io::{Read, Write};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    model::{Column, Frame, Marker, Point, Results, ResultsData, Shape},
    selection::Selection,
};

#[instrument(skip_all, fields(shape = %results.shape(), with_track = track.is_some()))]
pub fn write_json<W: Write>(
    results: &Results,
    writer: &mut W,
    track: Option<&Value>,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    writer.write_all(b"{").map_err(ResultsError::writing)?;
    if let Some(track) = track {
        writer.write_all(b"\"track\":").map_err(ResultsError::writing)?;
        serde_json::to_writer(&mut *writer, track)?;
        writer.write_all(b",").map_err(ResultsError::writing)?;
    }
    writer.write_all(b"\"results\":[").map_err(ResultsError::writing)?;
    let total = results.num_frames();
    match results.data() {
        ResultsData::Markers(channels) => {
            write_channels(writer, channels, selection, control, total)?;
        }
        ResultsData::Points(channels) => {
            write_channels(writer, channels, selection, control, total)?;
        }
        ResultsData::Columns(channels) => {
            write_channels(writer, channels, selection, control, total)?;
        }
    }
    writer.write_all(b"]}").map_err(ResultsError::writing)?;
    writer.flush().map_err(ResultsError::writing)?;
    control.report(1.0);
    Ok(())
}

fn write_channels<W: Write, F: Frame + Serialize>(
    writer: &mut W,
    channels: &[Vec<F>],
    selection: &Selection,
    control: &Control,
    total: usize,
) -> Result<()> {
    let mut written = 0;
    for (position, (_, frames)) in selection.channels(channels).enumerate() {
        control.checkpoint()?;
        writer
            .write_all(if position == 0 { b"[" } else { b",[" })
            .map_err(ResultsError::writing)?;
        for (index, frame) in frames.into_iter().enumerate() {
            control.checkpoint()?;
            if index > 0 {
                writer.write_all(b",").map_err(ResultsError::writing)?;
            }
            serde_json::to_writer(&mut *writer, frame)?;
            written += 1;
            if written % 256 == 0 {
                control.report_fraction(written, total, 0.0, 1.0);
            }
        }
        writer.write_all(b"]").map_err(ResultsError::writing)?;
    }
    Ok(())
}

/// JSON cannot hold NaN; serializers write `null` in its place.
fn lenient_floats<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
    let values = Vec::<Option<f32>>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| value.unwrap_or(f32::NAN))
        .collect())
}

fn optional_lenient_floats<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<f32>>, D::Error> {
    lenient_floats(deserializer).map(Some)
}

/// Tells an explicit `"value": null` apart from a missing key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Option<f32>>, D::Error> {
    Option::<f32>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct JsonFrame {
    time: f64,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, deserialize_with = "present")]
    value: Option<Option<f32>>,
    #[serde(default, deserialize_with = "optional_lenient_floats")]
    values: Option<Vec<f32>>,
    #[serde(default, deserialize_with = "lenient_floats")]
    extra: Vec<f32>,
}

impl JsonFrame {
    fn shape(&self) -> Option<Shape> {
        if self.values.is_some() {
            Some(Shape::Column)
        } else if self.value.is_some() {
            Some(Shape::Point)
        } else if self.label.is_some() {
            Some(Shape::Marker)
        } else {
            None
        }
    }

    fn duration(&self) -> f64 {
        self.duration.unwrap_or(0.0).max(0.0)
    }
}

/// Parses a JSON results document. Returns the results and the embedded track
/// description, if any.
#[instrument(skip_all)]
pub fn read_json<R: Read>(reader: R, control: &Control) -> Result<(Results, Option<Value>)> {
    control.checkpoint()?;
    let root: Value = serde_json::from_reader(reader)
        .map_err(|error| ResultsError::parsing(error.to_string()))?;
    control.report(0.2);

    let (track, channels) = match root {
        Value::Object(mut document) => {
            let track = document.remove("track").filter(|track| !track.is_null());
            let channels = match document.remove("results") {
                Some(Value::Array(channels)) => channels,
                Some(_) => return Err(ResultsError::parsing("results must be an array")),
                None => return Err(ResultsError::parsing("the results are missing")),
            };
            (track, channels)
        }
        Value::Array(channels) => (None, channels),
        _ => {
            return Err(ResultsError::parsing(
                "expected a results document or an array of channels",
            ));
        }
    };

    let total: usize = channels
        .iter()
        .map(|channel| channel.as_array().map_or(0, Vec::len))
        .sum();
    let mut parsed = Vec::with_capacity(channels.len());
    let mut shape = None;
    let mut done = 0;
    for (channel_index, channel) in channels.into_iter().enumerate() {
        let Value::Array(frames) = channel else {
            return Err(ResultsError::parsing(format!(
                "channel {channel_index} must be an array of frames"
            )));
        };
        let mut channel_frames = Vec::with_capacity(frames.len());
        for (frame_index, frame) in frames.into_iter().enumerate() {
            control.checkpoint()?;
            let frame = JsonFrame::deserialize(frame).map_err(|error| {
                ResultsError::parsing(format!(
                    "channel {channel_index}, frame {frame_index}: {error}"
                ))
            })?;
            if let Some(frame_shape) = frame.shape() {
                match shape {
                    None => shape = Some(frame_shape),
                    Some(established) if established != frame_shape => {
                        return Err(ResultsError::parsing(format!(
                            "channel {channel_index}, frame {frame_index}: {frame_shape} cannot be mixed with {established}"
                        )));
                    }
                    Some(_) => {}
                }
            }
            channel_frames.push(frame);
            done += 1;
            if done % 256 == 0 {
                control.report_fraction(done, total, 0.2, 0.9);
            }
        }
        parsed.push(channel_frames);
    }

    let results = match shape.unwrap_or(Shape::Marker) {
        Shape::Marker => Results::markers(convert(parsed, |frame| Marker {
            time: frame.time,
            duration: frame.duration(),
            label: frame.label.unwrap_or_default(),
            extra: frame.extra,
        })),
        Shape::Point => Results::points(convert(parsed, |frame| Point {
            time: frame.time,
            duration: frame.duration(),
            value: frame.value.flatten(),
            extra: frame.extra,
        })),
        Shape::Column => Results::columns(convert(parsed, |frame| Column {
            time: frame.time,
            duration: frame.duration(),
            values: frame.values.unwrap_or_default(),
            extra: frame.extra,
        })),
    };
    control.report(1.0);
    debug!(
        shape = %results.shape(),
        channels = results.num_channels(),
        frames = results.num_frames(),
        "json results parsed"
    );
    Ok((results, track))
}

fn convert<F>(channels: Vec<Vec<JsonFrame>>, frame: impl Fn(JsonFrame) -> F) -> Vec<Vec<F>> {
    channels
        .into_iter()
        .map(|channel| channel.into_iter().map(&frame).collect())
        .collect()
}
