//! Bridge to an external SDIF codec.
//!
//! The codec itself sits behind [`SdifConverter`]; this module picks the
//! frame/matrix pair to read or write and adapts raw matrices to results.
//! Each SDIF stream id is one channel.

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    model::{Column, Frame, Marker, Point, Results, ResultsData, Shape},
    selection::Selection,
};

/// Four ASCII characters naming an SDIF frame or matrix type. `?` matches any
/// character when selecting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Signature([u8; 4]);

impl Signature {
    pub const ANY: Self = Self(*b"????");

    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.contains(&b'?')
    }

    #[must_use]
    pub fn matches(&self, other: Self) -> bool {
        self.0
            .iter()
            .zip(other.0)
            .all(|(expected, actual)| *expected == b'?' || *expected == actual)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::ANY
    }
}

impl FromStr for Signature {
    type Err = ResultsError;

    fn from_str(text: &str) -> Result<Self> {
        let bytes: [u8; 4] = text
            .as_bytes()
            .try_into()
            .map_err(|_| ResultsError::invalid(format!("{text:?} is not a 4-character signature")))?;
        if !bytes.iter().all(u8::is_ascii_graphic) {
            return Err(ResultsError::invalid(format!(
                "{text:?} is not a printable ASCII signature"
            )));
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Signature {
    type Error = ResultsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Signature({})", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixData {
    /// One string per row.
    Text(Vec<String>),
    /// Row-major values.
    Numeric {
        rows: usize,
        columns: usize,
        values: Vec<f64>,
    },
}

impl MatrixData {
    fn value(&self, row: usize, column: usize) -> Option<f64> {
        match self {
            Self::Numeric {
                rows,
                columns,
                values,
            } if row < *rows && column < *columns => values.get(row * columns + column).copied(),
            _ => None,
        }
    }
}

/// One matrix of one SDIF frame. `data` is `None` for a frame without matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixFrame {
    pub frame: Signature,
    pub matrix: Signature,
    pub stream: u32,
    pub time: f64,
    pub data: Option<MatrixData>,
}

/// External SDIF codec.
pub trait SdifConverter: Send + Sync {
    /// Calls `visit` for every matrix whose frame and matrix signatures pass
    /// `select`, in file order. An error from `visit` stops the read and is
    /// returned as is.
    fn read(
        &self,
        path: &Path,
        select: &dyn Fn(Signature, Signature) -> bool,
        visit: &mut dyn FnMut(MatrixFrame) -> Result<()>,
    ) -> Result<()>;

    /// Writes `frames` to `path`, declaring the matrix type with
    /// `column_name` when it is not predefined. An error yielded by `frames`
    /// stops the write and is returned as is.
    fn write(
        &self,
        path: &Path,
        frame: Signature,
        matrix: Signature,
        column_name: &str,
        frames: &mut dyn Iterator<Item = Result<MatrixFrame>>,
    ) -> Result<()>;
}

/// Which frame/matrix pair to read or write, and which row or column to keep
/// from a two-dimensional matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdifSelection {
    pub frame: Signature,
    pub matrix: Signature,
    pub row: Option<usize>,
    pub column: Option<usize>,
    pub column_name: Option<String>,
}

impl SdifSelection {
    #[must_use]
    pub fn new(frame: Signature, matrix: Signature) -> Self {
        Self {
            frame,
            matrix,
            ..Self::default()
        }
    }

    fn selects(&self, frame: Signature, matrix: Signature) -> bool {
        self.frame.matches(frame) && self.matrix.matches(matrix)
    }
}

#[derive(Debug)]
enum Adapted {
    Label(String),
    Value(f32),
    Values(Vec<f32>),
    Empty,
}

impl Adapted {
    fn shape(&self) -> Option<Shape> {
        match self {
            Self::Label(_) => Some(Shape::Marker),
            Self::Value(_) => Some(Shape::Point),
            Self::Values(_) => Some(Shape::Column),
            Self::Empty => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(value: f64) -> f32 {
    value as f32
}

/// Text rows become labels. A numeric cell (the only one, or the selected
/// row and column) becomes a value. A row or a column of a larger matrix
/// becomes the values of a column.
fn adapt(data: Option<&MatrixData>, row: Option<usize>, column: Option<usize>) -> Result<Adapted> {
    let Some(data) = data else {
        return Ok(Adapted::Empty);
    };
    match data {
        MatrixData::Text(labels) => {
            if column.is_some_and(|column| column != 0) {
                return Err(ResultsError::parsing(
                    "a column cannot be selected in a text matrix",
                ));
            }
            Ok(labels
                .get(row.unwrap_or(0))
                .map_or(Adapted::Empty, |label| Adapted::Label(label.clone())))
        }
        MatrixData::Numeric { rows, columns, .. } => {
            let (rows, columns) = (*rows, *columns);
            if rows != 1 && row.is_none() && columns != 1 && column.is_none() {
                return Err(ResultsError::parsing(format!(
                    "a {rows}x{columns} matrix needs a row or a column to be selected"
                )));
            }
            if row.is_some() || rows == 1 {
                let row = row.unwrap_or(0);
                if column.is_some() || columns == 1 {
                    return Ok(data
                        .value(row, column.unwrap_or(0))
                        .map_or(Adapted::Empty, |value| Adapted::Value(narrow(value))));
                }
                return Ok(Adapted::Values(
                    (0..columns)
                        .filter_map(|column| data.value(row, column))
                        .map(narrow)
                        .collect(),
                ));
            }
            let column = column.unwrap_or(0);
            Ok(Adapted::Values(
                (0..rows)
                    .filter_map(|row| data.value(row, column))
                    .map(narrow)
                    .collect(),
            ))
        }
    }
}

/// Reads the selected frame/matrix pair of an SDIF file through `converter`.
/// Streams are mapped to channels in increasing stream id order.
#[instrument(skip_all, fields(path = %path.display(), frame = %selection.frame, matrix = %selection.matrix))]
pub fn read_sdif(
    converter: &dyn SdifConverter,
    path: &Path,
    selection: &SdifSelection,
    control: &Control,
) -> Result<Results> {
    let mut streams: BTreeMap<u32, Vec<(f64, Adapted)>> = BTreeMap::new();
    let mut shape = None;
    converter.read(
        path,
        &|frame, matrix| selection.selects(frame, matrix),
        &mut |matrix_frame| {
            control.checkpoint()?;
            let adapted = adapt(matrix_frame.data.as_ref(), selection.row, selection.column)?;
            if let Some(frame_shape) = adapted.shape() {
                match shape {
                    None => shape = Some(frame_shape),
                    Some(established) if established != frame_shape => {
                        return Err(ResultsError::parsing(format!(
                            "stream {} at {}: {frame_shape} cannot be mixed with {established}",
                            matrix_frame.stream, matrix_frame.time
                        )));
                    }
                    Some(_) => {}
                }
            }
            streams
                .entry(matrix_frame.stream)
                .or_default()
                .push((matrix_frame.time, adapted));
            Ok(())
        },
    )?;
    control.checkpoint()?;

    let channels = streams.into_values();
    let results = match shape.unwrap_or(Shape::Marker) {
        Shape::Marker => Results::markers(
            channels
                .map(|frames| {
                    frames
                        .into_iter()
                        .map(|(time, adapted)| {
                            let label = match adapted {
                                Adapted::Label(label) => label,
                                _ => String::new(),
                            };
                            Marker::new(time, 0.0, label)
                        })
                        .collect()
                })
                .collect(),
        ),
        Shape::Point => Results::points(
            channels
                .map(|frames| {
                    frames
                        .into_iter()
                        .map(|(time, adapted)| {
                            let value = match adapted {
                                Adapted::Value(value) => Some(value),
                                _ => None,
                            };
                            Point::new(time, 0.0, value)
                        })
                        .collect()
                })
                .collect(),
        ),
        Shape::Column => Results::columns(
            channels
                .map(|frames| {
                    frames
                        .into_iter()
                        .map(|(time, adapted)| {
                            let values = match adapted {
                                Adapted::Values(values) => values,
                                _ => Vec::new(),
                            };
                            Column::new(time, 0.0, values)
                        })
                        .collect()
                })
                .collect(),
        ),
    };
    control.report(1.0);
    debug!(
        shape = %results.shape(),
        channels = results.num_channels(),
        frames = results.num_frames(),
        "sdif results adapted"
    );
    Ok(results)
}

fn selected_frames<'a, F: Frame>(
    channels: &'a [Vec<F>],
    selection: &'a Selection,
    control: &'a Control,
    mut matrix: impl FnMut(u32, &F) -> MatrixFrame + 'a,
) -> impl Iterator<Item = Result<MatrixFrame>> + 'a {
    selection
        .channels(channels)
        .flat_map(|(index, frames)| frames.into_iter().map(move |frame| (index, frame)))
        .map(move |(index, frame)| {
            control.checkpoint()?;
            let stream = u32::try_from(index)
                .map_err(|_| ResultsError::invalid("too many channels for SDIF streams"))?;
            Ok(matrix(stream, frame))
        })
}

/// Writes results through `converter`: markers as one-row text matrices,
/// points as 1x1 matrices (or a frame without matrix when the value is
/// missing), columns as one-column matrices.
#[instrument(skip_all, fields(path = %path.display(), frame = %sdif.frame, matrix = %sdif.matrix))]
pub fn write_sdif(
    converter: &dyn SdifConverter,
    results: &Results,
    path: &Path,
    sdif: &SdifSelection,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    if sdif.frame.is_wildcard() || sdif.matrix.is_wildcard() {
        return Err(ResultsError::invalid(format!(
            "the SDIF signatures {}/{} must not contain '?'",
            sdif.frame, sdif.matrix
        )));
    }
    let (frame, matrix) = (sdif.frame, sdif.matrix);
    let header = |stream, time, data| MatrixFrame {
        frame,
        matrix,
        stream,
        time,
        data,
    };
    let default_name = match results.shape() {
        Shape::Marker => "label",
        Shape::Point => "value",
        Shape::Column => "values",
    };
    let column_name = sdif.column_name.as_deref().unwrap_or(default_name);
    match results.data() {
        ResultsData::Markers(channels) => {
            let mut frames = selected_frames(channels, selection, control, |stream, marker: &Marker| {
                header(
                    stream,
                    marker.time,
                    Some(MatrixData::Text(vec![marker.label.clone()])),
                )
            });
            converter.write(path, frame, matrix, column_name, &mut frames)?;
        }
        ResultsData::Points(channels) => {
            let mut frames = selected_frames(channels, selection, control, |stream, point: &Point| {
                let data = point.value.map(|value| MatrixData::Numeric {
                    rows: 1,
                    columns: 1,
                    values: vec![f64::from(value)],
                });
                header(stream, point.time, data)
            });
            converter.write(path, frame, matrix, column_name, &mut frames)?;
        }
        ResultsData::Columns(channels) => {
            let mut frames = selected_frames(channels, selection, control, |stream, column: &Column| {
                let data = MatrixData::Numeric {
                    rows: column.values.len(),
                    columns: 1,
                    values: column.values.iter().copied().map(f64::from).collect(),
                };
                header(stream, column.time, Some(data))
            });
            converter.write(path, frame, matrix, column_name, &mut frames)?;
        }
    }
    control.report(1.0);
    Ok(())
}
