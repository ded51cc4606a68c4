use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultsError};

pub trait Frame: Clone + Send + Sync + 'static {
    fn time(&self) -> f64;
    fn duration(&self) -> f64;
    fn extra(&self) -> &[f32];

    fn end(&self) -> f64 {
        self.time() + self.duration()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub time: f64,
    pub duration: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<f32>,
}

impl Marker {
    #[must_use]
    pub fn new(time: f64, duration: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            duration,
            label: label.into(),
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: f64,
    pub duration: f64,
    pub value: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<f32>,
}

impl Point {
    #[must_use]
    pub fn new(time: f64, duration: f64, value: Option<f32>) -> Self {
        Self {
            time,
            duration,
            value,
            extra: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub time: f64,
    pub duration: f64,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<f32>,
}

impl Column {
    #[must_use]
    pub fn new(time: f64, duration: f64, values: Vec<f32>) -> Self {
        Self {
            time,
            duration,
            values,
            extra: Vec::new(),
        }
    }
}

macro_rules! impl_frame {
    ($($frame:ty),*) => {
        $(
            impl Frame for $frame {
                fn time(&self) -> f64 {
                    self.time
                }

                fn duration(&self) -> f64 {
                    self.duration
                }

                fn extra(&self) -> &[f32] {
                    &self.extra
                }
            }
        )*
    };
}

impl_frame!(Marker, Point, Column);

/// Frames of one channel, sorted by time.
pub type Channel<F> = Vec<F>;

/// Channels shared between every owner of a [`Results`] value. Never mutated in
/// place: edits build a new vector and a new `Arc`.
pub type SharedChannels<F> = Arc<Vec<Channel<F>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Marker,
    Point,
    Column,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Marker => "markers",
            Self::Point => "points",
            Self::Column => "columns",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub start: f64,
    pub end: f64,
}

impl ValueRange {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn contains(self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ResultsData {
    Markers(SharedChannels<Marker>),
    Points(SharedChannels<Point>),
    Columns(SharedChannels<Column>),
}

/// Frames of a single channel, detached from any [`Results`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Markers(Vec<Marker>),
    Points(Vec<Point>),
    Columns(Vec<Column>),
}

impl ChannelData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Markers(frames) => frames.len(),
            Self::Points(frames) => frames.len(),
            Self::Columns(frames) => frames.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Markers(_) => Shape::Marker,
            Self::Points(_) => Shape::Point,
            Self::Columns(_) => Shape::Column,
        }
    }
}

/// One analysis output as a frame sequence per channel.
///
/// Cloning is a reference copy. Two values compare equal only when they share
/// the same underlying storage, which is how callers detect no-op updates.
#[derive(Debug, Clone)]
pub struct Results {
    data: ResultsData,
    num_bins: usize,
    value_range: Option<ValueRange>,
}

impl Default for Results {
    fn default() -> Self {
        Self {
            data: ResultsData::Points(Arc::default()),
            num_bins: 0,
            value_range: None,
        }
    }
}

impl PartialEq for Results {
    fn eq(&self, other: &Self) -> bool {
        match (&self.data, &other.data) {
            (ResultsData::Markers(lhs), ResultsData::Markers(rhs)) => Arc::ptr_eq(lhs, rhs),
            (ResultsData::Points(lhs), ResultsData::Points(rhs)) => Arc::ptr_eq(lhs, rhs),
            (ResultsData::Columns(lhs), ResultsData::Columns(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl Results {
    #[must_use]
    pub fn markers(mut channels: Vec<Channel<Marker>>) -> Self {
        channels.iter_mut().for_each(|channel| sort_by_time(channel));
        Self {
            data: ResultsData::Markers(Arc::new(channels)),
            num_bins: 0,
            value_range: None,
        }
    }

    #[must_use]
    pub fn points(mut channels: Vec<Channel<Point>>) -> Self {
        channels.iter_mut().for_each(|channel| sort_by_time(channel));
        let value_range = finite_range(
            channels
                .iter()
                .flat_map(|channel| channel.iter().filter_map(|point| point.value)),
        );
        Self {
            data: ResultsData::Points(Arc::new(channels)),
            num_bins: 1,
            value_range,
        }
    }

    #[must_use]
    pub fn columns(mut channels: Vec<Channel<Column>>) -> Self {
        channels.iter_mut().for_each(|channel| sort_by_time(channel));
        let num_bins = channels
            .iter()
            .flat_map(|channel| channel.iter().map(|column| column.values.len()))
            .max()
            .unwrap_or_default();
        let value_range = finite_range(channels.iter().flat_map(|channel| {
            channel
                .iter()
                .flat_map(|column| column.values.iter().copied())
        }));
        Self {
            data: ResultsData::Columns(Arc::new(channels)),
            num_bins,
            value_range,
        }
    }

    /// Builds results from raw plugin frames. Frames without values become
    /// markers, frames with at most one value become points, anything wider
    /// becomes columns.
    #[must_use]
    pub fn from_plugin_output(channels: Vec<Vec<PluginFrame>>) -> Self {
        let frames = || channels.iter().flat_map(|channel| channel.iter());
        if frames().all(|frame| frame.values.is_empty()) {
            return Self::markers(
                channels
                    .into_iter()
                    .map(|channel| channel.into_iter().map(PluginFrame::into_marker).collect())
                    .collect(),
            );
        }
        if frames().all(|frame| frame.values.len() <= 1) {
            return Self::points(
                channels
                    .into_iter()
                    .map(|channel| channel.into_iter().map(PluginFrame::into_point).collect())
                    .collect(),
            );
        }
        Self::columns(
            channels
                .into_iter()
                .map(|channel| channel.into_iter().map(PluginFrame::into_column).collect())
                .collect(),
        )
    }

    /// Overrides the nominal value extent, e.g. with the one a plugin declares.
    #[must_use]
    pub fn with_value_range(mut self, value_range: Option<ValueRange>) -> Self {
        self.value_range = value_range;
        self
    }

    #[must_use]
    pub fn data(&self) -> &ResultsData {
        &self.data
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match &self.data {
            ResultsData::Markers(_) => Shape::Marker,
            ResultsData::Points(_) => Shape::Point,
            ResultsData::Columns(_) => Shape::Column,
        }
    }

    #[must_use]
    pub fn get_markers(&self) -> Option<&SharedChannels<Marker>> {
        match &self.data {
            ResultsData::Markers(channels) => Some(channels),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_points(&self) -> Option<&SharedChannels<Point>> {
        match &self.data {
            ResultsData::Points(channels) => Some(channels),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_columns(&self) -> Option<&SharedChannels<Column>> {
        match &self.data {
            ResultsData::Columns(channels) => Some(channels),
            _ => None,
        }
    }

    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[must_use]
    pub fn value_range(&self) -> Option<ValueRange> {
        self.value_range
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        match &self.data {
            ResultsData::Markers(channels) => channels.len(),
            ResultsData::Points(channels) => channels.len(),
            ResultsData::Columns(channels) => channels.len(),
        }
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        match &self.data {
            ResultsData::Markers(channels) => channels.iter().map(Vec::len).sum(),
            ResultsData::Points(channels) => channels.iter().map(Vec::len).sum(),
            ResultsData::Columns(channels) => channels.iter().map(Vec::len).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    /// Time span from the first frame start to the furthest frame end.
    #[must_use]
    pub fn time_range(&self) -> Option<TimeRange> {
        match &self.data {
            ResultsData::Markers(channels) => channels_time_range(channels),
            ResultsData::Points(channels) => channels_time_range(channels),
            ResultsData::Columns(channels) => channels_time_range(channels),
        }
    }

    #[must_use]
    pub fn marker_at(&self, channel: usize, time: f64) -> Option<&str> {
        let frames = self.get_markers()?.get(channel)?;
        find_first_at(frames, time).map(|index| frames[index].label.as_str())
    }

    #[must_use]
    pub fn point_at(&self, channel: usize, time: f64) -> Option<f32> {
        point_at(self.get_points()?.get(channel)?, time)
    }

    #[must_use]
    pub fn column_value_at(&self, channel: usize, time: f64, bin: usize) -> Option<f32> {
        let frames = self.get_columns()?.get(channel)?;
        let index = find_first_at(frames, time)?;
        frames[index].values.get(bin).copied()
    }

    pub fn copy_frames(&self, channel: usize, range: TimeRange) -> Result<ChannelData> {
        match &self.data {
            ResultsData::Markers(channels) => {
                copy_in_range(channels, channel, range).map(ChannelData::Markers)
            }
            ResultsData::Points(channels) => {
                copy_in_range(channels, channel, range).map(ChannelData::Points)
            }
            ResultsData::Columns(channels) => {
                copy_in_range(channels, channel, range).map(ChannelData::Columns)
            }
        }
    }

    /// Returns new results without the frames of `channel` starting inside
    /// `range`. The shared storage of `self` is left untouched.
    pub fn erase_frames(&self, channel: usize, range: TimeRange) -> Result<Self> {
        let value_range = self.value_range;
        Ok(match &self.data {
            ResultsData::Markers(channels) => Self::markers(edit_channel(
                channels,
                channel,
                |frames| erase_in_range(frames, range),
            )?),
            ResultsData::Points(channels) => Self::points(edit_channel(
                channels,
                channel,
                |frames| erase_in_range(frames, range),
            )?)
            .with_value_range(value_range),
            ResultsData::Columns(channels) => Self::columns(edit_channel(
                channels,
                channel,
                |frames| erase_in_range(frames, range),
            )?)
            .with_value_range(value_range),
        })
    }

    /// Returns new results where `frames` replace whatever `channel` held over
    /// their time span.
    pub fn insert_frames(&self, channel: usize, frames: ChannelData) -> Result<Self> {
        match (&self.data, frames) {
            (ResultsData::Markers(channels), ChannelData::Markers(inserted)) => {
                Ok(Self::markers(edit_channel(channels, channel, |existing| {
                    merge_frames(existing, inserted);
                })?))
            }
            (ResultsData::Points(channels), ChannelData::Points(inserted)) => {
                Ok(Self::points(edit_channel(channels, channel, |existing| {
                    merge_frames(existing, inserted);
                })?))
            }
            (ResultsData::Columns(channels), ChannelData::Columns(inserted)) => {
                Ok(Self::columns(edit_channel(channels, channel, |existing| {
                    merge_frames(existing, inserted);
                })?))
            }
            (_, frames) => Err(ResultsError::invalid(format!(
                "cannot insert {} into {}",
                frames.shape(),
                self.shape()
            ))),
        }
    }
}

/// One frame as produced by an analysis plugin, before its shape is known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginFrame {
    pub time: f64,
    pub duration: f64,
    pub label: String,
    pub values: Vec<f32>,
    pub extra: Vec<f32>,
}

impl PluginFrame {
    fn into_marker(self) -> Marker {
        Marker {
            time: self.time,
            duration: self.duration.max(0.0),
            label: self.label,
            extra: self.extra,
        }
    }

    fn into_point(self) -> Point {
        Point {
            time: self.time,
            duration: self.duration.max(0.0),
            value: self.values.first().copied(),
            extra: self.extra,
        }
    }

    fn into_column(self) -> Column {
        Column {
            time: self.time,
            duration: self.duration.max(0.0),
            values: self.values,
            extra: self.extra,
        }
    }
}

/// Index of the last frame starting at or before `time`, or the first frame
/// when `time` precedes every frame. `None` only for an empty channel.
#[must_use]
pub fn find_first_at<F: Frame>(frames: &[F], time: f64) -> Option<usize> {
    if frames.is_empty() {
        return None;
    }
    let started = frames.partition_point(|frame| frame.time() <= time);
    Some(started.saturating_sub(1))
}

/// Value of a point channel at `time`. Past the end of a frame and before the
/// next one, the value is interpolated linearly across the gap; frames that
/// touch or overlap jump straight to the next value.
#[must_use]
pub fn point_at(frames: &[Point], time: f64) -> Option<f32> {
    let index = find_first_at(frames, time)?;
    let first = &frames[index];
    let Some(second) = frames.get(index + 1) else {
        return first.value;
    };
    let end = first.end();
    if time < end || second.value.is_none() {
        return first.value;
    }
    let (Some(from), Some(to)) = (first.value, second.value) else {
        return second.value;
    };
    if second.time <= end {
        return Some(to);
    }
    let ratio = ((time - end) / (second.time - end)).clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation)]
    let value = ((1.0 - ratio) * f64::from(from) + ratio * f64::from(to)) as f32;
    Some(value)
}

fn sort_by_time<F: Frame>(frames: &mut [F]) {
    if frames
        .windows(2)
        .any(|pair| pair[0].time().total_cmp(&pair[1].time()).is_gt())
    {
        frames.sort_by(|lhs, rhs| lhs.time().total_cmp(&rhs.time()));
    }
}

fn finite_range(values: impl Iterator<Item = f32>) -> Option<ValueRange> {
    values
        .filter(|value| value.is_finite())
        .map(f64::from)
        .fold(None, |range: Option<ValueRange>, value| {
            let current = ValueRange::new(value, value);
            Some(range.map_or(current, |range| range.union(current)))
        })
}

fn channels_time_range<F: Frame>(channels: &[Channel<F>]) -> Option<TimeRange> {
    channels
        .iter()
        .filter_map(|channel| {
            let first = channel.first()?;
            let end = channel.iter().map(Frame::end).fold(first.end(), f64::max);
            Some(TimeRange::new(first.time(), end))
        })
        .reduce(TimeRange::union)
}

fn copy_in_range<F: Frame>(
    channels: &[Channel<F>],
    channel: usize,
    range: TimeRange,
) -> Result<Vec<F>> {
    let frames = channels
        .get(channel)
        .ok_or_else(|| ResultsError::invalid(format!("channel {channel} does not exist")))?;
    Ok(frames
        .iter()
        .filter(|frame| range.contains(frame.time()))
        .cloned()
        .collect())
}

fn erase_in_range<F: Frame>(frames: &mut Channel<F>, range: TimeRange) {
    frames.retain(|frame| !range.contains(frame.time()));
}

fn merge_frames<F: Frame>(existing: &mut Channel<F>, inserted: Vec<F>) {
    let span = inserted
        .iter()
        .map(|frame| TimeRange::new(frame.time(), frame.time()))
        .reduce(TimeRange::union);
    if let Some(span) = span {
        erase_in_range(existing, span);
    }
    existing.extend(inserted);
    existing.sort_by(|lhs, rhs| lhs.time().total_cmp(&rhs.time()));
}

fn edit_channel<F: Frame>(
    channels: &SharedChannels<F>,
    channel: usize,
    edit: impl FnOnce(&mut Channel<F>),
) -> Result<Vec<Channel<F>>> {
    if channel >= channels.len() {
        return Err(ResultsError::invalid(format!(
            "channel {channel} does not exist"
        )));
    }
    let mut copy = channels.as_ref().clone();
    edit(&mut copy[channel]);
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[(f64, f64, Option<f32>)]) -> Vec<Point> {
        values
            .iter()
            .map(|&(time, duration, value)| Point::new(time, duration, value))
            .collect()
    }

    #[test]
    fn equality_is_storage_identity() {
        let results = Results::markers(vec![vec![Marker::new(0.0, 0.0, "A")]]);
        let shared = results.clone();
        let rebuilt = Results::markers(vec![vec![Marker::new(0.0, 0.0, "A")]]);
        assert_eq!(results, shared);
        assert_ne!(results, rebuilt);
        assert_ne!(Results::default(), Results::default());
    }

    #[test]
    fn default_results_are_empty_points() {
        let results = Results::default();
        assert!(results.is_empty());
        assert_eq!(results.shape(), Shape::Point);
        assert_eq!(results.num_channels(), 0);
        assert_eq!(results.time_range(), None);
    }

    #[test]
    fn extents_are_derived_from_frames() {
        let columns = Results::columns(vec![
            vec![Column::new(0.0, 0.1, vec![1.0, -2.0, f32::NAN])],
            vec![Column::new(0.0, 0.1, vec![4.0, 0.5, 1.0, 3.0, 2.0])],
        ]);
        assert_eq!(columns.num_bins(), 5);
        assert_eq!(columns.value_range(), Some(ValueRange::new(-2.0, 4.0)));

        let points = Results::points(vec![points(&[(0.0, 0.0, None), (1.0, 0.0, Some(0.25))])]);
        assert_eq!(points.num_bins(), 1);
        assert_eq!(points.value_range(), Some(ValueRange::new(0.25, 0.25)));

        let markers = Results::markers(vec![vec![Marker::new(0.0, 0.0, "A")]]);
        assert_eq!(markers.num_bins(), 0);
        assert_eq!(markers.value_range(), None);
    }

    #[test]
    fn constructors_sort_channels_by_time() {
        let results = Results::markers(vec![vec![
            Marker::new(2.0, 0.0, "C"),
            Marker::new(0.5, 0.0, "A"),
            Marker::new(1.0, 0.0, "B"),
        ]]);
        let labels: Vec<_> = results.get_markers().unwrap()[0]
            .iter()
            .map(|marker| marker.label.as_str())
            .collect();
        assert_eq!(labels, ["A", "B", "C"]);
    }

    #[test]
    fn find_first_at_picks_preceding_frame() {
        let frames = points(&[(1.0, 0.5, Some(1.0)), (2.0, 0.5, Some(2.0)), (3.0, 0.5, Some(3.0))]);
        assert_eq!(find_first_at(&frames, 0.0), Some(0));
        assert_eq!(find_first_at(&frames, 1.0), Some(0));
        assert_eq!(find_first_at(&frames, 2.7), Some(1));
        assert_eq!(find_first_at(&frames, 9.0), Some(2));
        assert_eq!(find_first_at::<Point>(&[], 1.0), None);
    }

    #[test]
    fn point_at_interpolates_across_gaps() {
        let frames = points(&[(0.0, 1.0, Some(0.0)), (1.0, 1.0, Some(10.0))]);
        assert_eq!(point_at(&frames, 0.5), Some(0.0));
        assert_eq!(point_at(&frames, 1.5), Some(10.0));

        let overlapping = points(&[(0.0, 2.0, Some(0.0)), (1.0, 1.0, Some(10.0))]);
        assert_eq!(point_at(&overlapping, 1.5), Some(10.0));

        let gapped = points(&[(0.0, 0.5, Some(1.0)), (1.0, 0.5, Some(3.0))]);
        assert_eq!(point_at(&gapped, 0.25), Some(1.0));
        assert_eq!(point_at(&gapped, 0.5), Some(1.0));
        assert_eq!(point_at(&gapped, 0.75), Some(2.0));
        assert_eq!(point_at(&gapped, 1.0), Some(3.0));

        let empty_first = points(&[(0.0, 0.5, None), (1.0, 0.5, Some(3.0))]);
        assert_eq!(point_at(&empty_first, 0.75), Some(3.0));

        let empty_second = points(&[(0.0, 0.5, Some(1.0)), (1.0, 0.5, None)]);
        assert_eq!(point_at(&empty_second, 0.75), Some(1.0));
    }

    #[test]
    fn lookups_by_channel() {
        let markers = Results::markers(vec![
            vec![Marker::new(0.0, 0.0, "N"), Marker::new(1.0, 0.0, "B7/D#")],
            vec![Marker::new(0.0, 0.0, "Z")],
        ]);
        assert_eq!(markers.marker_at(0, 1.5), Some("B7/D#"));
        assert_eq!(markers.marker_at(1, 3.0), Some("Z"));
        assert_eq!(markers.marker_at(2, 0.0), None);
        assert_eq!(markers.point_at(0, 0.0), None);

        let columns = Results::columns(vec![vec![
            Column::new(0.0, 0.5, vec![1.0, 2.0]),
            Column::new(0.5, 0.5, vec![3.0, 4.0]),
        ]]);
        assert_eq!(columns.column_value_at(0, 0.7, 1), Some(4.0));
        assert_eq!(columns.column_value_at(0, 0.7, 2), None);
    }

    #[test]
    fn plugin_output_picks_shape_from_values() {
        let frame = |values: Vec<f32>| PluginFrame {
            time: 0.0,
            duration: -1.0,
            label: "x".to_string(),
            values,
            extra: vec![0.5],
        };
        let markers = Results::from_plugin_output(vec![vec![frame(vec![])]]);
        assert_eq!(markers.shape(), Shape::Marker);
        assert_eq!(markers.get_markers().unwrap()[0][0].duration, 0.0);

        let points = Results::from_plugin_output(vec![vec![frame(vec![]), frame(vec![2.0])]]);
        assert_eq!(points.shape(), Shape::Point);
        assert_eq!(points.get_points().unwrap()[0][0].value, None);
        assert_eq!(points.get_points().unwrap()[0][1].value, Some(2.0));

        let columns = Results::from_plugin_output(vec![vec![frame(vec![1.0, 2.0, 3.0])]]);
        assert_eq!(columns.shape(), Shape::Column);
        assert_eq!(columns.num_bins(), 3);
        assert_eq!(columns.get_columns().unwrap()[0][0].extra, vec![0.5]);
    }

    #[test]
    fn edits_build_new_storage() {
        let original = Results::markers(vec![vec![
            Marker::new(0.0, 0.0, "A"),
            Marker::new(1.0, 0.0, "B"),
            Marker::new(2.0, 0.0, "C"),
        ]]);

        let erased = original
            .erase_frames(0, TimeRange::new(0.5, 1.5))
            .expect("channel exists");
        assert_eq!(erased.get_markers().unwrap()[0].len(), 2);
        assert_eq!(original.get_markers().unwrap()[0].len(), 3);
        assert_ne!(erased, original);

        let copied = original
            .copy_frames(0, TimeRange::new(1.0, 2.0))
            .expect("channel exists");
        assert_eq!(copied.len(), 2);

        let inserted = erased
            .insert_frames(0, ChannelData::Markers(vec![Marker::new(1.0, 0.0, "B2")]))
            .expect("shape matches");
        assert_eq!(inserted.marker_at(0, 1.0), Some("B2"));
        assert_eq!(inserted.get_markers().unwrap()[0].len(), 3);
    }

    #[test]
    fn edits_reject_bad_channel_and_shape() {
        let results = Results::points(vec![points(&[(0.0, 0.0, Some(1.0))])]);
        assert!(matches!(
            results.erase_frames(3, TimeRange::new(0.0, 1.0)),
            Err(ResultsError::DataInvalid(_))
        ));
        assert!(matches!(
            results.insert_frames(0, ChannelData::Markers(vec![Marker::new(0.0, 0.0, "A")])),
            Err(ResultsError::DataInvalid(_))
        ));
    }

    #[test]
    fn time_range_spans_all_channels() {
        let results = Results::markers(vec![
            vec![Marker::new(1.0, 0.5, "A"), Marker::new(2.0, 3.0, "B")],
            vec![Marker::new(0.5, 0.0, "C")],
            vec![],
        ]);
        assert_eq!(results.time_range(), Some(TimeRange::new(0.5, 5.0)));
    }
}
