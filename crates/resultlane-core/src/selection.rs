use serde::{Deserialize, Serialize};

use crate::model::{Frame, TimeRange};

/// Which channels and frames an exporter writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub channels: Option<Vec<usize>>,
    pub time_range: Option<TimeRange>,
    /// Minimum value per extra output; frames below any of them are left out.
    pub extra_thresholds: Option<Vec<Option<f32>>>,
}

impl Selection {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = usize>) -> Self {
        self.channels = Some(channels.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = Some(time_range);
        self
    }

    #[must_use]
    pub fn with_extra_thresholds(mut self, thresholds: Vec<Option<f32>>) -> Self {
        self.extra_thresholds = Some(thresholds);
        self
    }

    #[must_use]
    pub fn includes_channel(&self, channel: usize) -> bool {
        self.channels
            .as_ref()
            .is_none_or(|channels| channels.contains(&channel))
    }

    /// Selected channels in index order, each paired with its index and the
    /// frames that pass both the time range and the extra thresholds.
    pub fn channels<'a, F: Frame>(
        &'a self,
        channels: &'a [Vec<F>],
    ) -> impl Iterator<Item = (usize, Vec<&'a F>)> + 'a {
        channels
            .iter()
            .enumerate()
            .filter(move |(index, _)| self.includes_channel(*index))
            .map(move |(index, frames)| {
                let kept = self
                    .frames(frames)
                    .iter()
                    .filter(|frame| self.passes_thresholds(*frame))
                    .collect();
                (index, kept)
            })
    }

    /// A frame passes when each thresholded extra output it carries is at
    /// least its threshold. Missing extra outputs are not checked.
    #[must_use]
    pub fn passes_thresholds<F: Frame>(&self, frame: &F) -> bool {
        let Some(thresholds) = &self.extra_thresholds else {
            return true;
        };
        thresholds
            .iter()
            .zip(frame.extra())
            .all(|(threshold, value)| threshold.is_none_or(|threshold| *value >= threshold))
    }

    /// Frames of a sorted channel inside the time range.
    ///
    /// The scan starts at the first frame still running at the range start,
    /// which may begin before it, and stops after the last frame starting at or
    /// before the range end.
    #[must_use]
    pub fn frames<'a, F: Frame>(&self, frames: &'a [F]) -> &'a [F] {
        let Some(range) = self.time_range else {
            return frames;
        };
        let first = frames.partition_point(|frame| frame.end() < range.start);
        let tail = &frames[first..];
        let count = tail.partition_point(|frame| frame.time() <= range.end);
        &tail[..count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Marker;

    fn channel() -> Vec<Marker> {
        [0.0, 1.0, 2.0, 3.0, 4.0]
            .iter()
            .map(|&time| Marker::new(time, 0.5, format!("{time}")))
            .collect()
    }

    #[test]
    fn full_selection_keeps_everything() {
        let frames = channel();
        assert_eq!(Selection::all().frames(&frames).len(), 5);
    }

    #[test]
    fn range_start_keeps_the_frame_already_started() {
        let frames = channel();
        let selection = Selection::all().with_time_range(TimeRange::new(1.5, 3.0));
        let times: Vec<_> = selection.frames(&frames).iter().map(|m| m.time).collect();
        // 1.0 starts before the range but lasts until 1.5.
        assert_eq!(times, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn frames_ended_before_the_range_are_skipped() {
        let frames = channel();
        let selection = Selection::all().with_time_range(TimeRange::new(1.7, 3.0));
        let times: Vec<_> = selection.frames(&frames).iter().map(|m| m.time).collect();
        assert_eq!(times, [2.0, 3.0]);

        let selection = Selection::all().with_time_range(TimeRange::new(4.6, 9.0));
        assert!(selection.frames(&frames).is_empty());
    }

    #[test]
    fn range_before_everything_starts_at_first_frame() {
        let frames = channel();
        let selection = Selection::all().with_time_range(TimeRange::new(-5.0, -1.0));
        assert!(selection.frames(&frames).is_empty());
        let selection = Selection::all().with_time_range(TimeRange::new(-5.0, 0.0));
        assert_eq!(selection.frames(&frames).len(), 1);
    }

    #[test]
    fn extra_thresholds_drop_quiet_frames() {
        let frames: Vec<Marker> = [(0.0, vec![0.2, 5.0]), (1.0, vec![0.9, 1.0]), (2.0, vec![0.6])]
            .into_iter()
            .map(|(time, extra)| {
                let mut marker = Marker::new(time, 0.0, "x");
                marker.extra = extra;
                marker
            })
            .collect();
        let channels = vec![frames];
        let kept_times = |selection: &Selection| -> Vec<f64> {
            selection
                .channels(&channels)
                .flat_map(|(_, frames)| frames.into_iter().map(|marker| marker.time))
                .collect()
        };

        assert_eq!(kept_times(&Selection::all()), [0.0, 1.0, 2.0]);
        let selection = Selection::all().with_extra_thresholds(vec![Some(0.5)]);
        assert_eq!(kept_times(&selection), [1.0, 2.0]);
        // The second threshold only applies to frames carrying a second extra.
        let selection = Selection::all().with_extra_thresholds(vec![None, Some(2.0)]);
        assert_eq!(kept_times(&selection), [0.0, 2.0]);
    }

    #[test]
    fn channel_filter_preserves_indices() {
        let channels = vec![channel(), channel(), channel()];
        let selection = Selection::all().with_channels([2, 0]);
        let indices: Vec<_> = selection.channels(&channels).map(|(index, _)| index).collect();
        assert_eq!(indices, [0, 2]);
    }
}
