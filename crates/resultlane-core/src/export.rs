use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    binary::write_binary,
    control::Control,
    cue::{CueOptions, write_cue},
    delimited::{CsvOptions, write_csv},
    error::{Operation, Result, ResultsError, TrackFailure},
    format::{ColumnSeparator, Format, ReaperType},
    json::write_json,
    model::{Results, Shape},
    persistence::{write_atomically, write_atomically_with_path},
    reaper::write_reaper,
    sdif::{SdifConverter, SdifSelection, write_sdif},
    selection::Selection,
    store::ResultsStore,
    task::{Task, TaskState},
    track::TrackInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: Format,
    pub include_header: bool,
    pub separator: ColumnSeparator,
    pub use_end_time: bool,
    pub escape_labels: bool,
    pub reaper_type: ReaperType,
    /// Embed the track description in JSON documents.
    pub include_description: bool,
    pub sdif: SdifSelection,
    pub selection: Selection,
    /// Leave out frames whose extra outputs fall below `extra_thresholds`.
    pub apply_extra_thresholds: bool,
    /// Minimum value per extra output, usually the track's display thresholds.
    pub extra_thresholds: Vec<Option<f32>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new(Format::Json)
    }
}

impl ExportOptions {
    #[must_use]
    pub fn new(format: Format) -> Self {
        Self {
            format,
            include_header: false,
            separator: ColumnSeparator::Comma,
            use_end_time: false,
            escape_labels: true,
            reaper_type: ReaperType::Marker,
            include_description: false,
            sdif: SdifSelection::default(),
            selection: Selection::all(),
            apply_extra_thresholds: false,
            extra_thresholds: Vec::new(),
        }
    }

    /// CSV settings for this export. LAB and message formats have fixed
    /// layouts and no header.
    #[must_use]
    pub fn csv_options(&self) -> CsvOptions {
        let preset = match self.format {
            Format::Lab => CsvOptions::lab(),
            Format::PureData | Format::Max => CsvOptions::messages(),
            _ => {
                return CsvOptions {
                    separator: self.separator,
                    include_header: self.include_header,
                    use_end_time: self.use_end_time,
                    escape_labels: self.escape_labels,
                    ..CsvOptions::default()
                };
            }
        };
        CsvOptions {
            escape_labels: self.escape_labels,
            ..preset
        }
    }

    /// The selection with the extra thresholds folded in when they apply.
    #[must_use]
    pub fn effective_selection(&self) -> Selection {
        if self.apply_extra_thresholds {
            self.selection
                .clone()
                .with_extra_thresholds(self.extra_thresholds.clone())
        } else {
            self.selection.clone()
        }
    }
}

/// Writes `results` to `path` through a scratch file; `path` is only
/// replaced once the whole export succeeded.
#[instrument(
    skip(results, track, options, sdif, control),
    fields(track = %track.name, path = %path.display(), format = %options.format)
)]
pub fn export_file(
    results: &Results,
    track: &TrackInfo,
    path: &Path,
    options: &ExportOptions,
    sdif: Option<&dyn SdifConverter>,
    control: &Control,
) -> Result<()> {
    if results.is_empty() {
        return Err(ResultsError::invalid("there are no results to export"));
    }
    if options.format.is_marker_only() && results.shape() != Shape::Marker {
        return Err(ResultsError::unsupported(format!(
            "{} files can only hold markers, not {}",
            options.format,
            results.shape()
        )));
    }
    control.checkpoint()?;
    control.report(0.0);

    let selection = &options.effective_selection();
    match options.format {
        Format::Binary => write_atomically(path, |writer| {
            write_binary(results, writer, selection, control)
        })?,
        Format::Csv | Format::Lab | Format::PureData | Format::Max => {
            let csv = options.csv_options();
            write_atomically(path, |writer| {
                write_csv(results, writer, &csv, selection, control)
            })?;
        }
        Format::Json => {
            let description = options.include_description.then(|| track.description());
            write_atomically(path, |writer| {
                write_json(results, writer, description.as_ref(), selection, control)
            })?;
        }
        Format::Cue => {
            let cue = CueOptions {
                title: track.name.clone(),
                file: track.file.clone(),
            };
            write_atomically(path, |writer| {
                write_cue(results, writer, &cue, selection, control)
            })?;
        }
        Format::Reaper => write_atomically(path, |writer| {
            write_reaper(results, writer, options.reaper_type, selection, control)
        })?,
        Format::Sdif => {
            let converter =
                sdif.ok_or_else(|| ResultsError::unsupported("no SDIF converter is available"))?;
            write_atomically_with_path(path, |scratch| {
                write_sdif(converter, results, scratch, &options.sdif, selection, control)
            })?;
        }
    }
    info!(
        shape = %results.shape(),
        frames = results.num_frames(),
        "results exported"
    );
    Ok(())
}

struct Pending {
    track: String,
    format: Format,
}

/// Exports the results of a store in the background. The export reads a
/// snapshot and gives up with `DataLocked` as soon as a writer asks for the
/// store.
pub struct Exporter {
    task: Task<PathBuf>,
    sdif: Option<Arc<dyn SdifConverter>>,
    pending: Mutex<Option<Pending>>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            task: Task::new("export"),
            sdif: None,
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_sdif_converter(mut self, converter: Arc<dyn SdifConverter>) -> Self {
        self.sdif = Some(converter);
        self
    }

    #[instrument(skip(self, store, track, options), fields(track = %track.name, path = %path.display()))]
    pub fn export(
        &self,
        store: &ResultsStore,
        track: &TrackInfo,
        path: &Path,
        options: ExportOptions,
    ) -> std::result::Result<(), TrackFailure> {
        let format = options.format;
        let fail = |error| TrackFailure::new(Operation::Export, &track.name, Some(format), error);
        let snapshot = store.try_read().map_err(fail)?;
        let gate = Arc::clone(snapshot.access().gate());

        let track_info = track.clone();
        let destination = path.to_path_buf();
        let sdif = self.sdif.clone();
        let mut pending = self.pending.lock();
        self.task
            .start(Some(gate), move |control| {
                export_file(
                    snapshot.results(),
                    &track_info,
                    &destination,
                    &options,
                    sdif.as_deref(),
                    control,
                )?;
                // Reading access ends with the snapshot.
                drop(snapshot);
                Ok(destination)
            })
            .map_err(fail)?;
        *pending = Some(Pending {
            track: track.name.clone(),
            format,
        });
        Ok(())
    }

    /// Blocks until the export ends and returns the written path.
    pub fn wait(&self) -> Option<std::result::Result<PathBuf, TrackFailure>> {
        let outcome = self.task.wait()?;
        Some(self.finish(outcome))
    }

    pub fn try_take(&self) -> Option<std::result::Result<PathBuf, TrackFailure>> {
        let outcome = self.task.try_take()?;
        Some(self.finish(outcome))
    }

    fn finish(&self, outcome: Result<PathBuf>) -> std::result::Result<PathBuf, TrackFailure> {
        let pending = self.pending.lock().take();
        outcome.map_err(|error| match pending {
            Some(pending) => {
                TrackFailure::new(Operation::Export, pending.track, Some(pending.format), error)
            }
            None => TrackFailure::new(Operation::Export, String::new(), None, error),
        })
    }

    /// Asks the export in flight to stop without waiting for it; [`Self::wait`]
    /// then reports it as aborted unless it already finished.
    pub fn cancel(&self) {
        self.task.cancellation().cancel();
    }

    /// Stops the export in flight and drops its outcome.
    pub fn abort(&self) {
        self.task.abort();
        self.pending.lock().take();
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    #[must_use]
    pub fn progress(&self) -> f32 {
        self.task.progress()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}
