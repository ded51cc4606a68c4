use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    binary::read_binary,
    control::Control,
    cue::read_cue,
    delimited::{CsvOptions, CsvReadOptions, LineTerminator, read_csv},
    error::{Operation, Result, ResultsError, TrackFailure},
    format::{ColumnSeparator, Format},
    json::read_json,
    model::Results,
    reaper::read_reaper,
    sdif::{SdifConverter, SdifSelection, read_sdif},
    task::{Task, TaskState},
    track::TrackInfo,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Overrides the extension, e.g. for Reaper lists saved as `.csv`.
    pub format: Option<Format>,
    pub separator: ColumnSeparator,
    pub use_end_time: bool,
    pub sdif: SdifSelection,
}

impl LoadOptions {
    pub fn format_for(&self, path: &Path) -> Result<Format> {
        self.format.map_or_else(|| Format::from_path(path), Ok)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedResults {
    pub results: Results,
    /// Track description embedded in JSON documents.
    pub track: Option<Value>,
}

impl From<Results> for LoadedResults {
    fn from(results: Results) -> Self {
        Self {
            results,
            track: None,
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|error| ResultsError::StreamAccessFailure {
        path: path.display().to_string(),
        reason: error.to_string(),
    })
}

/// Reads results from `path`, picking the codec from the extension unless
/// `options.format` names one.
#[instrument(skip(options, sdif, control), fields(path = %path.display()))]
pub fn load_file(
    path: &Path,
    options: &LoadOptions,
    sdif: Option<&dyn SdifConverter>,
    control: &Control,
) -> Result<LoadedResults> {
    let format = options.format_for(path)?;
    control.report(0.0);
    let loaded = match format {
        Format::Binary => {
            let file = open(path)?;
            let len = file.metadata().ok().map(|metadata| metadata.len());
            read_binary(BufReader::new(file), len, control)?.into()
        }
        Format::Csv | Format::Lab | Format::PureData | Format::Max => {
            let file = open(path)?;
            let len = file.metadata().ok().map(|metadata| metadata.len());
            let csv = match format {
                Format::Lab => CsvReadOptions::from(&CsvOptions::lab()),
                Format::PureData | Format::Max => CsvReadOptions::from(&CsvOptions::messages()),
                _ => CsvReadOptions {
                    separator: options.separator,
                    use_end_time: options.use_end_time,
                    line_terminator: LineTerminator::Newline,
                },
            };
            read_csv(BufReader::new(file), csv, len, control)?.into()
        }
        Format::Json => {
            let (results, track) = read_json(BufReader::new(open(path)?), control)?;
            LoadedResults { results, track }
        }
        Format::Cue => read_cue(BufReader::new(open(path)?), control)?.into(),
        Format::Reaper => read_reaper(BufReader::new(open(path)?), control)?.into(),
        Format::Sdif => {
            let converter = sdif.ok_or_else(|| {
                ResultsError::unsupported("no SDIF converter is available")
            })?;
            open(path)?;
            read_sdif(converter, path, &options.sdif, control)?.into()
        }
    };
    info!(
        %format,
        shape = %loaded.results.shape(),
        channels = loaded.results.num_channels(),
        frames = loaded.results.num_frames(),
        "results loaded"
    );
    Ok(loaded)
}

struct Pending {
    track: String,
    format: Option<Format>,
}

/// Loads a results file for a track in the background.
pub struct Loader {
    task: Task<LoadedResults>,
    sdif: Option<Arc<dyn SdifConverter>>,
    pending: Mutex<Option<Pending>>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            task: Task::new("load"),
            sdif: None,
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_sdif_converter(mut self, converter: Arc<dyn SdifConverter>) -> Self {
        self.sdif = Some(converter);
        self
    }

    /// Starts loading `path`. The format and the file are checked before the
    /// worker starts; a load still in flight is aborted.
    #[instrument(skip(self, track, options), fields(track = %track.name, path = %path.display()))]
    pub fn load(
        &self,
        track: &TrackInfo,
        path: &Path,
        options: LoadOptions,
    ) -> std::result::Result<(), TrackFailure> {
        let fail = |format, error| TrackFailure::new(Operation::Import, &track.name, format, error);
        let format = options.format_for(path).map_err(|error| fail(None, error))?;
        open(path).map_err(|error| fail(Some(format), error))?;

        let path: PathBuf = path.to_path_buf();
        let sdif = self.sdif.clone();
        let mut pending = self.pending.lock();
        self.task
            .start(None, move |control| {
                load_file(&path, &options, sdif.as_deref(), control)
            })
            .map_err(|error| fail(Some(format), error))?;
        *pending = Some(Pending {
            track: track.name.clone(),
            format: Some(format),
        });
        Ok(())
    }

    /// Blocks until the load ends. An aborted load yields no results.
    pub fn wait(&self) -> Option<std::result::Result<LoadedResults, TrackFailure>> {
        let outcome = self.task.wait()?;
        Some(self.finish(outcome))
    }

    /// The outcome of a finished load, without blocking.
    pub fn try_take(&self) -> Option<std::result::Result<LoadedResults, TrackFailure>> {
        let outcome = self.task.try_take()?;
        Some(self.finish(outcome))
    }

    fn finish(&self, outcome: Result<LoadedResults>) -> std::result::Result<LoadedResults, TrackFailure> {
        let pending = self.pending.lock().take();
        outcome.map_err(|error| {
            let (track, format) = pending
                .map(|pending| (pending.track, pending.format))
                .unwrap_or_default();
            TrackFailure::new(Operation::Import, track, format, error)
        })
    }

    /// Asks the load in flight to stop without waiting for it; [`Self::wait`]
    /// then reports it as aborted unless it already finished.
    pub fn cancel(&self) {
        self.task.cancellation().cancel();
    }

    /// Stops the load in flight and drops its outcome.
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
