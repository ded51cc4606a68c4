pub mod access;
pub mod binary;
pub mod config;
pub mod control;
pub mod cue;
pub mod delimited;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod format;
pub mod json;
pub mod loader;
pub mod model;
pub mod persistence;
pub mod reaper;
pub mod sdif;
pub mod selection;
pub mod store;
pub mod task;
pub mod track;

pub use access::{AccessGate, ReadAccess, WriteAccess};
pub use config::{DiagnosticsConfig, ExportConfig, ResultsConfig};
pub use control::{Cancellation, Control, Progress};
pub use diagnostics::{
    TelemetryGuard, init_tracing, init_tracing_from_config, init_tracing_with_options,
};
pub use error::{Operation, ResultsError, TrackFailure};
pub use export::{ExportOptions, Exporter, export_file};
pub use format::{ColumnSeparator, Format, ReaperType};
pub use loader::{LoadOptions, LoadedResults, Loader, load_file};
pub use model::{
    Channel, ChannelData, Column, Frame, Marker, PluginFrame, Point, Results, ResultsData, Shape,
    TimeRange, ValueRange,
};
pub use sdif::{MatrixData, MatrixFrame, SdifConverter, SdifSelection, Signature};
pub use selection::Selection;
pub use store::{ResultsSnapshot, ResultsStore};
pub use task::TaskState;
pub use track::TrackInfo;
