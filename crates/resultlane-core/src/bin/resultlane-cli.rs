use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use resultlane_core::{
    ColumnSeparator, Control, Format, LoadOptions, ResultsConfig, TrackInfo,
    diagnostics::init_tracing_from_config,
    export::export_file,
    fixtures::{JsonSdifConverter, chord_markers, demo_track, pitch_points, spectrum_columns},
    loader::load_file,
    model::Results,
    sdif::{SdifConverter, Signature},
};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "resultlane-cli")]
#[command(about = "Headless conversion tools for analysis results files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file; defaults to discovery of resultlane.config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Converts one results file; formats follow the file extensions.
    Convert {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        input_options: InputArgs,
    },
    /// Converts every results file found under a directory.
    ConvertDir {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Extension of the converted files.
        #[arg(long, default_value = "json")]
        to: String,

        #[command(flatten)]
        input_options: InputArgs,
    },
    /// Writes the sample results in every supported format.
    Demo {
        #[arg(default_value = "data/demo")]
        output_dir: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
struct InputArgs {
    /// Read `.csv` inputs as Reaper marker lists.
    #[arg(long)]
    reaper: bool,

    #[arg(long, value_enum, default_value = "comma")]
    separator: SeparatorArg,

    /// The second CSV column holds end times instead of durations.
    #[arg(long)]
    end_time: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeparatorArg {
    Comma,
    Space,
    Tab,
    Pipe,
    Slash,
    Colon,
}

impl From<SeparatorArg> for ColumnSeparator {
    fn from(value: SeparatorArg) -> Self {
        match value {
            SeparatorArg::Comma => Self::Comma,
            SeparatorArg::Space => Self::Space,
            SeparatorArg::Tab => Self::Tab,
            SeparatorArg::Pipe => Self::Pipe,
            SeparatorArg::Slash => Self::Slash,
            SeparatorArg::Colon => Self::Colon,
        }
    }
}

impl InputArgs {
    fn load_options(&self, path: &Path) -> LoadOptions {
        let is_csv = Format::from_path(path).is_ok_and(|format| format == Format::Csv);
        LoadOptions {
            format: (self.reaper && is_csv).then_some(Format::Reaper),
            separator: self.separator.into(),
            use_end_time: self.end_time,
            ..LoadOptions::default()
        }
    }
}

fn track_for(path: &Path) -> TrackInfo {
    let name = path
        .file_stem()
        .map_or_else(|| "results".to_string(), |stem| stem.to_string_lossy().into_owned());
    TrackInfo::new(name).with_file(path)
}

fn convert(
    config: &ResultsConfig,
    input: &Path,
    output: &Path,
    input_options: &InputArgs,
) -> anyhow::Result<()> {
    let control = Control::default();
    let sdif: &dyn SdifConverter = &JsonSdifConverter;
    let loaded = load_file(input, &input_options.load_options(input), Some(sdif), &control)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let options = config.export.options_for(output)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    export_file(
        &loaded.results,
        &track_for(input),
        output,
        &options,
        Some(sdif),
        &control,
    )
    .with_context(|| format!("failed to export {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), "converted");
    Ok(())
}

fn convert_dir(
    config: &ResultsConfig,
    input_dir: &Path,
    output_dir: &Path,
    extension: &str,
    input_options: &InputArgs,
) -> anyhow::Result<()> {
    if Format::from_extension(extension).is_none() {
        bail!("unknown output extension '{extension}'");
    }
    let mut converted = 0_usize;
    let mut failed = 0_usize;
    for entry in WalkDir::new(input_dir).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", input_dir.display()))?;
        if !entry.file_type().is_file() || Format::from_path(entry.path()).is_err() {
            continue;
        }
        let relative = entry.path().strip_prefix(input_dir).unwrap_or(entry.path());
        let output = output_dir.join(relative).with_extension(extension);
        match convert(config, entry.path(), &output, input_options) {
            Ok(()) => converted += 1,
            Err(error) => {
                failed += 1;
                warn!(path = %entry.path().display(), error = %format!("{error:#}"), "conversion skipped");
            }
        }
    }
    info!(converted, failed, "directory converted");
    Ok(())
}

fn demo(config: &ResultsConfig, output_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create directory: {}", output_dir.display()))?;
    let control = Control::default();
    let sdif: &dyn SdifConverter = &JsonSdifConverter;
    let track = demo_track();
    let samples: [(&str, Results, &[Format]); 3] = [
        (
            "chords",
            chord_markers(),
            &[
                Format::Binary,
                Format::Json,
                Format::Csv,
                Format::Lab,
                Format::Cue,
                Format::Reaper,
                Format::Sdif,
            ],
        ),
        (
            "pitch",
            pitch_points(),
            &[Format::Binary, Format::Json, Format::Csv, Format::Sdif],
        ),
        (
            "spectrum",
            spectrum_columns(),
            &[Format::Binary, Format::Json, Format::Csv, Format::Sdif],
        ),
    ];
    for (name, results, formats) in samples {
        for &format in formats {
            let mut options = config.export.options(format);
            options.include_description = true;
            if format == Format::Sdif {
                options.sdif.frame = "1RES".parse::<Signature>()?;
                options.sdif.matrix = "1RES".parse::<Signature>()?;
            }
            let file_name = if format == Format::Reaper {
                format!("{name}-reaper.csv")
            } else {
                format!("{name}.{}", format.extension())
            };
            let path = output_dir.join(file_name);
            export_file(&results, &track, &path, &options, Some(sdif), &control)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), %format, "demo file written");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ResultsConfig::load_from(path)?,
        None => ResultsConfig::load_or_default()?,
    };
    if let Some(log_dir) = &cli.log_dir {
        config.diagnostics.log_dir.clone_from(log_dir);
    }
    let _telemetry = init_tracing_from_config(&config.diagnostics)?;

    match &cli.command {
        Commands::Convert {
            input,
            output,
            input_options,
        } => convert(&config, input, output, input_options)?,
        Commands::ConvertDir {
            input_dir,
            output_dir,
            to,
            input_options,
        } => convert_dir(&config, input_dir, output_dir, to, input_options)?,
        Commands::Demo { output_dir } => demo(&config, output_dir)?,
    }

    Ok(())
}
