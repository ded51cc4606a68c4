use std::fs;

use resultlane_core::{
    ColumnSeparator, Control, ExportOptions, Exporter, Format, LoadOptions, Loader, ResultsConfig,
    ResultsError, ResultsStore, TaskState, TrackInfo,
    export::export_file,
    fixtures::{chord_markers, demo_track, spectrum_columns},
};

#[test]
fn a_background_load_reports_progress_and_results() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("spectrum.dat");
    export_file(
        &spectrum_columns(),
        &demo_track(),
        &path,
        &ExportOptions::new(Format::Binary),
        None,
        &Control::default(),
    )
    .expect("export should succeed");

    let loader = Loader::new();
    loader
        .load(&TrackInfo::new("Spectrum"), &path, LoadOptions::default())
        .expect("load starts");
    let loaded = loader.wait().expect("a load was started").expect("load succeeds");
    assert_eq!(loaded.results.num_bins(), 4);
    assert!((loader.progress() - 1.0).abs() < f32::EPSILON);
    assert_eq!(loader.state(), TaskState::Idle);
    assert!(loader.wait().is_none());
}

#[test]
fn loads_fail_fast_on_unknown_formats_and_missing_files() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let loader = Loader::new();

    let failure = loader
        .load(
            &TrackInfo::new("Beats"),
            &temp.path().join("beats.xyz"),
            LoadOptions::default(),
        )
        .expect_err("unknown extension");
    assert!(matches!(failure.error, ResultsError::FormatUnsupported(_)));
    assert!(failure.to_string().starts_with("The import of the track Beats failed because"));

    let failure = loader
        .load(
            &TrackInfo::new("Beats"),
            &temp.path().join("missing.json"),
            LoadOptions::default(),
        )
        .expect_err("missing file");
    assert!(matches!(failure.error, ResultsError::StreamAccessFailure { .. }));
    assert!(failure.to_string().starts_with("The import of the track Beats as JSON failed"));
    assert_eq!(loader.state(), TaskState::Idle);
}

#[test]
fn parse_failures_name_the_track_and_format() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("broken.json");
    fs::write(&path, "{\"results\": 3}").expect("write");

    let loader = Loader::new();
    loader
        .load(&TrackInfo::new("Onsets"), &path, LoadOptions::default())
        .expect("load starts");
    let failure = loader.wait().expect("a load was started").expect_err("bad document");
    assert!(matches!(failure.error, ResultsError::ParsingError(_)));
    assert!(
        failure
            .to_string()
            .starts_with("The import of the track Onsets as JSON failed because")
    );
}

#[test]
fn a_background_export_releases_the_store() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("chords.csv");
    let store = ResultsStore::new(chord_markers());

    let options = ExportOptions {
        include_header: true,
        ..ExportOptions::new(Format::Csv)
    };
    let exporter = Exporter::new();
    exporter
        .export(&store, &TrackInfo::new("Chords"), &path, options)
        .expect("snapshot taken");
    let written = exporter.wait().expect("an export was started").expect("export succeeds");
    assert_eq!(written, path);
    assert_eq!(store.gate().reader_count(), 0);
    assert!((exporter.progress() - 1.0).abs() < f32::EPSILON);

    let text = fs::read_to_string(&path).expect("csv should be readable");
    assert!(text.starts_with("TIME,DURATION,LABEL\n0.023219955,0,\"N\"\n"));
    assert!(store.replace(spectrum_columns()));
}

#[test]
fn configured_defaults_drive_exports() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let config_path = temp.path().join("resultlane.config.toml");
    fs::write(
        &config_path,
        "[export]\nseparator = \"pipe\"\ninclude_header = false\nuse_end_time = true\n",
    )
    .expect("write config");
    let config = ResultsConfig::load_from(&config_path).expect("config parses");
    assert_eq!(config.export.separator, ColumnSeparator::Pipe);

    let path = temp.path().join("chords.csv");
    let options = config.export.options_for(&path).expect("csv is known");
    export_file(&chord_markers(), &demo_track(), &path, &options, None, &Control::default())
        .expect("export should succeed");
    let text = fs::read_to_string(&path).expect("csv should be readable");
    assert_eq!(text.lines().next(), Some("0.023219955|0.023219955|\"N\""));
}
