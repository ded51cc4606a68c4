use std::{fs, path::Path, sync::Arc};

use resultlane_core::{
    Cancellation, Control, ExportOptions, Exporter, Format, LoadOptions, Loader, Progress,
    ResultsError, ResultsStore, TaskState, TrackInfo,
    export::export_file,
    fixtures::{JsonSdifConverter, chord_markers, demo_track, pitch_points},
    loader::load_file,
    model::{Marker, Results},
    sdif::{MatrixFrame, SdifConverter, Signature},
};

const PREVIOUS: &str = "previous export";

fn many_markers(count: usize) -> Results {
    #[allow(clippy::cast_precision_loss)]
    let frames = (0..count)
        .map(|index| Marker::new(index as f64 * 0.01, 0.01, format!("m{index}")))
        .collect();
    Results::markers(vec![frames])
}

fn directory_entries(path: &Path) -> usize {
    fs::read_dir(path).expect("directory should be listable").count()
}

/// Cancels the running export once `after` matrices went through.
struct CancellingConverter {
    cancellation: Cancellation,
    after: usize,
}

impl SdifConverter for CancellingConverter {
    fn read(
        &self,
        path: &Path,
        select: &dyn Fn(Signature, Signature) -> bool,
        visit: &mut dyn FnMut(MatrixFrame) -> resultlane_core::error::Result<()>,
    ) -> resultlane_core::error::Result<()> {
        JsonSdifConverter.read(path, select, visit)
    }

    fn write(
        &self,
        path: &Path,
        frame: Signature,
        matrix: Signature,
        column_name: &str,
        frames: &mut dyn Iterator<Item = resultlane_core::error::Result<MatrixFrame>>,
    ) -> resultlane_core::error::Result<()> {
        let mut counted = frames.enumerate().map(|(index, frame)| {
            if index + 1 == self.after {
                self.cancellation.cancel();
            }
            frame
        });
        JsonSdifConverter.write(path, frame, matrix, column_name, &mut counted)
    }
}

#[test]
fn cancelled_exports_leave_the_destination_untouched() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let cancellation = Cancellation::new();
    cancellation.cancel();
    let control = Control::new(cancellation, Progress::new());

    for format in [Format::Binary, Format::Csv, Format::Lab, Format::Json, Format::Cue] {
        let path = temp.path().join(format!("chords.{}", format.extension()));
        fs::write(&path, PREVIOUS).expect("seed destination");
        let error = export_file(
            &chord_markers(),
            &demo_track(),
            &path,
            &ExportOptions::new(format),
            None,
            &control,
        )
        .expect_err("export is cancelled");
        assert!(error.is_aborted(), "{format}: {error}");
        assert_eq!(fs::read_to_string(&path).expect("destination"), PREVIOUS);
    }
    assert_eq!(directory_entries(temp.path()), 5, "no scratch file is left behind");
}

#[test]
fn an_export_cancelled_midway_leaves_the_destination_untouched() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("chords.sdif");
    fs::write(&path, PREVIOUS).expect("seed destination");

    let cancellation = Cancellation::new();
    let converter = CancellingConverter {
        cancellation: cancellation.clone(),
        after: 2,
    };
    let control = Control::new(cancellation, Progress::new());
    let signature: Signature = "1MRK".parse().expect("valid signature");
    let mut options = ExportOptions::new(Format::Sdif);
    options.sdif.frame = signature;
    options.sdif.matrix = signature;

    let error = export_file(
        &chord_markers(),
        &demo_track(),
        &path,
        &options,
        Some(&converter),
        &control,
    )
    .expect_err("export is cancelled after two matrices");
    assert!(matches!(error, ResultsError::Aborted));
    assert_eq!(fs::read_to_string(&path).expect("destination"), PREVIOUS);
    assert_eq!(directory_entries(temp.path()), 1);
}

#[test]
fn cancelled_loads_yield_no_results() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("chords.dat");
    export_file(
        &chord_markers(),
        &demo_track(),
        &path,
        &ExportOptions::new(Format::Binary),
        None,
        &Control::default(),
    )
    .expect("export should succeed");

    let cancellation = Cancellation::new();
    cancellation.cancel();
    let error = load_file(
        &path,
        &LoadOptions::default(),
        None,
        &Control::new(cancellation, Progress::new()),
    )
    .expect_err("load is cancelled");
    assert!(error.is_aborted());
}

#[test]
fn a_background_load_is_either_complete_or_aborted() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("many.csv");
    let count = 200_000;
    export_file(
        &many_markers(count),
        &demo_track(),
        &path,
        &ExportOptions::new(Format::Csv),
        None,
        &Control::default(),
    )
    .expect("export should succeed");

    let loader = Loader::new();
    loader
        .load(&TrackInfo::new("Many"), &path, LoadOptions::default())
        .expect("load starts");
    loader.cancel();
    match loader.wait().expect("a load was started") {
        Ok(loaded) => assert_eq!(loaded.results.num_frames(), count),
        Err(failure) => {
            assert!(failure.is_aborted(), "{failure}");
            assert_eq!(
                failure.to_string(),
                "The import of the track Many as CSV has been aborted."
            );
        }
    }
    assert_eq!(loader.state(), TaskState::Idle);
}

#[test]
fn an_export_gives_way_to_a_writer() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("many.json");
    let count = 200_000;
    let store = ResultsStore::new(many_markers(count));

    let exporter = Exporter::new();
    exporter
        .export(&store, &TrackInfo::new("Many"), &path, ExportOptions::new(Format::Json))
        .expect("snapshot taken");
    // Blocks until the export finished or noticed the pending writer.
    assert!(store.replace(pitch_points()));

    match exporter.wait().expect("an export was started") {
        Ok(written) => {
            assert_eq!(written, path);
            let loaded = load_file(&path, &LoadOptions::default(), None, &Control::default())
                .expect("complete export");
            assert_eq!(loaded.results.num_frames(), count);
        }
        Err(failure) => {
            assert!(matches!(failure.error, ResultsError::DataLocked), "{failure}");
            assert!(!path.exists());
        }
    }
    assert_eq!(store.gate().reader_count(), 0);
    assert_eq!(store.try_read().expect("writer is done").num_frames(), 5);
}

#[test]
fn exports_cannot_start_while_a_writer_waits() {
    let store = Arc::new(ResultsStore::new(chord_markers()));
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let blocker = store.try_read().expect("no writer yet");

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| store.replace(pitch_points()));
        while !store.gate().is_writing_requested() {
            std::thread::yield_now();
        }
        let failure = Exporter::new()
            .export(
                &store,
                &TrackInfo::new("Chords"),
                &temp.path().join("chords.json"),
                ExportOptions::new(Format::Json),
            )
            .expect_err("the store is locked");
        assert!(matches!(failure.error, ResultsError::DataLocked));
        drop(blocker);
        assert!(writer.join().expect("writer thread should not panic"));
    });
}
