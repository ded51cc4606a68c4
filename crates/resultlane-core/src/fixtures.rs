use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use uuid::Uuid;

use crate::{
    error::{Result, ResultsError},
    model::{Column, Marker, Point, Results},
    sdif::{MatrixFrame, SdifConverter, Signature},
    track::TrackInfo,
};

/// Two channels of chord markers.
#[must_use]
pub fn chord_markers() -> Results {
    Results::markers(vec![
        vec![
            Marker::new(0.023_219_955, 0.0, "N"),
            Marker::new(1.023_582_767, 0.0, "B7/D#"),
            Marker::new(78.026_122_449, 0.0, "A"),
        ],
        vec![
            Marker::new(0.023_219_955, 0.0, "Z"),
            Marker::new(10.023_582_767, 0.0, "A"),
        ],
    ])
}

/// A pitch curve with an unvoiced gap and one extra output per frame.
#[must_use]
pub fn pitch_points() -> Results {
    let values = [Some(220.0), Some(221.5), None, Some(246.9), Some(247.0)];
    Results::points(vec![
        values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                #[allow(clippy::cast_precision_loss)]
                let time = index as f64 * 0.01;
                let mut point = Point::new(time, 0.01, *value);
                point.extra = vec![if value.is_some() { 0.9 } else { 0.1 }];
                point
            })
            .collect(),
    ])
}

/// A small four-bin spectrum over two channels.
#[must_use]
pub fn spectrum_columns() -> Results {
    let channel = |gain: f32| -> Vec<Column> {
        (0_u8..6)
            .map(|frame| {
                let time = f64::from(frame) * 0.023;
                let level = f32::from(frame);
                Column::new(
                    time,
                    0.023,
                    vec![gain * level, gain * (level + 1.0), gain * 0.5, 0.0],
                )
            })
            .collect()
    };
    Results::columns(vec![channel(1.0), channel(-0.5)])
}

#[must_use]
pub fn demo_track() -> TrackInfo {
    TrackInfo {
        id: Uuid::from_u128(0x9ed0_a3fa_4064_458f_b95f_1fdd_0bc4_f0be),
        ..TrackInfo::new("Chords").with_property("plugin", "chordino:simplechord")
    }
}

/// Keeps SDIF matrices in a JSON file. Stands in for a real SDIF codec in
/// tests and demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSdifConverter;

impl SdifConverter for JsonSdifConverter {
    fn read(
        &self,
        path: &Path,
        select: &dyn Fn(Signature, Signature) -> bool,
        visit: &mut dyn FnMut(MatrixFrame) -> Result<()>,
    ) -> Result<()> {
        let file = File::open(path).map_err(|error| ResultsError::StreamAccessFailure {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        let frames: Vec<MatrixFrame> = serde_json::from_reader(BufReader::new(file))
            .map_err(|error| ResultsError::parsing(error.to_string()))?;
        for frame in frames {
            if select(frame.frame, frame.matrix) {
                visit(frame)?;
            }
        }
        Ok(())
    }

    fn write(
        &self,
        path: &Path,
        _frame: Signature,
        _matrix: Signature,
        _column_name: &str,
        frames: &mut dyn Iterator<Item = Result<MatrixFrame>>,
    ) -> Result<()> {
        let frames = frames.collect::<Result<Vec<_>>>()?;
        let file = File::create(path).map_err(|error| ResultsError::StreamAccessFailure {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &frames)?;
        writer.flush().map_err(ResultsError::writing)
    }
}
