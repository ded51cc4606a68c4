//! The `.dat` format: a 6-byte tag followed by `{u64 count, record * count}`
//! blocks, one per channel, until the end of the stream. Numbers are
//! little-endian and records carry no padding.

use std::io::{self, Read, Write};

use tracing::{debug, instrument};

use crate::{
    control::Control,
    error::{Result, ResultsError},
    model::{Column, Frame, Marker, Point, Results, ResultsData},
    selection::Selection,
};

pub const MARKERS_TAG: [u8; 6] = *b"PTLM01";
pub const POINTS_TAG: [u8; 6] = *b"PTLP01";
pub const COLUMNS_TAG: [u8; 6] = *b"PTLC01";
pub const LEGACY_MARKERS_TAG: [u8; 6] = *b"PTLMKS";
pub const LEGACY_POINTS_TAG: [u8; 6] = *b"PTLPTS";
pub const LEGACY_COLUMNS_TAG: [u8; 6] = *b"PTLCLS";

const PROGRESS_STRIDE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    Legacy,
    Current,
}

#[instrument(skip_all, fields(shape = %results.shape(), channels = results.num_channels()))]
pub fn write_binary<W: Write>(
    results: &Results,
    writer: &mut W,
    selection: &Selection,
    control: &Control,
) -> Result<()> {
    let mut encoder = Encoder { writer };
    let total = results.num_frames();
    match results.data() {
        ResultsData::Markers(channels) => {
            encoder.bytes(&MARKERS_TAG)?;
            write_channels(&mut encoder, channels, selection, control, total, |encoder, marker: &Marker| {
                encoder.f64(marker.time)?;
                encoder.f64(marker.duration)?;
                encoder.len(marker.label.len())?;
                encoder.bytes(marker.label.as_bytes())?;
                encoder.floats(&marker.extra)
            })?;
        }
        ResultsData::Points(channels) => {
            encoder.bytes(&POINTS_TAG)?;
            write_channels(&mut encoder, channels, selection, control, total, |encoder, point: &Point| {
                encoder.f64(point.time)?;
                encoder.f64(point.duration)?;
                match point.value {
                    Some(value) => {
                        encoder.bytes(&[1])?;
                        encoder.bytes(&value.to_le_bytes())?;
                    }
                    None => encoder.bytes(&[0])?,
                }
                encoder.floats(&point.extra)
            })?;
        }
        ResultsData::Columns(channels) => {
            encoder.bytes(&COLUMNS_TAG)?;
            write_channels(&mut encoder, channels, selection, control, total, |encoder, column: &Column| {
                encoder.f64(column.time)?;
                encoder.f64(column.duration)?;
                encoder.floats(&column.values)?;
                encoder.floats(&column.extra)
            })?;
        }
    }
    encoder.writer.flush().map_err(ResultsError::writing)?;
    control.report(1.0);
    Ok(())
}

/// Reads a `.dat` stream. `len_hint` is the stream length in bytes, used only
/// for progress.
#[instrument(skip_all)]
pub fn read_binary<R: Read>(reader: R, len_hint: Option<u64>, control: &Control) -> Result<Results> {
    let mut decoder = Decoder {
        reader,
        consumed: 0,
        len_hint,
    };
    let tag: [u8; 6] = decoder.array("format tag")?;
    let results = match tag {
        MARKERS_TAG | LEGACY_MARKERS_TAG => {
            let generation = generation_of(tag);
            Results::markers(read_channels(&mut decoder, control, |decoder| {
                let time = decoder.f64()?;
                let duration = decoder.f64()?;
                let length = decoder.u64()?;
                let label = decoder.label(length)?;
                let extra = decoder.extra(generation)?;
                Ok(Marker {
                    time,
                    duration,
                    label,
                    extra,
                })
            })?)
        }
        POINTS_TAG | LEGACY_POINTS_TAG => {
            let generation = generation_of(tag);
            Results::points(read_channels(&mut decoder, control, |decoder| {
                let time = decoder.f64()?;
                let duration = decoder.f64()?;
                let value = match decoder.array::<1>("point flag")? {
                    [0] => None,
                    [1] => Some(decoder.f32()?),
                    [flag] => {
                        return Err(ResultsError::parsing(format!(
                            "invalid point flag {flag}"
                        )));
                    }
                };
                let extra = decoder.extra(generation)?;
                Ok(Point {
                    time,
                    duration,
                    value,
                    extra,
                })
            })?)
        }
        COLUMNS_TAG | LEGACY_COLUMNS_TAG => {
            let generation = generation_of(tag);
            Results::columns(read_channels(&mut decoder, control, |decoder| {
                let time = decoder.f64()?;
                let duration = decoder.f64()?;
                let bins = decoder.u64()?;
                let values = decoder.floats(bins)?;
                let extra = decoder.extra(generation)?;
                Ok(Column {
                    time,
                    duration,
                    values,
                    extra,
                })
            })?)
        }
        unknown => {
            return Err(ResultsError::parsing(format!(
                "unknown format tag {:?}",
                String::from_utf8_lossy(&unknown)
            )));
        }
    };
    control.report(1.0);
    debug!(
        shape = %results.shape(),
        channels = results.num_channels(),
        frames = results.num_frames(),
        "binary results decoded"
    );
    Ok(results)
}

fn generation_of(tag: [u8; 6]) -> Generation {
    if tag.ends_with(b"01") {
        Generation::Current
    } else {
        Generation::Legacy
    }
}

fn write_channels<F: Frame, W: Write>(
    encoder: &mut Encoder<'_, W>,
    channels: &[Vec<F>],
    selection: &Selection,
    control: &Control,
    total: usize,
    mut encode: impl FnMut(&mut Encoder<'_, W>, &F) -> Result<()>,
) -> Result<()> {
    let mut written = 0_usize;
    for (_, frames) in selection.channels(channels) {
        control.checkpoint()?;
        encoder.len(frames.len())?;
        for frame in frames {
            control.checkpoint()?;
            encode(encoder, frame)?;
            written += 1;
            if written % PROGRESS_STRIDE == 0 {
                control.report_fraction(written, total, 0.0, 1.0);
            }
        }
    }
    Ok(())
}

fn read_channels<F: Frame, R: Read>(
    decoder: &mut Decoder<R>,
    control: &Control,
    mut decode: impl FnMut(&mut Decoder<R>) -> Result<F>,
) -> Result<Vec<Vec<F>>> {
    let mut channels = Vec::new();
    while let Some(count) = decoder.frame_count()? {
        control.checkpoint()?;
        let count = usize::try_from(count)
            .map_err(|_| ResultsError::parsing(format!("frame count {count} overflows")))?;
        let mut frames = Vec::with_capacity(count.min(1 << 12));
        for index in 0..count {
            control.checkpoint()?;
            frames.push(decode(decoder)?);
            if index % PROGRESS_STRIDE == 0 {
                decoder.report(control);
            }
        }
        channels.push(frames);
    }
    Ok(channels)
}

struct Encoder<'a, W> {
    writer: &'a mut W,
}

impl<W: Write> Encoder<'_, W> {
    fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(ResultsError::writing)
    }

    fn f64(&mut self, value: f64) -> Result<()> {
        self.bytes(&value.to_le_bytes())
    }

    fn len(&mut self, len: usize) -> Result<()> {
        self.bytes(&(len as u64).to_le_bytes())
    }

    fn floats(&mut self, values: &[f32]) -> Result<()> {
        self.len(values.len())?;
        for value in values {
            self.bytes(&value.to_le_bytes())?;
        }
        Ok(())
    }
}

struct Decoder<R> {
    reader: R,
    consumed: u64,
    len_hint: Option<u64>,
}

impl<R: Read> Decoder<R> {
    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buffer = [0_u8; N];
        self.reader
            .read_exact(&mut buffer)
            .map_err(|error| truncated(what, &error))?;
        self.consumed += N as u64;
        Ok(buffer)
    }

    fn f64(&mut self) -> Result<f64> {
        self.array("time").map(f64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32> {
        self.array("value").map(f32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64> {
        self.array("length").map(u64::from_le_bytes)
    }

    /// The count that opens a channel block, or `None` at a clean end of
    /// stream.
    fn frame_count(&mut self) -> Result<Option<u64>> {
        let mut buffer = [0_u8; 8];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(truncated("frame count", &error)),
            }
        }
        self.consumed += filled as u64;
        match filled {
            0 => Ok(None),
            8 => Ok(Some(u64::from_le_bytes(buffer))),
            _ => Err(ResultsError::parsing("truncated frame count")),
        }
    }

    fn payload(&mut self, bytes: u64, what: &str) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        (&mut self.reader)
            .take(bytes)
            .read_to_end(&mut buffer)
            .map_err(|error| truncated(what, &error))?;
        if buffer.len() as u64 != bytes {
            return Err(ResultsError::parsing(format!("truncated {what}")));
        }
        self.consumed += bytes;
        Ok(buffer)
    }

    fn label(&mut self, length: u64) -> Result<String> {
        let bytes = self.payload(length, "label")?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned()))
    }

    fn floats(&mut self, count: u64) -> Result<Vec<f32>> {
        let bytes = count
            .checked_mul(4)
            .ok_or_else(|| ResultsError::parsing(format!("value count {count} overflows")))?;
        let buffer = self.payload(bytes, "values")?;
        Ok(buffer
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    fn extra(&mut self, generation: Generation) -> Result<Vec<f32>> {
        match generation {
            Generation::Legacy => Ok(Vec::new()),
            Generation::Current => {
                let count = self.u64()?;
                self.floats(count)
            }
        }
    }

    fn report(&self, control: &Control) {
        if let Some(len) = self.len_hint.filter(|len| *len > 0) {
            #[allow(clippy::cast_precision_loss)]
            control.report((self.consumed as f64 / len as f64) as f32);
        }
    }
}

fn truncated(what: &str, error: &io::Error) -> ResultsError {
    if error.kind() == io::ErrorKind::UnexpectedEof {
        ResultsError::parsing(format!("truncated {what}"))
    } else {
        ResultsError::parsing(format!("cannot read {what}: {error}"))
    }
}
