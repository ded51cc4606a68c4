use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Binary,
    Csv,
    Lab,
    Json,
    Cue,
    Reaper,
    /// Space separated messages ending with `;`, for Pure Data text objects.
    PureData,
    /// Same layout as [`Format::PureData`], for Max text objects.
    Max,
    Sdif,
}

impl Format {
    /// Resolves the format from the extension of `path`. Reaper files share the
    /// `csv` extension and Pure Data or Max messages use `txt`, so those can
    /// only be requested explicitly.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self::from_extension(&extension).ok_or_else(|| {
            ResultsError::unsupported(format!(
                "the extension '{extension}' of {} is not recognized",
                path.display()
            ))
        })
    }

    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.') {
            "dat" => Some(Self::Binary),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "lab" => Some(Self::Lab),
            "cue" => Some(Self::Cue),
            "sdif" => Some(Self::Sdif),
            _ => None,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Binary => "dat",
            Self::Csv | Self::Reaper => "csv",
            Self::Lab => "lab",
            Self::Json => "json",
            Self::Cue => "cue",
            Self::PureData | Self::Max => "txt",
            Self::Sdif => "sdif",
        }
    }

    /// Formats that can only carry labelled markers.
    #[must_use]
    pub fn is_marker_only(self) -> bool {
        matches!(self, Self::Cue | Self::Reaper)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Binary => "binary",
            Self::Csv => "CSV",
            Self::Lab => "LAB",
            Self::Json => "JSON",
            Self::Cue => "CUE",
            Self::Reaper => "Reaper",
            Self::PureData => "Pure Data",
            Self::Max => "Max",
            Self::Sdif => "SDIF",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSeparator {
    #[default]
    Comma,
    Space,
    Tab,
    Pipe,
    Slash,
    Colon,
}

impl ColumnSeparator {
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Comma => ',',
            Self::Space => ' ',
            Self::Tab => '\t',
            Self::Pipe => '|',
            Self::Slash => '/',
            Self::Colon => ':',
        }
    }

    #[must_use]
    pub fn from_char(separator: char) -> Option<Self> {
        match separator {
            ',' => Some(Self::Comma),
            ' ' => Some(Self::Space),
            '\t' => Some(Self::Tab),
            '|' => Some(Self::Pipe),
            '/' => Some(Self::Slash),
            ':' => Some(Self::Colon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaperType {
    #[default]
    Marker,
    Region,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_dispatch_case_insensitively() {
        assert_eq!(
            Format::from_path(Path::new("a/b/beats.DAT")).ok(),
            Some(Format::Binary)
        );
        assert_eq!(
            Format::from_path(Path::new("chords.lab")).ok(),
            Some(Format::Lab)
        );
        assert_eq!(
            Format::from_path(Path::new("sheet.cue")).ok(),
            Some(Format::Cue)
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let error = Format::from_path(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(error, ResultsError::FormatUnsupported(_)));
        assert!(Format::from_path(Path::new("no_extension")).is_err());
        // Message files are written as .txt but never guessed from it.
        assert_eq!(Format::PureData.extension(), "txt");
        assert_eq!(Format::Max.extension(), "txt");
    }

    #[test]
    fn separators_convert_both_ways() {
        for separator in [
            ColumnSeparator::Comma,
            ColumnSeparator::Space,
            ColumnSeparator::Tab,
            ColumnSeparator::Pipe,
            ColumnSeparator::Slash,
            ColumnSeparator::Colon,
        ] {
            assert_eq!(ColumnSeparator::from_char(separator.as_char()), Some(separator));
        }
        assert_eq!(ColumnSeparator::from_char(';'), None);
    }
}
