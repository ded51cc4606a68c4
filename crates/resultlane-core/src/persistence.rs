use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::error::{Result, ResultsError};

fn scratch_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf)
}

fn scratch_file(path: &Path) -> Result<NamedTempFile> {
    let directory = scratch_dir(path);
    tempfile::Builder::new()
        .prefix(".resultlane-")
        .suffix(".part")
        .tempfile_in(&directory)
        .map_err(|error| ResultsError::StreamAccessFailure {
            path: path.display().to_string(),
            reason: error.to_string(),
        })
}

fn persist(temp_file: NamedTempFile, path: &Path) -> Result<()> {
    temp_file
        .persist(path)
        .map_err(|error| ResultsError::FileAccessFailure {
            path: path.display().to_string(),
            reason: error.error.to_string(),
        })?;
    Ok(())
}

/// Streams `write` into a scratch file next to `path` and moves it over `path`
/// only if `write` succeeds. On failure the scratch file is removed and `path`
/// is left as it was.
#[instrument(skip(write), fields(path = %path.display()))]
pub fn write_atomically(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
) -> Result<()> {
    let mut temp_file = scratch_file(path)?;
    {
        let mut writer = BufWriter::new(&mut temp_file);
        write(&mut writer)?;
        writer.flush().map_err(ResultsError::writing)?;
    }
    temp_file
        .as_file()
        .sync_all()
        .map_err(ResultsError::writing)?;
    persist(temp_file, path)?;
    debug!("destination replaced");
    Ok(())
}

/// Same as [`write_atomically`] for writers that need a path of their own,
/// such as an external converter.
#[instrument(skip(write), fields(path = %path.display()))]
pub fn write_atomically_with_path(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let temp_file = scratch_file(path)?;
    write(temp_file.path())?;
    persist(temp_file, path)?;
    debug!("destination replaced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn success_replaces_the_destination() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("out.csv");
        fs::write(&path, "previous").expect("seed file");
        write_atomically(&path, |writer| {
            writer.write_all(b"0,0,A\n").map_err(ResultsError::writing)
        })
        .expect("write succeeds");
        assert_eq!(fs::read_to_string(&path).expect("written"), "0,0,A\n");
    }

    #[test]
    fn missing_directories_are_not_created() {
        let directory = tempfile::tempdir().expect("temp dir");
        let nested = directory.path().join("nested");
        let result = write_atomically(&nested.join("out.csv"), |_| Err(ResultsError::Aborted));
        assert!(matches!(result, Err(ResultsError::StreamAccessFailure { .. })));
        assert!(!nested.exists());
    }

    #[test]
    fn failure_leaves_the_destination_untouched() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("out.csv");
        fs::write(&path, "previous").expect("seed file");
        let result = write_atomically(&path, |writer| {
            writer.write_all(b"partial").map_err(ResultsError::writing)?;
            Err(ResultsError::Aborted)
        });
        assert!(matches!(result, Err(ResultsError::Aborted)));
        assert_eq!(fs::read_to_string(&path).expect("still there"), "previous");
        let leftovers = fs::read_dir(directory.path()).expect("listable").count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn path_writers_get_a_scratch_path() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("out.sdif");
        write_atomically_with_path(&path, |scratch| {
            assert_ne!(scratch, path.as_path());
            fs::write(scratch, b"SDIF").map_err(ResultsError::writing)
        })
        .expect("write succeeds");
        assert_eq!(fs::read(&path).expect("written"), b"SDIF");
    }
}
