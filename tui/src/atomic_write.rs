use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

/// Numbered alternatives tried by [`write_atomic_new`] before giving up.
const MAX_NUMBERED_NAMES: usize = 10_000;

/// Write `contents` to `path` through a temp file in the same directory, then rename it into
/// place. Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = staged(path, contents)?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Like [`write_atomic`], but an existing file is never replaced: when `path` is taken the first
/// free `name (n).ext` beside it is used instead. Returns the path written.
pub fn write_atomic_new(path: &Path, contents: &[u8]) -> io::Result<PathBuf> {
    let mut tmp = staged(path, contents)?;
    for n in 0..MAX_NUMBERED_NAMES {
        let candidate = numbered_path(path, n);
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => tmp = err.file,
            Err(err) => return Err(err.error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name next to {}", path.display()),
    ))
}

fn staged(path: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid path for atomic write: {}", path.display()),
        ));
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    Ok(tmp)
}

/// `path` itself for 0, else `stem (n).ext`.
fn numbered_path(path: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}
