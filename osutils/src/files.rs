use std::{
    fs::Permissions,
    io::{ErrorKind, Write},
    os::unix::fs::PermissionsExt,
    path::Path,
};

use anyhow::{bail, Context, Error};

/// Creates all directories in a path if they don't exist
pub fn create_dirs<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    std::fs::create_dir_all(path.as_ref()).context(format!(
        "Could not create path: {}",
        path.as_ref().display()
    ))
}

/// Reads the content of a file and trims it
pub fn read_file_trim<S>(file_path: &S) -> Result<String, Error>
where
    S: AsRef<Path>,
{
    let content = std::fs::read_to_string(file_path.as_ref()).context(format!(
        "Could not read file contents: {:?}",
        file_path.as_ref()
    ))?;
    Ok(content.trim().to_string())
}

/// Like `read_file_trim`, but a missing file reads as `None`.
pub fn read_file_trim_if_exists<S>(file_path: &S) -> Result<Option<String>, Error>
where
    S: AsRef<Path>,
{
    match std::fs::read_to_string(file_path.as_ref()) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context(format!(
            "Could not read file contents: {:?}",
            file_path.as_ref()
        )),
    }
}

/// Replaces the contents of a file in one step.
///
/// The new contents go to a temporary file next to `path` which is then
/// renamed over it, so readers see either the old or the new file. An existing
/// file keeps its permissions, a new one gets `default_mode`.
pub fn write_file_atomic<S>(path: S, default_mode: u32, contents: &[u8]) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    let path = path.as_ref();
    let mode = match std::fs::metadata(path) {
        Ok(metadata) if !metadata.is_file() => {
            bail!("Path exists but is not a file: {}", path.display())
        }
        Ok(metadata) => metadata.permissions().mode(),
        Err(e) if e.kind() == ErrorKind::NotFound => default_mode,
        Err(e) => {
            return Err(e).context(format!("Could not get metadata for {}", path.display()))
        }
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dirs(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)
        .context(format!("Failed to create temporary file in {}", parent.display()))?;
    file.write_all(contents)
        .context(format!("Could not write to file: {}", file.path().display()))?;
    file.as_file()
        .set_permissions(Permissions::from_mode(mode))
        .context(format!(
            "Could not set permissions {mode:#o} for file {}",
            file.path().display()
        ))?;
    file.persist(path)
        .context(format!("Could not replace file: {}", path.display()))?;

    Ok(())
}
