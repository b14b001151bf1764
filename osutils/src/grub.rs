use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Error};
use log::trace;
use regex::{Captures, Regex};

use crate::files;

/// Name of the variable holding the kernel arguments of every boot entry.
pub const CMDLINE_VARIABLE: &str = "GRUB_CMDLINE_LINUX";

// Match a full assignment line, optionally exported and followed by a
// comment. Capture group 1 is the prefix up to and including `=`, the value
// lands in group 2 (double quoted), 3 (single quoted) or 4 (unquoted), group 5
// is whatever trails the value.
const CMDLINE_PATTERN: &str = r#"(?m)^([ \t]*(?:export[ \t]+)?GRUB_CMDLINE_LINUX=)(?:"([^"\n]*)"|'([^'\n]*)'|([^\s#"']*))([ \t]*(?:#.*)?)$"#;

// Start of any assignment of the variable, parseable or not.
const ASSIGNMENT_PATTERN: &str = r"(?m)^[ \t]*(?:export[ \t]+)?GRUB_CMDLINE_LINUX=";

/// Mode given to a defaults file that did not exist before.
const DEFAULTS_FILE_MODE: u32 = 0o644;

/// The GRUB defaults file (`/etc/default/grub`), limited to the kernel
/// arguments that grub2-mkconfig copies into every boot entry.
#[derive(Debug)]
pub struct GrubDefaults {
    path: PathBuf,
    contents: String,
}

impl GrubDefaults {
    /// Load the defaults file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        if !path.as_ref().exists() {
            bail!(
                "GRUB defaults do not exist at path: '{}'",
                path.as_ref().display()
            );
        }

        Ok(Self {
            path: path.as_ref().to_owned(),
            contents: fs::read_to_string(path.as_ref())
                .context(format!("Failed to read file '{}'", path.as_ref().display()))?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the last assignment of the kernel arguments; the file is sourced
    /// by a shell so the last one wins.
    ///
    /// Fails when some assignment cannot be parsed, since editing around it
    /// would silently drop the arguments it sets.
    fn find_cmdline(&self) -> Result<Option<Captures<'_>>, Error> {
        let parsed: Vec<Captures<'_>> = Regex::new(CMDLINE_PATTERN)?
            .captures_iter(&self.contents)
            .collect();
        let assignments = Regex::new(ASSIGNMENT_PATTERN)?
            .find_iter(&self.contents)
            .count();
        if assignments != parsed.len() {
            bail!(
                "Unsupported {CMDLINE_VARIABLE} assignment in '{}'",
                self.path.display()
            );
        }

        Ok(parsed.into_iter().last())
    }

    /// The kernel arguments, in order. A file without the variable has none.
    pub fn cmdline_arguments(&self) -> Result<Vec<String>, Error> {
        let Some(captures) = self.find_cmdline()? else {
            trace!("No {CMDLINE_VARIABLE} in '{}'", self.path.display());
            return Ok(Vec::new());
        };

        let value = (2..=4)
            .find_map(|group| captures.get(group))
            .map(|m| m.as_str())
            .unwrap_or_default();
        trace!("Found {CMDLINE_VARIABLE}: {value}");

        Ok(value.split_whitespace().map(str::to_owned).collect())
    }

    /// Replace the kernel arguments. The variable is appended when the file
    /// does not set it yet.
    pub fn set_cmdline_arguments<S: AsRef<str>>(&mut self, arguments: &[S]) -> Result<(), Error> {
        let value = arguments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        if value.contains('"') {
            bail!("Kernel arguments must not contain '\"': {value}");
        }

        // Only the value is replaced, the prefix and a trailing comment stay.
        let range = self
            .find_cmdline()?
            .and_then(|c| Some(c.get(1)?.end()..c.get(5)?.start()));
        match range {
            Some(range) => {
                self.contents
                    .replace_range(range, &format!("\"{value}\""));
            }
            None => {
                if !self.contents.is_empty() && !self.contents.ends_with('\n') {
                    self.contents.push('\n');
                }
                self.contents += &format!("{CMDLINE_VARIABLE}=\"{value}\"\n");
            }
        }

        Ok(())
    }

    /// Write the defaults back to disk
    pub fn write(&self) -> Result<(), Error> {
        files::write_file_atomic(&self.path, DEFAULTS_FILE_MODE, self.contents.as_bytes())
            .context(format!("Failed to write file '{}'", self.path.display()))
    }
}
