use std::path::PathBuf;

use serde::Serialize;

/// Represents a line in a kickstart file
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct KSLine {
    /// Origin of this kickstart line
    pub source: KSLineSource,
    /// Line number in the source
    pub lineno: usize,
    /// The raw line
    pub raw: String,
}

impl KSLine {
    pub fn new(source: KSLineSource, lineno: usize, raw: String) -> Self {
        Self {
            source,
            lineno,
            raw,
        }
    }
}

impl std::fmt::Display for KSLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} \"{}\"", self.source, self.lineno, self.raw)
    }
}

/// Represents the source of a line in a kickstart file
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub enum KSLineSource {
    #[default]
    Unknown,
    InputString,
    File(PathBuf),
    Include(PathBuf, Box<KSLine>),
}

impl KSLineSource {
    pub fn new_include(file: PathBuf, line: &KSLine) -> Self {
        Self::Include(file, Box::new(line.clone()))
    }
}

impl std::fmt::Display for KSLineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KSLineSource::Unknown => write!(f, "Unknown"),
            KSLineSource::InputString => write!(f, "InputString"),
            KSLineSource::File(filename) => write!(f, "{}", filename.display()),
            KSLineSource::Include(file, line) => {
                write!(
                    f,
                    "{}:{}>include({})",
                    line.source,
                    line.lineno,
                    file.display()
                )
            }
        }
    }
}
