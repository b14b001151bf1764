use std::path::Path;

use super::types::{KSLine, KSLineSource};

/// Number every line and remember where it came from, so errors can point
/// back at it.
fn lines_to_kslines(contents: &str, source: KSLineSource) -> Vec<KSLine> {
    contents
        .lines()
        .enumerate()
        .map(|(i, s)| KSLine::new(source.clone(), i + 1, s.to_string()))
        .collect()
}

pub fn load_to_kslines(path: &Path, source: KSLineSource) -> Result<Vec<KSLine>, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    Ok(lines_to_kslines(&contents, source))
}

pub fn load_kickstart_file(filename: &Path) -> Result<Vec<KSLine>, std::io::Error> {
    load_to_kslines(filename, KSLineSource::File(filename.to_owned()))
}

pub fn load_kickstart_string(contents: &str) -> Vec<KSLine> {
    lines_to_kslines(contents, KSLineSource::InputString)
}
