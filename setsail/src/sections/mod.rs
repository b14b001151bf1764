use std::{collections::HashMap, fmt::Debug};

use log::debug;

use crate::{data::ParsedData, types::KSLine, SetsailError};

pub mod addon;

use addon::AddonHandler;

/// Sections that may legally appear in an installer kickstart but carry
/// nothing for us.
const IGNORED_SECTIONS: &[&str] = &[
    "%anaconda",
    "%onerror",
    "%packages",
    "%post",
    "%pre",
    "%pre-install",
    "%traceback",
];

pub struct SectionManager {
    handlers: HashMap<&'static str, Box<dyn SectionHandler>>,
}

impl Default for SectionManager {
    fn default() -> Self {
        Self {
            handlers: std::iter::once(AddonHandler.boxed())
                .chain(
                    IGNORED_SECTIONS
                        .iter()
                        .map(|&opener| IgnoredSectionHandler { opener }.boxed()),
                )
                .map(|h| (h.opener(), h))
                .collect(),
        }
    }
}

impl SectionManager {
    /// Get a handler for a specific section
    pub(crate) fn get_handler(&self, opener: &str) -> Option<&dyn SectionHandler> {
        self.handlers.get(opener).map(|h| h.as_ref())
    }

    /// Check if a section is known
    pub(crate) fn is_known_section(&self, opener: &str) -> bool {
        self.handlers.contains_key(opener)
    }
}

/// Trait to be implemented by all section handlers
pub trait SectionHandler: Debug {
    /// The verbatim opener for this section
    fn opener(&self) -> &'static str;

    /// Handle the section
    fn handle(
        &self,
        data: &mut ParsedData,
        line: KSLine,
        tokens: Vec<String>,
        body: Vec<String>,
    ) -> Result<(), SetsailError>;

    /// Box this handler
    fn boxed(self) -> Box<dyn SectionHandler>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Handler for sections we recognize but do nothing with.
#[derive(Debug)]
struct IgnoredSectionHandler {
    opener: &'static str,
}

impl SectionHandler for IgnoredSectionHandler {
    fn opener(&self) -> &'static str {
        self.opener
    }

    fn handle(
        &self,
        _: &mut ParsedData,
        header: KSLine,
        _: Vec<String>,
        body: Vec<String>,
    ) -> Result<(), SetsailError> {
        debug!("Skipping section {} ({} lines)", header, body.len());
        Ok(())
    }
}
