//! Kickstart support for the kdump add-on.
//!
//! Reads the `%addon com_redhat_kdump` section out of an installer kickstart
//! and renders it back. Everything else in the kickstart is skipped.

mod addon;
mod data;
mod errors;
mod load;
mod parser;
mod sections;
mod types;

// Republish
pub use addon::KdumpAddonData;
pub use errors::{SetsailError, SetsailErrorList, SetsailErrorType};
pub use load::{load_kickstart_file, load_kickstart_string};
pub use types::{KSLine, KSLineSource};

use log::{debug, info};

use parser::Parser;

/// Main parser struct
/// This is the outward facing interface to the parser
#[derive(Debug)]
pub struct KsTranslator {
    /// Whether missing %include files should be errors
    flag_include_fail_is_error: bool,

    /// Whether to print errors and warnings as such or just print them as debug
    flag_verbose: bool,
}

impl KsTranslator {
    pub fn new() -> Self {
        Self {
            flag_include_fail_is_error: true,
            flag_verbose: false,
        }
    }

    pub fn include_fail_is_error(mut self, error: bool) -> Self {
        self.flag_include_fail_is_error = error;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.flag_verbose = verbose;
        self
    }

    /// Extract the kdump add-on data. A kickstart without the section yields
    /// the defaults, with kdump disabled.
    ///
    /// Warnings are logged and do not fail the translation.
    pub fn translate(self, lines: &[KSLine]) -> Result<KdumpAddonData, Vec<SetsailError>> {
        debug!("Parsing {} kickstart lines", lines.len());
        let mut parser = Parser::new();
        parser.include_fail_is_error(self.flag_include_fail_is_error);
        parser.verbose_errors(self.flag_verbose);
        parser.parse(lines);

        let errors: Vec<SetsailError> = parser
            .consume_errors()
            .into_iter()
            .filter(|e| !e.is_warning())
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        match parser.data.kdump {
            Some(data) => {
                info!("Found %addon section: {}", data.to_string().trim_end());
                Ok(data)
            }
            None => {
                info!("No kdump %addon section found, using defaults");
                Ok(KdumpAddonData::default())
            }
        }
    }
}

impl Default for KsTranslator {
    fn default() -> Self {
        Self::new()
    }
}
