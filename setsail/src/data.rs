use crate::{addon::KdumpAddonData, SetsailError};

/// Everything the parser collected from a kickstart.
#[derive(Debug, Default)]
pub(crate) struct ParsedData {
    /// The kdump add-on section, if the kickstart has one.
    pub kdump: Option<KdumpAddonData>,

    /// Non-fatal findings raised by section handlers.
    pub warnings: Vec<SetsailError>,
}
