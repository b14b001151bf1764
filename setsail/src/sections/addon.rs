use clap::Parser;
use log::debug;

use kdump_api::{
    config::ReservedMemory,
    constants::{KICKSTART_ADDON_NAME, RESERVED_MEMORY_AUTO},
};

use crate::{
    addon::KdumpAddonData, data::ParsedData, errors::ToResultSetsailError,
    sections::SectionHandler, types::KSLine, SetsailError,
};

/// Header arguments of `%addon com_redhat_kdump`.
#[derive(Parser, Debug)]
#[command(name = KICKSTART_ADDON_NAME, disable_help_flag = true)]
struct KdumpAddonArgs {
    /// Enable kdump
    #[arg(long, overrides_with = "disable")]
    enable: bool,

    /// Disable kdump
    #[arg(long, overrides_with = "enable")]
    disable: bool,

    /// Amount of memory in MB to reserve for kdump
    #[arg(long = "reserve-mb", default_value = RESERVED_MEMORY_AUTO)]
    reserve_mb: String,

    /// Enable dump mode fadump
    #[arg(long)]
    enablefadump: bool,
}

/// Dispatches `%addon` sections, only `com_redhat_kdump` is read.
#[derive(Debug)]
pub struct AddonHandler;

impl AddonHandler {
    fn parse_header(line: &KSLine, tokens: &[String]) -> Result<KdumpAddonData, SetsailError> {
        // The add-on name doubles as the program name for clap
        let args = KdumpAddonArgs::try_parse_from(tokens).to_result_parser_error(line)?;

        // Quotes and a single final 'M' are accepted for consistency with
        // the crashkernel kernel argument, the unit is stripped by the parser.
        let value = args.reserve_mb.trim_matches(|c| c == '\'' || c == '"');
        let reserve_mb = value.parse::<ReservedMemory>().map_err(|_| {
            SetsailError::new_semantic(
                line.clone(),
                format!("Invalid value '{value}' for --reserve-mb"),
            )
        })?;

        Ok(KdumpAddonData {
            enabled: !args.disable,
            reserve_mb,
            enablefadump: args.enablefadump,
        })
    }
}

impl SectionHandler for AddonHandler {
    fn opener(&self) -> &'static str {
        "%addon"
    }

    fn handle(
        &self,
        data: &mut ParsedData,
        line: KSLine,
        tokens: Vec<String>,
        body: Vec<String>,
    ) -> Result<(), SetsailError> {
        match tokens.get(1).map(String::as_str) {
            Some(KICKSTART_ADDON_NAME) => {}
            Some(name) => {
                debug!("Skipping %addon {name} ({} lines)", body.len());
                return Ok(());
            }
            None => {
                return Err(SetsailError::new_syntax(
                    line,
                    "%addon expects the name of an add-on".into(),
                ))
            }
        }

        // The section body carries no settings
        if body.iter().any(|l| !l.trim().is_empty()) {
            debug!("Ignoring body of {}", line);
        }

        let parsed = Self::parse_header(&line, &tokens[1..])?;
        if data.kdump.replace(parsed).is_some() {
            data.warnings.push(SetsailError::new_sem_warn(
                line,
                format!("Multiple %addon {KICKSTART_ADDON_NAME} sections, the last one is used"),
            ));
        }

        Ok(())
    }
}
