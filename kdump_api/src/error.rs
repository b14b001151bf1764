use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Invalid memory reservation '{value}': {reason}")]
    InvalidReservation { value: String, reason: String },
    #[error("Failed to load configuration file from '{path}'")]
    LoadConfiguration { path: String },
    #[error("Failed to parse configuration")]
    ParseConfiguration,
    #[error("Failed to load kickstart file from '{path}'")]
    LoadKickstart { path: String },
    #[error("Failed to parse kickstart")]
    ParseKickstart,
}

/// Writing the dump configuration into the bootloader failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigurationError {
    #[error("Failed to read the bootloader arguments")]
    ReadBootArguments,
    #[error("Bootloader rejected the new argument list")]
    ConfigurationApplyFailure,
}

/// Enabling kdump on the target system failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InstallationError {
    #[error("Failed to enable '{service}'")]
    ServiceEnableFailure { service: String },
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Failed to serialize output")]
    SerializeOutput,
    #[error("Panicked: {0}")]
    Panic(String),
}

/// Each variant of `ErrorKind` corresponds to a different category of error.
/// The categories are meant to tell the user whether to fix their input, look
/// at the target system, or report a bug.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The configuration, kickstart, or reservation given to us was invalid.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// The bootloader arguments could not be read or written.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The kdump service could not be enabled on the target system.
    #[error(transparent)]
    Installation(#[from] InstallationError),

    /// A bug was encountered.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct KdumpErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct KdumpError(Box<KdumpErrorInner>);
impl KdumpError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        KdumpError(Box::new(KdumpErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        KdumpError(Box::new(KdumpErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(msg: &'static str) -> Self {
        Self::new(InternalError::Internal(msg))
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured KdumpError.
    fn structured(self, kind: K) -> Result<T, KdumpError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, KdumpError> {
        match self {
            Some(t) => Ok(t),
            None => Err(KdumpError::new(kind)),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, KdumpError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(KdumpError::with_source(kind, e.into())),
        }
    }
}

pub trait KdumpResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, KdumpError>;
}

impl<T> KdumpResultExt<T> for Result<T, KdumpError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, KdumpError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for KdumpError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("kdump-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Configuration(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Installation(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{e:?}")))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for KdumpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{i: >5}: ")?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{index: >5}: ")?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn test_error_serialize() {
        let e = KdumpError(Box::new(KdumpErrorInner {
            kind: ErrorKind::InvalidInput(InvalidInputError::ParseConfiguration),
            location: Location::caller(),
            source: Some(
                std::fs::read("/non-existant-file")
                    .context("failed to read file")
                    .unwrap_err(),
            ),
            context: Vec::new(),
        }));
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m.len(), 5);
                assert_eq!(m["error"], Value::String("parse-configuration".into()));
                assert_eq!(m["category"], Value::String("invalid-input".into()));
                assert!(matches!(m["cause"], Value::String(_)));
                assert_eq!(
                    m["message"],
                    Value::String("Failed to parse configuration".into())
                );
                match m["location"] {
                    Value::String(ref s) => assert!(s.contains("error.rs:")),
                    _ => panic!("location isn't string"),
                }
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_serialize_struct_variant() {
        let e = KdumpError::new(InstallationError::ServiceEnableFailure {
            service: "kdump.service".into(),
        });
        match serde_yaml::to_value(e).unwrap() {
            Value::Mapping(m) => {
                assert_eq!(m["category"], Value::String("installation".into()));
                assert_eq!(
                    m["message"],
                    Value::String("Failed to enable 'kdump.service'".into())
                );
                assert_eq!(m["cause"], Value::Null);
            }
            _ => panic!("value isn't mapping"),
        }
    }

    #[test]
    fn test_error_debug() {
        let error = Err::<(), _>(anyhow::anyhow!("z"))
            .context("x\ny")
            .structured(InternalError::Internal("w"))
            .unwrap_err();
        assert_eq!(
            format!("{error:?}"),
            format!(
                "Internal error: w at {}:{}\n\nCaused by:\n    0: x\n       y\n    1: z\n",
                error.0.location.file(),
                error.0.location.line(),
            ),
        );
    }

    #[test]
    fn test_error_message_context() {
        let error = Err::<(), _>(KdumpError::new(ConfigurationError::ReadBootArguments))
            .message("Failed to configure kdump")
            .unwrap_err();
        let report = format!("{error:?}");
        assert!(report.starts_with("Failed to read the bootloader arguments at "));
        assert!(report.contains("Context:\n    0: Failed to configure kdump at "));
        assert_eq!(
            error.kind(),
            &ErrorKind::Configuration(ConfigurationError::ReadBootArguments)
        );
    }
}
