//! sysdefs (System Definitions) is a dependency-light crate meant exclusively
//! to contain definitions for simple, basic, or axiomatic system/OS concepts.
//!
//! As the name implies, the crate mainly provides definitions, and should
//! contain minimal or no behavior at all.

pub mod arch;
