// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

//! Unit code generation for systemd and upstart, and the install/uninstall
//! transaction that writes the generated files and drives the init system.

mod errors;
mod exec;
mod exporter;
mod fs;
mod provider;
mod systemd;
mod template;
mod upstart;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::ExportError;
pub use exec::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use exporter::{Config, Exporter};
pub use provider::{Format, Provider, ServiceUnit, service_units, unit_stem, unit_stems};
pub use systemd::Systemd;
pub use upstart::{Upstart, UpstartVersion};
