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

//! Procfile front-end: format detection, the v1 and v2 grammars, option
//! resolution and validation.
//!
//! Everything here is single-threaded and does no locking; concurrent runs
//! against the same application are not coordinated.

pub mod convert;
mod detect;
mod errors;
mod model;
mod resolve;
mod v1;
mod v2;
mod validate;

use std::fs;
use std::io;
use std::path::Path;

use log::debug;

pub use detect::detect_version;
pub use errors::{Error, ValidationError};
pub use model::{
    Application, Config, DEFAULT_RUN_LEVEL, LinkedService, Limits, MEMLOCK_UNLIMITED,
    ProcVersion, Resources, RespawnOptions, Service, ServiceOptions, resolve_path,
};
pub use resolve::{fill_from_config, merge_shared, resolve};
pub use validate::{is_safe_path, validate};

/// Output of either grammar before option resolution.
#[derive(Debug)]
pub(crate) struct Parsed {
    pub application: Application,
    /// Options declared once for every service. Empty for v1.
    pub shared: ServiceOptions,
}

/// Read and parse the Procfile at `path`.
pub fn read(path: impl AsRef<Path>, config: &Config) -> Result<Application, Error> {
    let path = path.as_ref();
    debug!("Processing file {}", path.display());

    let metadata = fs::metadata(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::File {
            path: path.to_path_buf(),
            reason: "does not exist",
        },
        _ => Error::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if !metadata.is_file() {
        return Err(Error::File {
            path: path.to_path_buf(),
            reason: "is not a regular file",
        });
    }
    if metadata.len() == 0 {
        return Err(Error::File {
            path: path.to_path_buf(),
            reason: "is empty",
        });
    }

    let data = fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse(&data, config)
}

/// Detect the format of `data`, parse it and resolve every service's options
/// against the shared block and `config`.
pub fn parse(data: &[u8], config: &Config) -> Result<Application, Error> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::Format(format!("procfile is not valid UTF-8: {e}")))?;

    let version = detect_version(data);
    debug!("Detected procfile v{version}");

    let Parsed {
        mut application,
        shared,
    } = match version {
        ProcVersion::V1 => v1::parse(text, config)?,
        ProcVersion::V2 => v2::parse(text, config)?,
    };

    resolve(&mut application, &shared, config);

    Ok(application)
}
