// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// The target init system can't run something the application needs.
    #[error("{0}")]
    Capability(String),
    #[error("can't render template: {0}")]
    Render(String),
    #[error("application {0} is not installed")]
    NotInstalled(String),
    #[error("can't execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with code {status}: {output}")]
    CommandFailed {
        command: String,
        /// Exit code, or -1 if the process was killed by a signal.
        status: i32,
        output: String,
    },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| ExportError::Io { path, source }
    }
}
