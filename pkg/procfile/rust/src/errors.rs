// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort reading a Procfile.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Format(String),
    #[error("can't parse \"{key}\" value: {reason}")]
    Property { key: String, reason: String },
    #[error("procfile {} {reason}", path.display())]
    File { path: PathBuf, reason: &'static str },
    #[error("can't render procfile: {0}")]
    Render(String),
    #[error("can't read procfile {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn property(key: &str, reason: impl Into<String>) -> Self {
        Error::Property {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single broken invariant found by the validator. Validation reports all of
/// them at once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{which} run level {value} is out of range (1-6)")]
    RunLevel { which: &'static str, value: i64 },
    #[error("value \"{0}\" is insecure and can't be accepted")]
    Value(String),
    #[error("service name \"{0}\" is not valid")]
    ServiceName(String),
    #[error("service \"{0}\" is defined more than once")]
    DuplicateService(String),
    #[error("service instance \"{0}\" is generated by more than one service")]
    DuplicateInstance(String),
    #[error("network device name \"{0}\" is not valid")]
    Device(String),
    #[error("dependency name \"{0}\" is not valid")]
    Dependency(String),
    #[error("service \"{service}\": {field} path \"{path}\" is unsafe and can't be accepted")]
    UnsafePath {
        service: String,
        field: &'static str,
        path: String,
    },
    #[error("service \"{service}\": {field} can't be negative ({value})")]
    Negative {
        service: String,
        field: &'static str,
        value: i64,
    },
    #[error("service \"{service}\": unknown kill mode \"{value}\"")]
    KillMode { service: String, value: String },
    #[error("service \"{service}\": unknown {field} \"{value}\"")]
    Signal {
        service: String,
        field: &'static str,
        value: String,
    },
    #[error("service \"{service}\": environment variable name \"{name}\" is not valid")]
    EnvName { service: String, name: String },
    #[error(
        "service \"{service}\": environment variable {name} has unquoted whitespace or '*' in its value"
    )]
    EnvValue { service: String, name: String },
}
