// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Parser;
use export::Format;

use crate::settings::DEFAULT_CONFIG_PATH;

/// Export services described by a Procfile to the init system.
#[derive(Parser, Debug, Clone)]
#[command(name = "init-exporter", version)]
#[command(after_help = "\
Examples:
  init-exporter -p ./myprocfile -f systemd myapp   Export given procfile to systemd as myapp
  init-exporter -u -f systemd myapp                Uninstall myapp from systemd")]
pub struct Args {
    /// Application name
    pub app_name: String,

    /// Path to procfile
    #[arg(short, long, value_name = "FILE")]
    pub procfile: Option<PathBuf>,

    /// Parse and validate the procfile without exporting anything
    #[arg(short, long)]
    pub dry_start: bool,

    /// Skip application validation
    #[arg(short = 'D', long)]
    pub disable_validation: bool,

    /// Remove units and helpers of the application
    #[arg(short, long, visible_alias = "clear")]
    pub uninstall: bool,

    /// Format of generated configs
    #[arg(short, long, value_name = "upstart|systemd")]
    pub format: Option<Format>,

    /// Global settings file
    #[arg(long, value_name = "FILE", env = "INIT_EXPORTER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

/// Convert a v1 Procfile to the v2 format.
#[derive(Parser, Debug, Clone)]
#[command(name = "init-exporter-converter", version)]
pub struct ConvertArgs {
    /// Procfile to convert
    pub procfile: PathBuf,

    /// Global settings file supplying defaults
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Application name
    #[arg(short = 'n', long = "appname")]
    pub app_name: String,

    /// Overwrite the procfile instead of printing the result
    #[arg(short, long)]
    pub in_place: bool,
}

/// Pick the init system: an explicit `--format`, then the binary name, then
/// whichever control program is installed.
pub fn detect_format(
    explicit: Option<Format>,
    program: &str,
    has_program: impl Fn(&str) -> bool,
) -> Result<Format> {
    if let Some(format) = explicit {
        return Ok(format);
    }

    match program {
        "systemd-exporter" => return Ok(Format::Systemd),
        "upstart-exporter" => return Ok(Format::Upstart),
        _ => {}
    }

    if has_program("systemctl") {
        Ok(Format::Systemd)
    } else if has_program("initctl") {
        Ok(Format::Upstart)
    } else {
        bail!("Can't find init provider")
    }
}

/// True if `program` is an executable file somewhere on `PATH`.
pub fn in_path(program: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| {
        dir.join(program)
            .metadata()
            .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    })
}

/// File name of the running binary, used for format detection.
pub fn program_name(argv0: Option<String>) -> String {
    argv0
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
