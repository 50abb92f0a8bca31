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

pub mod cli;
pub mod settings;

use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use export::{CommandRunner, Exporter, Format, SystemCommandRunner};
use log::{debug, info};
use procfile::{Application, ProcVersion};

use crate::cli::{Args, ConvertArgs};
use crate::settings::Settings;

/// How much checking a parsed application gets before export.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checks {
    pub dry_start: bool,
    pub disable_validation: bool,
}

impl Checks {
    /// Validation can only be skipped for a real export.
    fn should_validate(self) -> bool {
        self.dry_start || !self.disable_validation
    }
}

/// Entry point of `init-exporter`. `program` is the binary's file name.
pub fn run(args: &Args, program: &str) -> Result<()> {
    if !args.uninstall && args.procfile.is_none() {
        bail!("You should define path to procfile");
    }
    if !args.dry_start {
        check_for_root()?;
    }

    let settings = Settings::load(&args.config)?;
    let errors = settings.validate();
    if !errors.is_empty() {
        bail!(batch("Errors while config validation:", &errors));
    }

    ie_log::init(&settings.log_config()).context("can't initialize logger")?;

    let checks = Checks {
        dry_start: args.dry_start,
        disable_validation: args.disable_validation,
    };

    match args.procfile.as_deref() {
        Some(procfile) if !args.uninstall => {
            let mut app = read_application(&settings, &args.app_name, procfile, checks)?;
            if checks.dry_start {
                info!("Procfile {} for {} is valid", procfile.display(), app.name);
                return Ok(());
            }

            let format = cli::detect_format(args.format, program, cli::in_path)?;
            exporter(&settings, format, SystemCommandRunner)?.install(&mut app)?;
            info!("User {} installed service {}", current_user(), app.name);
        }
        _ => {
            let app = bare_application(&settings, &args.app_name);
            let format = cli::detect_format(args.format, program, cli::in_path)?;
            exporter(&settings, format, SystemCommandRunner)?.uninstall(&app)?;
            info!("User {} uninstalled service {}", current_user(), app.name);
        }
    }

    Ok(())
}

/// Read `procfile`, apply the format gates from `settings` and validate the
/// result unless `checks` says otherwise.
pub fn read_application(
    settings: &Settings,
    app_name: &str,
    procfile: &Path,
    checks: Checks,
) -> Result<Application> {
    let app = procfile::read(procfile, &settings.procfile_config(app_name))?;

    match app.proc_version {
        ProcVersion::V1 if !settings.procfile.version1 => {
            bail!("Proc format version 1 support is disabled")
        }
        ProcVersion::V2 if !settings.procfile.version2 => {
            bail!("Proc format version 2 support is disabled")
        }
        _ => {}
    }

    if checks.should_validate() {
        let errors = procfile::validate(&app);
        if !errors.is_empty() {
            bail!(batch("Errors while application validation:", &errors));
        }
    } else {
        debug!("Validation of {} is disabled", app.name);
    }

    Ok(app)
}

/// Exporter writing into the settings' directories for `format`.
pub fn exporter<'a, R: CommandRunner + 'a>(
    settings: &Settings,
    format: Format,
    runner: R,
) -> Result<Exporter<'a>> {
    let target_dir = settings.target_dir(format);
    if !target_dir.is_dir() {
        bail!(
            "Target directory {} for {format} does not exist",
            target_dir.display()
        );
    }

    Ok(Exporter::new(
        settings.export_config(format),
        format.provider(runner),
    ))
}

/// Only the name matters when removing an application.
pub fn bare_application(settings: &Settings, app_name: &str) -> Application {
    Application::new(
        ProcVersion::V2,
        &settings.procfile_config(app_name),
        Vec::new(),
    )
}

/// Entry point of `init-exporter-converter`. Returns the converted document,
/// or `None` when it was written back in place.
pub fn convert(args: &ConvertArgs) -> Result<Option<String>> {
    let settings = match args.config.as_deref() {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let config = settings.procfile_config(&args.app_name);

    let app = procfile::read(&args.procfile, &config)?;
    if app.proc_version != ProcVersion::V1 {
        bail!("Given procfile already converted to v2 format");
    }

    let data = procfile::convert::to_v2(&app, &config)?;
    if !args.in_place {
        return Ok(Some(data));
    }

    fs::write(&args.procfile, data)
        .with_context(|| format!("can't write {}", args.procfile.display()))?;
    Ok(None)
}

fn check_for_root() -> Result<()> {
    if uzers::get_effective_uid() != 0 {
        bail!("This utility must have superuser privileges (root)");
    }
    Ok(())
}

fn current_user() -> String {
    uzers::get_current_username()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| uzers::get_current_uid().to_string())
}

fn batch(title: &str, errors: &[impl Display]) -> String {
    let mut message = title.to_string();
    for error in errors {
        message.push_str(&format!("\n  - {error}"));
    }
    message
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message() {
        assert_eq!(
            batch("Errors while config validation:", &["a", "b"]),
            "Errors while config validation:\n  - a\n  - b"
        );
    }

    #[test]
    fn test_checks() {
        assert!(Checks::default().should_validate());
        assert!(
            !Checks {
                disable_validation: true,
                ..Checks::default()
            }
            .should_validate()
        );
        assert!(
            Checks {
                dry_start: true,
                disable_validation: true,
            }
            .should_validate()
        );
    }

    #[test]
    fn test_bare_application_uses_prefix() {
        let mut settings = Settings::default();
        settings.main.prefix = "fb-".into();
        let app = bare_application(&settings, "shop");
        assert_eq!(app.name, "fb-shop");
        assert!(app.services.is_empty());
    }
}
