// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use log::{debug, info};
use procfile::Application;

use crate::errors::ExportError;
use crate::fs::{HELPER_PERMS, UNIT_PERMS, create_dir, delete_by_pattern, remove_file, write_file};
use crate::provider::{Provider, service_units};

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Where helper scripts go.
    pub helper_dir: PathBuf,
    /// Where the init system looks for unit files.
    pub target_dir: PathBuf,
    /// Skip enabling (and, on uninstall, disabling) the application unit.
    pub disable_auto_start: bool,
    /// Skip asking the init system to reload its units.
    pub disable_reload: bool,
}

/// Installs and removes one application's generated files. State is never
/// cached: whether an application is installed is read from disk every time.
pub struct Exporter<'a> {
    config: Config,
    provider: Box<dyn Provider + 'a>,
}

impl<'a> Exporter<'a> {
    pub fn new(config: Config, provider: Box<dyn Provider + 'a>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn is_installed(&self, app: &Application) -> bool {
        self.app_unit_path(&app.name).exists()
    }

    /// Write every unit and helper for `app`, replacing a previous install.
    /// Files written before a failing step are left in place.
    pub fn install(&self, app: &mut Application) -> Result<(), ExportError> {
        self.provider.check_requirements(app)?;

        if self.is_installed(app) {
            debug!("Application {} is already installed, removing it first", app.name);
            self.uninstall(app)?;
        }

        create_dir(&self.config.helper_dir)?;

        app.reload_helper_path = None;
        if let Some(helper) = self.provider.render_reload_helper_template(app)? {
            let path = self.reload_helper_path(&app.name);
            write_file(&path, &helper, HELPER_PERMS)?;
            app.reload_helper_path = Some(path);
        }

        let app: &Application = app;
        write_file(
            &self.app_unit_path(&app.name),
            &self.provider.render_app_template(app)?,
            UNIT_PERMS,
        )?;

        for unit in service_units(app, &self.config.helper_dir) {
            let unit_path = self
                .config
                .target_dir
                .join(self.provider.unit_name(&unit.stem()));
            write_file(
                &unit_path,
                &self.provider.render_service_template(&unit)?,
                UNIT_PERMS,
            )?;
            write_file(
                unit.helper_path(),
                &self.provider.render_helper_template(&unit)?,
                HELPER_PERMS,
            )?;
        }

        if !self.config.disable_auto_start {
            self.provider.enable_service(&app.name)?;
            debug!("Service {} enabled", app.name);
        }
        if !self.config.disable_reload {
            self.provider.reload()?;
        }

        info!("Application {} installed", app.name);
        Ok(())
    }

    /// Remove the application unit and every file matching the application's
    /// unit and helper naming pattern.
    pub fn uninstall(&self, app: &Application) -> Result<(), ExportError> {
        if !self.is_installed(app) {
            return Err(ExportError::NotInstalled(app.name.clone()));
        }

        if !self.config.disable_auto_start {
            self.provider.disable_service(&app.name)?;
            debug!("Service {} disabled", app.name);
        }

        remove_file(&self.app_unit_path(&app.name))?;

        let unit_pattern = self.provider.unit_name(&format!("{}_*", app.name));
        let units = delete_by_pattern(&self.config.target_dir, &unit_pattern)?;
        debug!("Removed {} service units", units.len());

        let helpers = delete_by_pattern(&self.config.helper_dir, &format!("{}_*.sh", app.name))?;
        debug!("Removed {} helpers", helpers.len());

        remove_file(&self.reload_helper_path(&app.name))?;

        if !self.config.disable_reload {
            self.provider.reload()?;
        }

        info!("Application {} uninstalled", app.name);
        Ok(())
    }

    fn app_unit_path(&self, app_name: &str) -> PathBuf {
        self.config.target_dir.join(self.provider.unit_name(app_name))
    }

    fn reload_helper_path(&self, app_name: &str) -> PathBuf {
        self.config.helper_dir.join(format!("{app_name}-reload.sh"))
    }
}
