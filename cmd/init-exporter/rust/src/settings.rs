// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use export::Format;
use ie_log::LogConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/init-exporter.yaml";

/// Global settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub main: MainSettings,
    pub procfile: ProcfileSettings,
    pub paths: PathSettings,
    pub defaults: DefaultSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MainSettings {
    pub run_user: String,
    pub run_group: String,
    /// Prepended to every application name.
    pub prefix: String,
}

/// Which Procfile formats are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcfileSettings {
    pub version1: bool,
    pub version2: bool,
}

impl Default for ProcfileSettings {
    fn default() -> Self {
        Self {
            version1: true,
            version2: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub working_dir: PathBuf,
    pub helper_dir: PathBuf,
    pub systemd_dir: PathBuf,
    pub upstart_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/tmp"),
            helper_dir: PathBuf::from("/var/local/init-exporter/helpers"),
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            upstart_dir: PathBuf::from("/etc/init"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefaultSettings {
    pub nproc: i64,
    pub nofile: i64,
    pub memlock: i64,
    pub respawn: bool,
    pub respawn_count: i64,
    pub respawn_interval: i64,
    pub respawn_delay: i64,
    pub kill_timeout: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub enabled: bool,
    pub file: Option<PathBuf>,
    /// Octal mode, e.g. `644`.
    pub perms: String,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file: Some(PathBuf::from("/var/log/init-exporter.log")),
            perms: "644".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Read and deserialize the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("Config {} does not exist", path.display());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Config {} is not readable", path.display()))?;
        if contents.trim().is_empty() {
            bail!("Config {} is empty", path.display());
        }

        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Every problem with the settings, not just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.main.run_user.is_empty() {
            errors.push("Property main.run_user must be set".to_string());
        } else if uzers::get_user_by_name(&self.main.run_user).is_none() {
            errors.push(format!(
                "Property main.run_user contains user {} which does not exist on this system",
                self.main.run_user
            ));
        }
        if self.main.run_group.is_empty() {
            errors.push("Property main.run_group must be set".to_string());
        } else if uzers::get_group_by_name(&self.main.run_group).is_none() {
            errors.push(format!(
                "Property main.run_group contains group {} which does not exist on this system",
                self.main.run_group
            ));
        }

        for (key, dir) in [
            ("paths.working_dir", &self.paths.working_dir),
            ("paths.helper_dir", &self.paths.helper_dir),
            ("paths.systemd_dir", &self.paths.systemd_dir),
            ("paths.upstart_dir", &self.paths.upstart_dir),
        ] {
            if dir.as_os_str().is_empty() {
                errors.push(format!("Property {key} must be set"));
            }
        }
        if !self.paths.working_dir.as_os_str().is_empty() && !self.paths.working_dir.is_dir() {
            errors.push(format!(
                "Property paths.working_dir must be path to a directory ({})",
                self.paths.working_dir.display()
            ));
        }

        let d = &self.defaults;
        for (key, value) in [
            ("defaults.nproc", d.nproc),
            ("defaults.nofile", d.nofile),
            ("defaults.respawn_count", d.respawn_count),
            ("defaults.respawn_interval", d.respawn_interval),
            ("defaults.respawn_delay", d.respawn_delay),
            ("defaults.kill_timeout", d.kill_timeout),
        ] {
            if value < 0 {
                errors.push(format!("Property {key} can't be less than 0"));
            }
        }
        if d.memlock < procfile::MEMLOCK_UNLIMITED {
            errors.push("Property defaults.memlock can't be less than -1".to_string());
        }

        if self.log.enabled {
            if self.log.file.as_ref().is_some_and(|f| f.as_os_str().is_empty()) {
                errors.push("Property log.file can't be empty".to_string());
            }
            if parse_perms(&self.log.perms).is_none() {
                errors.push(format!(
                    "Property log.perms contains invalid file mode \"{}\"",
                    self.log.perms
                ));
            }
        }

        errors
    }

    pub fn full_app_name(&self, app_name: &str) -> String {
        format!("{}{app_name}", self.main.prefix)
    }

    /// Defaults handed to the Procfile parser for one application.
    pub fn procfile_config(&self, app_name: &str) -> procfile::Config {
        let d = &self.defaults;
        procfile::Config {
            name: self.full_app_name(app_name),
            user: self.main.run_user.clone(),
            group: self.main.run_group.clone(),
            working_dir: self.paths.working_dir.to_string_lossy().into_owned(),
            is_respawn_enabled: d.respawn,
            respawn_interval: d.respawn_interval,
            respawn_count: d.respawn_count,
            respawn_delay: d.respawn_delay,
            kill_timeout: d.kill_timeout,
            limit_file: d.nofile,
            limit_proc: d.nproc,
            limit_memlock: d.memlock,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.log.enabled,
            file: self.log.file.clone().filter(|f| !f.as_os_str().is_empty()),
            perms: parse_perms(&self.log.perms).unwrap_or(ie_log::DEFAULT_LOG_PERMS),
            level: ie_log::parse_level(&self.log.level),
        }
    }

    pub fn target_dir(&self, format: Format) -> &Path {
        match format {
            Format::Systemd => &self.paths.systemd_dir,
            Format::Upstart => &self.paths.upstart_dir,
        }
    }

    pub fn export_config(&self, format: Format) -> export::Config {
        export::Config {
            helper_dir: self.paths.helper_dir.clone(),
            target_dir: self.target_dir(format).to_path_buf(),
            ..export::Config::default()
        }
    }
}

fn parse_perms(perms: &str) -> Option<u32> {
    u32::from_str_radix(perms.trim(), 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}
