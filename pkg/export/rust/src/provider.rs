// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use procfile::{Application, LinkedService, Service};

use crate::errors::ExportError;
use crate::exec::CommandRunner;
use crate::systemd::Systemd;
use crate::template::Template;
use crate::upstart::Upstart;

/// Code generation and control for one init system.
pub trait Provider {
    /// Fail if the host's init system can't run `app` as declared.
    fn check_requirements(&self, app: &Application) -> Result<(), ExportError>;

    /// `name` with the init system's unit file extension.
    fn unit_name(&self, name: &str) -> String;

    fn render_app_template(&self, app: &Application) -> Result<String, ExportError>;

    fn render_service_template(&self, unit: &ServiceUnit<'_>) -> Result<String, ExportError>;

    fn render_helper_template(&self, unit: &ServiceUnit<'_>) -> Result<String, ExportError>;

    /// Script reloading every service of `app`, if the init system needs one
    /// and some service defines a reload signal.
    fn render_reload_helper_template(
        &self,
        app: &Application,
    ) -> Result<Option<String>, ExportError>;

    fn enable_service(&self, app_name: &str) -> Result<(), ExportError>;

    fn disable_service(&self, app_name: &str) -> Result<(), ExportError>;

    /// Make the init system pick up changed unit files.
    fn reload(&self) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Systemd,
    Upstart,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Systemd => "systemd",
            Format::Upstart => "upstart",
        }
    }

    pub fn provider<'a, R: CommandRunner + 'a>(self, runner: R) -> Box<dyn Provider + 'a> {
        match self {
            Format::Systemd => Box::new(Systemd::new(runner)),
            Format::Upstart => Box::new(Upstart::new(runner)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "systemd" => Ok(Format::Systemd),
            "upstart" => Ok(Format::Upstart),
            other => Err(format!("unknown format \"{other}\" (expected systemd or upstart)")),
        }
    }
}

/// One rendered instance of a service: a unit file plus its helper script.
#[derive(Debug, Clone)]
pub struct ServiceUnit<'a> {
    service: LinkedService<'a>,
    /// 1-based index for multi-instance services.
    instance: Option<i64>,
    helper_path: PathBuf,
}

impl<'a> ServiceUnit<'a> {
    pub fn new(service: LinkedService<'a>, instance: Option<i64>, helper_dir: &Path) -> Self {
        let stem = unit_stem(&service.application().name, &instance_name(&service, instance));
        Self {
            service,
            instance,
            helper_path: helper_dir.join(format!("{stem}.sh")),
        }
    }

    pub fn application(&self) -> &'a Application {
        self.service.application()
    }

    pub fn instance(&self) -> Option<i64> {
        self.instance
    }

    /// Service name plus the instance index, if any.
    pub fn name(&self) -> String {
        instance_name(&self.service, self.instance)
    }

    /// Unit file name without extension.
    pub fn stem(&self) -> String {
        unit_stem(&self.application().name, &self.name())
    }

    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// Console log every instance writes to under `/var/log/<app>`.
    pub fn console_log_path(&self) -> String {
        format!("{}/{}.log", app_log_dir(self.application()), self.name())
    }
}

impl<'a> Deref for ServiceUnit<'a> {
    type Target = LinkedService<'a>;

    fn deref(&self) -> &LinkedService<'a> {
        &self.service
    }
}

/// Expand every service of `app` into its rendered instances.
pub fn service_units<'a>(app: &'a Application, helper_dir: &Path) -> Vec<ServiceUnit<'a>> {
    app.linked_services()
        .flat_map(|service| {
            instances(&service)
                .into_iter()
                .map(move |instance| ServiceUnit::new(service, instance, helper_dir))
        })
        .collect()
}

/// Unit stems of every rendered instance, in declaration order.
pub fn unit_stems(app: &Application) -> Vec<String> {
    app.services
        .iter()
        .flat_map(|service| service.options.instance_names(&service.name))
        .map(|name| unit_stem(&app.name, &name))
        .collect()
}

pub fn unit_stem(app_name: &str, service_name: &str) -> String {
    format!("{app_name}_{service_name}")
}

pub(crate) fn app_log_dir(app: &Application) -> String {
    format!("/var/log/{}", app.name)
}

fn instances(service: &Service) -> Vec<Option<i64>> {
    if service.options.is_multi_instance() {
        (1..=service.options.count).map(Some).collect()
    } else {
        vec![None]
    }
}

fn instance_name(service: &Service, instance: Option<i64>) -> String {
    match instance {
        Some(index) => format!("{}{index}", service.name),
        None => service.name.clone(),
    }
}

/// Shell helper shared by both backends. `cd_first` prepends a `cd` into the
/// working directory for init systems that don't set it themselves.
pub(crate) fn render_helper(
    unit: &ServiceUnit<'_>,
    generator: &str,
    date: &str,
    cd_first: bool,
) -> String {
    let mut chain = String::new();
    if cd_first {
        chain.push_str(&format!("cd {} && ", unit.working_dir()));
    }
    chain.push_str(&command_chain(unit));

    let mut t = Template::new();
    t.line("#!/bin/bash");
    t.block().line(format!(
        "# This helper generated {date} by init-exporter/{generator} for {} application",
        unit.application().name
    ));
    t.block()
        .line("[[ -r /etc/profile.d/rbenv.sh ]] && source /etc/profile.d/rbenv.sh")
        .line("[[ -r /etc/profile.d/pyenv.sh ]] && source /etc/profile.d/pyenv.sh");
    t.block().line(chain);
    t.render()
}

/// `pre && main && post`. The main stage carries the environment and the
/// custom log redirect, and replaces the shell when nothing runs after it.
pub(crate) fn command_chain(unit: &ServiceUnit<'_>) -> String {
    let options = &unit.options;

    let mut main = String::new();
    if unit.post_cmd.is_none() {
        main.push_str("exec ");
    }
    if options.is_env_set() || options.is_env_file_set() {
        main.push_str("env ");
        if options.is_env_set() {
            main.push_str(&options.env_string());
            main.push(' ');
        }
        if let Some(env_file) = unit.full_env_file_path() {
            main.push_str(&format!(
                "$(grep -Ev '^\\s*(#|$)' {env_file} 2>/dev/null | xargs) "
            ));
        }
    }
    main.push_str(&unit.cmd);
    if let Some(log) = unit.full_log_path().filter(|_| options.is_custom_log_enabled()) {
        main.push_str(&format!(" &>>{log}"));
    }

    [unit.pre_cmd.as_deref(), Some(main.as_str()), unit.post_cmd.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" && ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::test_utils::sample_app;

    #[test]
    fn test_format_from_str() {
        assert_eq!("systemd".parse::<Format>(), Ok(Format::Systemd));
        assert_eq!("upstart".parse::<Format>(), Ok(Format::Upstart));
        assert!("sysv".parse::<Format>().is_err());
        assert_eq!(Format::Upstart.to_string(), "upstart");
    }

    #[test]
    fn test_instance_expansion() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/var/local/helpers"));
        let stems: Vec<String> = units.iter().map(ServiceUnit::stem).collect();

        assert_eq!(
            stems,
            vec!["myapp_web", "myapp_worker1", "myapp_worker2", "myapp_worker3"]
        );
        assert_eq!(stems, unit_stems(&app));
        assert_eq!(
            units[2].helper_path(),
            Path::new("/var/local/helpers/myapp_worker2.sh")
        );
        assert_eq!(units[2].instance(), Some(2));
        assert_eq!(units[2].name, "worker");
        assert_eq!(units[2].console_log_path(), "/var/log/myapp/worker2.log");
        assert_eq!(units[0].instance(), None);
    }

    #[test]
    fn test_command_chain_single_stage() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        assert_eq!(
            command_chain(&units[0]),
            "exec env PORT=8080 RACK_ENV=production ./bin/web &>>/srv/myapp/log/web.log"
        );
    }

    #[test]
    fn test_command_chain_with_pre_post_and_env_file() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        assert_eq!(
            command_chain(&units[1]),
            "./bin/prepare && env $(grep -Ev '^\\s*(#|$)' /srv/worker/.env 2>/dev/null | xargs) \
             ./bin/worker && ./bin/cleanup"
        );
    }

    #[test]
    fn test_helper_script() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let helper = render_helper(&units[0], "upstart", "2026/01/02 03:04:05", true);
        let lines: Vec<&str> = helper.lines().collect();

        assert_eq!(lines[0], "#!/bin/bash");
        assert_eq!(
            lines[2],
            "# This helper generated 2026/01/02 03:04:05 by init-exporter/upstart for myapp application"
        );
        assert_eq!(lines[4], "[[ -r /etc/profile.d/rbenv.sh ]] && source /etc/profile.d/rbenv.sh");
        assert_eq!(lines[5], "[[ -r /etc/profile.d/pyenv.sh ]] && source /etc/profile.d/pyenv.sh");
        assert!(lines[7].starts_with("cd /srv/myapp && exec env PORT=8080"));
        assert_eq!(lines.len(), 8);
    }
}
