// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::sync::OnceLock;

use log::debug;
use procfile::{Application, MEMLOCK_UNLIMITED, ServiceOptions};

use crate::errors::ExportError;
use crate::exec::{CommandRunner, run_checked};
use crate::provider::{Provider, ServiceUnit, app_log_dir, render_helper};
use crate::template::{Template, export_date};

const EXTENSION: &str = ".conf";

/// First release that understands `reload signal`.
const MIN_RELOAD_VERSION: UpstartVersion = UpstartVersion(1, 10, 0);

/// Backend for upstart: `.conf` jobs picked up by the daemon on its own.
#[derive(Debug)]
pub struct Upstart<R> {
    runner: R,
    version: OnceLock<UpstartVersion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UpstartVersion(pub u32, pub u32, pub u32);

impl UpstartVersion {
    /// Parse the first line of `init --version`, e.g. `init (upstart 1.12.1)`.
    pub fn from_version_output(output: &str) -> Option<Self> {
        let line = output.lines().next()?;
        let field = line.split_whitespace().nth(2)?;
        let mut parts = field.trim_matches(|c| c == '(' || c == ')').split('.');
        // Missing minor or patch components count as 0.
        let mut next = |required: bool| match parts.next() {
            Some(part) => part.parse::<u32>().ok(),
            None if required => None,
            None => Some(0),
        };

        Some(Self(next(true)?, next(false)?, next(false)?))
    }
}

impl fmt::Display for UpstartVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

impl<R: CommandRunner> Upstart<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            version: OnceLock::new(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Installed upstart version, queried once per provider.
    fn version(&self) -> Result<UpstartVersion, ExportError> {
        if let Some(version) = self.version.get() {
            return Ok(*version);
        }

        let output = run_checked(&self.runner, "init", &["--version"])?;
        let version = UpstartVersion::from_version_output(&output.stdout).ok_or_else(|| {
            ExportError::Capability(format!(
                "can't parse upstart version from \"{}\"",
                output.stdout.trim()
            ))
        })?;
        debug!("Detected upstart {version}");

        Ok(*self.version.get_or_init(|| version))
    }

    fn render_app(&self, app: &Application, date: &str) -> String {
        let log_dir = app_log_dir(app);

        let mut t = Template::new();
        t.line(header("unit", app, date));
        t.block()
            .line(format!("start on {}", start_condition(app)))
            .line(format!("stop on {}", stop_condition(app)));
        t.block().line("pre-start script");
        t.block()
            .line("bash << \"EOF\"")
            .line(format!("  mkdir -p {log_dir}"))
            .line(format!("  chown -R {} {log_dir}", app.user))
            .line(format!("  chgrp -R {} {log_dir}", app.group))
            .line(format!("  chmod -R g+w {log_dir}"))
            .line("EOF");
        t.block().line("end script");
        t.render()
    }

    fn render_service(&self, unit: &ServiceUnit<'_>, date: &str) -> String {
        let app = unit.application();
        let options = &unit.options;
        let log = unit.console_log_path();

        let mut t = Template::new();
        t.line(header("unit", app, date));
        t.block()
            .line(format!("start on starting {}", app.name))
            .line(format!("stop on stopping {}", app.name));

        t.block();
        respawn_stanzas(&mut t, options);

        t.block();
        if options.is_kill_timeout_set() {
            t.line(format!("kill timeout {}", options.kill_timeout));
        }
        if let Some(signal) = options.kill_signal.as_deref().filter(|_| options.is_kill_signal_set())
        {
            t.line(format!("kill signal {signal}"));
        }
        if let Some(signal) = options
            .reload_signal
            .as_deref()
            .filter(|_| options.is_reload_signal_set())
        {
            t.line(format!("reload signal {signal}"));
        }

        t.block();
        limit_stanzas(&mut t, options);

        t.block()
            .line("script")
            .line(format!("  touch {log}"))
            .line(format!("  chown {} {log}", app.user))
            .line(format!("  chgrp {} {log}", app.group))
            .line(format!("  chmod g+w {log}"))
            .line(format!(
                "  exec sudo -u {} /bin/bash {} &>>{log}",
                app.user,
                unit.helper_path().display()
            ))
            .line("end script");

        t.render()
    }
}

impl<R: CommandRunner> Provider for Upstart<R> {
    fn check_requirements(&self, app: &Application) -> Result<(), ExportError> {
        if !app.is_reload_signal_set() {
            return Ok(());
        }

        let version = self.version()?;
        if version < MIN_RELOAD_VERSION {
            return Err(ExportError::Capability(format!(
                "Upstart {version} doesn't support reload signal. Upstart {MIN_RELOAD_VERSION} is required."
            )));
        }
        Ok(())
    }

    fn unit_name(&self, name: &str) -> String {
        format!("{name}{EXTENSION}")
    }

    fn render_app_template(&self, app: &Application) -> Result<String, ExportError> {
        Ok(self.render_app(app, &export_date()?))
    }

    fn render_service_template(&self, unit: &ServiceUnit<'_>) -> Result<String, ExportError> {
        Ok(self.render_service(unit, &export_date()?))
    }

    fn render_helper_template(&self, unit: &ServiceUnit<'_>) -> Result<String, ExportError> {
        Ok(render_helper(unit, "upstart", &export_date()?, true))
    }

    // Upstart reloads jobs itself through `reload signal`.
    fn render_reload_helper_template(
        &self,
        _app: &Application,
    ) -> Result<Option<String>, ExportError> {
        Ok(None)
    }

    fn enable_service(&self, _app_name: &str) -> Result<(), ExportError> {
        Ok(())
    }

    fn disable_service(&self, _app_name: &str) -> Result<(), ExportError> {
        Ok(())
    }

    fn reload(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

fn header(kind: &str, app: &Application, date: &str) -> String {
    format!(
        "# This {kind} generated {date} by init-exporter/upstart for {} application",
        app.name
    )
}

fn start_condition(app: &Application) -> String {
    if app.start_device.is_none() && !app.has_dependencies() {
        return format!("runlevel [{}]", app.start_level);
    }

    app.start_device
        .iter()
        .map(|device| format!("net-device-up IFACE={device}"))
        .chain(app.depends.iter().map(|dep| format!("started {dep}")))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn stop_condition(app: &Application) -> String {
    if !app.has_dependencies() {
        return format!("runlevel [{}]", app.stop_level);
    }

    app.depends
        .iter()
        .map(|dep| format!("stopped {dep}"))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn respawn_stanzas(t: &mut Template, options: &ServiceOptions) {
    if !options.is_respawn_enabled() {
        return;
    }

    t.line("respawn");
    if options.is_respawn_limit_set() {
        t.line(format!(
            "respawn limit {} {}",
            options.respawn.count, options.respawn.interval
        ));
    }
    if options.is_respawn_delay_set() {
        t.line(format!("post-stop exec sleep {}", options.respawn.delay));
    }
}

fn limit_stanzas(t: &mut Template, options: &ServiceOptions) {
    let limits = &options.limits;
    if options.is_file_limit_set() {
        t.line(format!("limit nofile {0} {0}", limits.nofile));
    }
    if options.is_proc_limit_set() {
        t.line(format!("limit nproc {0} {0}", limits.nproc));
    }
    if options.is_memlock_limit_set() {
        let memlock = if limits.memlock == MEMLOCK_UNLIMITED {
            "unlimited".to_string()
        } else {
            limits.memlock.to_string()
        };
        t.line(format!("limit memlock {memlock} {memlock}"));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::path::Path;

    use procfile::Service;

    use super::*;
    use crate::provider::service_units;
    use crate::test_utils::{RecordingRunner, app_with, sample_app};

    const DATE: &str = "2026/01/02 03:04:05";

    fn provider() -> Upstart<RecordingRunner> {
        Upstart::new(RecordingRunner::default())
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            UpstartVersion::from_version_output("init (upstart 1.12.1)\nCopyright (C) 2006-2014\n"),
            Some(UpstartVersion(1, 12, 1))
        );
        assert_eq!(
            UpstartVersion::from_version_output("init (upstart 0.6)"),
            Some(UpstartVersion(0, 6, 0))
        );
        assert_eq!(UpstartVersion::from_version_output("init (upstart 1.x)"), None);
        assert_eq!(UpstartVersion::from_version_output("systemd 245"), None);
        assert_eq!(UpstartVersion::from_version_output(""), None);
    }

    #[test]
    fn test_reload_signal_requires_recent_upstart() {
        let upstart = Upstart::new(RecordingRunner::with_stdout("init (upstart 0.6.5)\n"));
        let err = upstart.check_requirements(&sample_app()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Upstart 0.6.5 doesn't support reload signal. Upstart 1.10.0 is required."
        );

        let upstart = Upstart::new(RecordingRunner::with_stdout("init (upstart 1.12.1)\n"));
        upstart.check_requirements(&sample_app()).unwrap();
        upstart.check_requirements(&sample_app()).unwrap();
        assert_eq!(upstart.runner().calls(), vec!["init --version"]);
    }

    #[test]
    fn test_no_version_query_without_reload_signal() {
        let upstart = provider();
        upstart
            .check_requirements(&app_with(vec![Service::new("web", "run")]))
            .unwrap();
        assert!(upstart.runner().calls().is_empty());
    }

    #[test]
    fn test_app_unit_conditions() {
        let mut app = sample_app();
        let unit = provider().render_app(&app, DATE);
        assert!(unit.contains("start on runlevel [3]\nstop on runlevel [3]\n"));
        assert!(unit.contains("  mkdir -p /var/log/myapp\n"));
        assert!(unit.ends_with("end script\n"));

        app.start_device = Some("eth0".into());
        let unit = provider().render_app(&app, DATE);
        assert!(unit.contains("start on net-device-up IFACE=eth0\nstop on runlevel [3]\n"));

        app.start_device = None;
        app.depends = vec!["postgresql".into(), "redis".into()];
        let unit = provider().render_app(&app, DATE);
        assert!(unit.contains("start on started postgresql and started redis\n"));
        assert!(unit.contains("stop on stopped postgresql and stopped redis\n"));
    }

    #[test]
    fn test_partial_respawn_limit() {
        let mut service = Service::new("web", "run");
        service.options.respawn.enabled = Some(true);
        service.options.respawn.count = 5;
        let app = app_with(vec![service]);
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[0], DATE);

        assert!(unit.contains("respawn\n"), "{unit}");
        assert!(!unit.contains("respawn limit"), "{unit}");
    }

    #[test]
    fn test_service_unit() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[0], DATE);

        assert!(unit.contains("start on starting myapp\nstop on stopping myapp\n"));
        assert!(unit.contains("respawn\nrespawn limit 5 15\npost-stop exec sleep 2\n"));
        assert!(unit.contains("kill timeout 30\nkill signal QUIT\nreload signal USR2\n"));
        assert!(unit.contains("limit nofile 4096 4096\n"));
        assert!(unit.contains("limit memlock unlimited unlimited\n"));
        assert!(unit.contains(
            "  exec sudo -u service /bin/bash /h/myapp_web.sh &>>/var/log/myapp/web.log\n"
        ));
        assert!(!unit.contains("CPUQuota"));
    }

    #[test]
    fn test_unset_fields_emit_nothing() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[3], DATE);

        for stanza in ["respawn", "kill ", "reload signal", "limit "] {
            assert!(!unit.contains(stanza), "{stanza} in\n{unit}");
        }
        assert!(unit.contains("  touch /var/log/myapp/worker3.log\n"));
    }

    #[test]
    fn test_helper_changes_directory() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let helper = provider().render_helper_template(&units[1]).unwrap();
        assert!(helper.contains("\ncd /srv/worker && ./bin/prepare && "));
        assert!(helper.contains("by init-exporter/upstart for myapp application"));
    }

    #[test]
    fn test_control_is_noop() {
        let upstart = provider();
        upstart.enable_service("myapp").unwrap();
        upstart.disable_service("myapp").unwrap();
        upstart.reload().unwrap();
        assert!(upstart.render_reload_helper_template(&sample_app()).unwrap().is_none());
        assert!(upstart.runner().calls().is_empty());
        assert_eq!(upstart.unit_name("myapp_web"), "myapp_web.conf");
    }
}
