// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use procfile::{Application, MEMLOCK_UNLIMITED, Resources, ServiceOptions};

use crate::errors::ExportError;
use crate::exec::{CommandRunner, run_checked};
use crate::provider::{Provider, ServiceUnit, app_log_dir, render_helper, unit_stems};
use crate::template::{Template, export_date};

const EXTENSION: &str = ".service";

/// Longest `Wants=` line emitted for the application unit.
const MAX_WANTS_LINE: usize = 1536;

/// Backend for systemd: `.service` units driven through `systemctl`.
#[derive(Debug)]
pub struct Systemd<R> {
    runner: R,
}

impl<R: CommandRunner> Systemd<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn systemctl(&self, args: &[&str]) -> Result<(), ExportError> {
        run_checked(&self.runner, "systemctl", args).map(|_| ())
    }

    fn render_app(&self, app: &Application, date: &str) -> String {
        let target = target(app.start_level);

        let mut t = Template::new();
        t.line(header("unit", app, date));
        t.block().line("[Unit]");
        t.block()
            .directive("Description", format!("Unit for {} application", app.name))
            .directive("After", target);

        if let Some(device) = app.start_device.as_deref() {
            let device_unit = format!("sys-subsystem-net-devices-{device}.device");
            t.directive("BindsTo", &device_unit)
                .directive("After", &device_unit);
        }
        if app.has_dependencies() {
            let deps = app
                .depends
                .iter()
                .map(|dep| format!("{dep}{EXTENSION}"))
                .collect::<Vec<_>>()
                .join(" ");
            let key = if app.strong_dependencies {
                "Requires"
            } else {
                "Wants"
            };
            t.directive(key, &deps).directive("After", &deps);
        }

        t.block();
        for line in self.wants_lines(app) {
            t.line(line);
        }

        let log_dir = app_log_dir(app);
        t.block()
            .line("[Service]")
            .directive("Type", "oneshot")
            .directive("RemainAfterExit", "true");
        t.block()
            .directive("ExecStartPre", format!("/bin/mkdir -p {log_dir}"))
            .directive("ExecStartPre", format!("/bin/chown -R {} {log_dir}", app.user))
            .directive("ExecStartPre", format!("/bin/chgrp -R {} {log_dir}", app.group))
            .directive("ExecStartPre", format!("/bin/chmod -R g+w {log_dir}"))
            .directive("ExecStart", format!("/bin/echo \"{} started\"", app.name))
            .directive("ExecStop", format!("/bin/echo \"{} stopped\"", app.name))
            .directive_opt(
                "ExecReload",
                app.reload_helper_path
                    .as_ref()
                    .map(|path| format!("/bin/bash {}", path.display())),
            );

        t.block().line("[Install]").directive("WantedBy", target);
        t.render()
    }

    /// `Wants=` over every expanded child unit, split so no line runs past
    /// [`MAX_WANTS_LINE`] characters.
    fn wants_lines(&self, app: &Application) -> Vec<String> {
        const PREFIX: &str = "Wants=";

        let mut lines = Vec::new();
        let mut current = String::new();

        for stem in unit_stems(app) {
            let name = self.unit_name(&stem);
            if !current.is_empty() && PREFIX.len() + current.len() + 1 + name.len() > MAX_WANTS_LINE
            {
                lines.push(format!("{PREFIX}{current}"));
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&name);
        }

        if !current.is_empty() {
            lines.push(format!("{PREFIX}{current}"));
        }
        lines
    }

    fn render_service(&self, unit: &ServiceUnit<'_>, date: &str) -> String {
        let app = unit.application();
        let options = &unit.options;
        let log = unit.console_log_path();

        let mut t = Template::new();
        t.line(header("unit", app, date));
        t.block().line("[Unit]");
        t.block()
            .directive(
                "Description",
                format!(
                    "Unit for {} service (part of {} application)",
                    unit.name(),
                    app.name
                ),
            )
            .directive("PartOf", self.unit_name(&app.name));

        t.block().line("[Service]").directive("Type", "simple");

        t.block()
            .directive_opt("KillMode", options.kill_mode.as_deref().filter(|_| options.is_kill_mode_set()))
            .directive_opt(
                "KillSignal",
                options
                    .kill_signal
                    .as_deref()
                    .filter(|_| options.is_kill_signal_set())
                    .map(signal_name),
            )
            .directive_opt(
                "TimeoutStopSec",
                Some(options.kill_timeout).filter(|_| options.is_kill_timeout_set()),
            );

        t.block();
        respawn_directives(&mut t, options);

        t.block();
        limit_directives(&mut t, options);

        if let Some(resources) = options.resources.as_ref() {
            t.block();
            resource_directives(&mut t, resources);
        }

        t.block()
            .directive("ExecStartPre", format!("/bin/touch {log}"))
            .directive("ExecStartPre", format!("/bin/chown {} {log}", app.user))
            .directive("ExecStartPre", format!("/bin/chgrp {} {log}", app.group))
            .directive("ExecStartPre", format!("/bin/chmod g+w {log}"));

        t.block()
            .directive("User", &app.user)
            .directive("Group", &app.group)
            .directive("WorkingDirectory", unit.working_dir())
            .directive(
                "ExecStart",
                format!(
                    "/bin/sh -c '/bin/bash {} &>>{log}'",
                    unit.helper_path().display()
                ),
            )
            .directive_opt(
                "ExecReload",
                options
                    .reload_signal
                    .as_deref()
                    .filter(|_| options.is_reload_signal_set())
                    .map(|sig| format!("/bin/kill -{} $MAINPID", signal_name(sig))),
            );

        t.render()
    }

    fn render_reload_helper(&self, app: &Application, date: &str) -> Option<String> {
        if !app.is_reload_signal_set() {
            return None;
        }

        let units = unit_stems(app)
            .iter()
            .map(|stem| self.unit_name(stem))
            .collect::<Vec<_>>()
            .join(" ");

        let mut t = Template::new();
        t.line("#!/bin/bash");
        t.block().line(header("helper", app, date));
        t.block()
            .line(format!("systemctl reload-or-restart {units}"));
        Some(t.render())
    }
}

impl<R: CommandRunner> Provider for Systemd<R> {
    fn check_requirements(&self, _app: &Application) -> Result<(), ExportError> {
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
        Ok(render_helper(unit, "systemd", &export_date()?, false))
    }

    fn render_reload_helper_template(
        &self,
        app: &Application,
    ) -> Result<Option<String>, ExportError> {
        Ok(self.render_reload_helper(app, &export_date()?))
    }

    fn enable_service(&self, app_name: &str) -> Result<(), ExportError> {
        self.systemctl(&["enable", &self.unit_name(app_name)])
    }

    fn disable_service(&self, app_name: &str) -> Result<(), ExportError> {
        self.systemctl(&["disable", &self.unit_name(app_name)])
    }

    fn reload(&self) -> Result<(), ExportError> {
        self.systemctl(&["daemon-reload"])
    }
}

fn header(kind: &str, app: &Application, date: &str) -> String {
    format!(
        "# This {kind} generated {date} by init-exporter/systemd for {} application",
        app.name
    )
}

fn target(level: i64) -> &'static str {
    match level {
        1 => "rescue.target",
        5 => "graphical.target",
        6 => "reboot.target",
        _ => "multi-user.target",
    }
}

/// systemd wants signal names with the `SIG` prefix.
fn signal_name(signal: &str) -> String {
    let upper = signal.to_ascii_uppercase();
    if upper.starts_with("SIG") || upper.chars().all(|c| c.is_ascii_digit()) {
        upper
    } else {
        format!("SIG{upper}")
    }
}

fn respawn_directives(t: &mut Template, options: &ServiceOptions) {
    if !options.is_respawn_enabled() {
        return;
    }

    t.directive("Restart", "on-failure");
    if options.is_respawn_delay_set() {
        t.directive("RestartSec", options.respawn.delay);
    }
    if options.respawn.interval > 0 {
        t.directive("StartLimitInterval", options.respawn.interval);
    }
    if options.respawn.count > 0 {
        t.directive("StartLimitBurst", options.respawn.count);
    }
}

fn limit_directives(t: &mut Template, options: &ServiceOptions) {
    let limits = &options.limits;
    if options.is_file_limit_set() {
        t.directive("LimitNOFILE", limits.nofile);
    }
    if options.is_proc_limit_set() {
        t.directive("LimitNPROC", limits.nproc);
    }
    if options.is_memlock_limit_set() {
        if limits.memlock == MEMLOCK_UNLIMITED {
            t.directive("LimitMEMLOCK", "infinity");
        } else {
            t.directive("LimitMEMLOCK", limits.memlock);
        }
    }
}

fn resource_directives(t: &mut Template, r: &Resources) {
    t.directive_opt("CPUWeight", r.cpu_weight)
        .directive_opt("StartupCPUWeight", r.startup_cpu_weight)
        .directive_opt("CPUQuota", r.cpu_quota.map(|quota| format!("{quota}%")))
        .directive_opt("CPUAffinity", r.cpu_affinity.as_deref())
        .directive_opt("MemoryLow", r.memory_low.as_deref())
        .directive_opt("MemoryHigh", r.memory_high.as_deref())
        .directive_opt("MemoryMax", r.memory_max.as_deref())
        .directive_opt("MemorySwapMax", r.memory_swap_max.as_deref())
        .directive_opt("TasksMax", r.tasks_max)
        .directive_opt("IOWeight", r.io_weight)
        .directive_opt("StartupIOWeight", r.startup_io_weight)
        .directive_opt("IODeviceWeight", r.io_device_weight.as_deref())
        .directive_opt("IOReadBandwidthMax", r.io_read_bandwidth_max.as_deref())
        .directive_opt("IOWriteBandwidthMax", r.io_write_bandwidth_max.as_deref())
        .directive_opt("IOReadIOPSMax", r.io_read_iops_max.as_deref())
        .directive_opt("IOWriteIOPSMax", r.io_write_iops_max.as_deref())
        .directive_opt("IPAddressAllow", r.ip_address_allow.as_deref())
        .directive_opt("IPAddressDeny", r.ip_address_deny.as_deref());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::path::{Path, PathBuf};

    use procfile::Service;

    use super::*;
    use crate::provider::service_units;
    use crate::test_utils::{RecordingRunner, app_with, sample_app};

    const DATE: &str = "2026/01/02 03:04:05";

    fn provider() -> Systemd<RecordingRunner> {
        Systemd::new(RecordingRunner::default())
    }

    #[test]
    fn test_app_unit() {
        let mut app = sample_app();
        app.reload_helper_path = Some(PathBuf::from("/h/myapp-reload.sh"));
        let unit = provider().render_app(&app, DATE);

        assert!(unit.starts_with(
            "# This unit generated 2026/01/02 03:04:05 by init-exporter/systemd for myapp application\n\n[Unit]\n"
        ));
        assert!(unit.contains("Description=Unit for myapp application\nAfter=multi-user.target\n"));
        assert!(unit.contains(
            "Wants=myapp_web.service myapp_worker1.service myapp_worker2.service myapp_worker3.service\n"
        ));
        assert!(unit.contains("ExecStartPre=/bin/mkdir -p /var/log/myapp\n"));
        assert!(unit.contains("ExecStartPre=/bin/chown -R service /var/log/myapp\n"));
        assert!(unit.contains("ExecReload=/bin/bash /h/myapp-reload.sh\n"));
        assert!(unit.ends_with("[Install]\nWantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_app_unit_device_and_dependencies() {
        let mut app = sample_app();
        app.start_level = 5;
        app.start_device = Some("eth0".into());
        app.depends = vec!["postgresql".into(), "redis".into()];
        let unit = provider().render_app(&app, DATE);

        assert!(unit.contains("After=graphical.target\n"));
        assert!(unit.contains("BindsTo=sys-subsystem-net-devices-eth0.device\n"));
        assert!(unit.contains("After=sys-subsystem-net-devices-eth0.device\n"));
        assert!(unit.contains("Wants=postgresql.service redis.service\n"));
        assert!(unit.contains("After=postgresql.service redis.service\n"));
        assert!(!unit.contains("ExecReload"));

        app.strong_dependencies = true;
        let unit = provider().render_app(&app, DATE);
        assert!(unit.contains("Requires=postgresql.service redis.service\n"));
    }

    #[test]
    fn test_wants_lines_are_chunked() {
        let mut service = Service::new("a_rather_long_service_name", "run");
        service.options.count = 200;
        let app = app_with(vec![service]);

        let lines = provider().wants_lines(&app);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= MAX_WANTS_LINE, "{}", line.len());
            assert!(line.starts_with("Wants=myapp_a_rather_long_service_name"));
        }
        let total: usize = lines
            .iter()
            .map(|line| line.trim_start_matches("Wants=").split(' ').count())
            .sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_partial_respawn_limit() {
        let mut service = Service::new("web", "run");
        service.options.respawn.enabled = Some(true);
        service.options.respawn.count = 5;
        let app = app_with(vec![service]);
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[0], DATE);

        assert!(unit.contains("Restart=on-failure\nStartLimitBurst=5\n"), "{unit}");
        assert!(!unit.contains("StartLimitInterval"), "{unit}");
    }

    #[test]
    fn test_service_unit() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[0], DATE);

        assert!(unit.contains("Description=Unit for web service (part of myapp application)\n"));
        assert!(unit.contains("PartOf=myapp.service\n"));
        assert!(unit.contains("KillSignal=SIGQUIT\n"));
        assert!(unit.contains("TimeoutStopSec=30\n"));
        assert!(unit.contains("Restart=on-failure\nRestartSec=2\nStartLimitInterval=15\nStartLimitBurst=5\n"));
        assert!(unit.contains("LimitNOFILE=4096\n"));
        assert!(unit.contains("LimitMEMLOCK=infinity\n"));
        assert!(unit.contains("CPUQuota=40%\n"));
        assert!(unit.contains("MemoryMax=1G\n"));
        assert!(unit.contains("ExecStartPre=/bin/touch /var/log/myapp/web.log\n"));
        assert!(unit.contains("WorkingDirectory=/srv/myapp\n"));
        assert!(unit.contains("ExecStart=/bin/sh -c '/bin/bash /h/myapp_web.sh &>>/var/log/myapp/web.log'\n"));
        assert!(unit.contains("ExecReload=/bin/kill -SIGUSR2 $MAINPID\n"));
    }

    #[test]
    fn test_unset_fields_emit_nothing() {
        let app = sample_app();
        let units = service_units(&app, Path::new("/h"));
        let unit = provider().render_service(&units[1], DATE);

        for directive in [
            "LimitNOFILE",
            "LimitNPROC",
            "LimitMEMLOCK",
            "TimeoutStopSec",
            "KillMode",
            "KillSignal",
            "Restart",
            "StartLimit",
            "CPUWeight",
            "ExecReload",
        ] {
            assert!(!unit.contains(directive), "{directive} in\n{unit}");
        }
        assert!(!unit.contains("\n\n\n"));
        assert!(unit.contains("Description=Unit for worker1 service (part of myapp application)\n"));
        assert!(unit.contains("WorkingDirectory=/srv/worker\n"));
    }

    #[test]
    fn test_reload_helper() {
        let app = sample_app();
        let helper = provider().render_reload_helper(&app, DATE).unwrap();
        assert!(helper.starts_with("#!/bin/bash\n"));
        assert!(helper.ends_with(
            "systemctl reload-or-restart myapp_web.service myapp_worker1.service \
             myapp_worker2.service myapp_worker3.service\n"
        ));

        let quiet = app_with(vec![Service::new("web", "run")]);
        assert!(provider().render_reload_helper(&quiet, DATE).is_none());
    }

    #[test]
    fn test_control_commands() {
        let systemd = provider();
        systemd.enable_service("myapp").unwrap();
        systemd.disable_service("myapp").unwrap();
        systemd.reload().unwrap();

        assert_eq!(
            systemd.runner().calls(),
            vec![
                "systemctl enable myapp.service",
                "systemctl disable myapp.service",
                "systemctl daemon-reload",
            ]
        );
    }

    #[test]
    fn test_control_command_failure() {
        let systemd = Systemd::new(RecordingRunner::failing(1, "Unit file does not exist"));
        assert!(matches!(
            systemd.enable_service("myapp"),
            Err(ExportError::CommandFailed { status: 1, .. })
        ));
    }

    #[test]
    fn test_signal_name() {
        assert_eq!(signal_name("usr2"), "SIGUSR2");
        assert_eq!(signal_name("SIGTERM"), "SIGTERM");
        assert_eq!(signal_name("9"), "9");
    }
}
