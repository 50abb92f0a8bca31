// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

pub const DEFAULT_RUN_LEVEL: i64 = 3;

/// A memlock limit of -1 means "unlimited".
pub const MEMLOCK_UNLIMITED: i64 = -1;

/// Per-invocation defaults, built from the global settings file. Values here
/// only ever fill fields a Procfile left unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub name: String,
    pub user: String,
    pub group: String,
    pub working_dir: String,
    pub is_respawn_enabled: bool,
    pub respawn_interval: i64,
    pub respawn_count: i64,
    pub respawn_delay: i64,
    pub kill_timeout: i64,
    pub limit_file: i64,
    pub limit_proc: i64,
    pub limit_memlock: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcVersion {
    V1,
    V2,
}

impl ProcVersion {
    pub fn number(self) -> u8 {
        match self {
            ProcVersion::V1 => 1,
            ProcVersion::V2 => 2,
        }
    }
}

impl fmt::Display for ProcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone)]
pub struct Application {
    pub name: String,
    pub user: String,
    pub group: String,
    pub start_level: i64,
    pub stop_level: i64,
    /// Network interface whose activation starts the application.
    pub start_device: Option<String>,
    pub depends: Vec<String>,
    /// Hard requirement on `depends` instead of ordering only.
    pub strong_dependencies: bool,
    pub working_dir: String,
    pub services: Vec<Service>,
    pub proc_version: ProcVersion,
    /// Set by the exporter when a reload helper is written.
    pub reload_helper_path: Option<PathBuf>,
}

impl Application {
    pub fn new(proc_version: ProcVersion, config: &Config, services: Vec<Service>) -> Self {
        Self {
            name: config.name.clone(),
            user: config.user.clone(),
            group: config.group.clone(),
            start_level: DEFAULT_RUN_LEVEL,
            stop_level: DEFAULT_RUN_LEVEL,
            start_device: None,
            depends: Vec::new(),
            strong_dependencies: false,
            working_dir: config.working_dir.clone(),
            services,
            proc_version,
            reload_helper_path: None,
        }
    }

    /// Every service paired with a reference back to this application.
    pub fn linked_services(&self) -> impl Iterator<Item = LinkedService<'_>> {
        self.services.iter().map(move |service| LinkedService {
            application: self,
            service,
        })
    }

    pub fn service(&self, name: &str) -> Option<LinkedService<'_>> {
        self.linked_services().find(|s| s.name == name)
    }

    /// True if at least one service defines a reload signal.
    pub fn is_reload_signal_set(&self) -> bool {
        self.services
            .iter()
            .any(|s| s.options.is_reload_signal_set())
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Service {
    pub name: String,
    pub cmd: String,
    pub pre_cmd: Option<String>,
    pub post_cmd: Option<String>,
    pub options: ServiceOptions,
}

impl Service {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            ..Self::default()
        }
    }
}

/// A service viewed together with the application that owns it. Only obtainable
/// from a complete [`Application`], so a half-linked graph can't exist.
#[derive(Debug, Clone, Copy)]
pub struct LinkedService<'a> {
    application: &'a Application,
    service: &'a Service,
}

impl<'a> LinkedService<'a> {
    pub fn application(&self) -> &'a Application {
        self.application
    }

    pub fn service(&self) -> &'a Service {
        self.service
    }

    /// Service working directory, falling back to the application one.
    pub fn working_dir(&self) -> &'a str {
        match self.service.options.working_dir.as_deref() {
            Some(dir) if !dir.is_empty() => dir,
            _ => &self.application.working_dir,
        }
    }

    pub fn full_log_path(&self) -> Option<String> {
        self.service
            .options
            .log_file
            .as_deref()
            .map(|path| resolve_path(self.working_dir(), path))
    }

    pub fn full_env_file_path(&self) -> Option<String> {
        self.service
            .options
            .env_file
            .as_deref()
            .map(|path| resolve_path(self.working_dir(), path))
    }
}

impl Deref for LinkedService<'_> {
    type Target = Service;

    fn deref(&self) -> &Service {
        self.service
    }
}

/// Join a relative path onto `base`; absolute paths are returned unchanged.
pub fn resolve_path(base: &str, path: &str) -> String {
    if path.starts_with('/') || base.is_empty() {
        return path.to_string();
    }

    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespawnOptions {
    /// `None` until a Procfile, the shared block or the config decides.
    pub enabled: Option<bool>,
    pub count: i64,
    pub interval: i64,
    /// Seconds to wait after the process stops before respawning.
    pub delay: i64,
}

/// Basic rlimits. 0 means unset; memlock additionally accepts -1 (unlimited).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limits {
    pub nofile: i64,
    pub nproc: i64,
    pub memlock: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceOptions {
    pub env: HashMap<String, String>,
    pub env_file: Option<String>,
    pub working_dir: Option<String>,
    pub log_file: Option<String>,
    pub kill_timeout: i64,
    pub kill_signal: Option<String>,
    pub kill_mode: Option<String>,
    pub reload_signal: Option<String>,
    /// Number of parallel instances; 0 renders a single unsuffixed unit.
    pub count: i64,
    pub respawn: RespawnOptions,
    pub limits: Limits,
    pub resources: Option<Resources>,
}

impl ServiceOptions {
    pub fn is_respawn_enabled(&self) -> bool {
        self.respawn.enabled.unwrap_or(false)
    }

    /// Both halves of the respawn rate limit are known.
    pub fn is_respawn_limit_set(&self) -> bool {
        self.respawn.count > 0 && self.respawn.interval > 0
    }

    pub fn is_respawn_delay_set(&self) -> bool {
        self.respawn.delay > 0
    }

    pub fn is_kill_timeout_set(&self) -> bool {
        self.kill_timeout > 0
    }

    pub fn is_kill_signal_set(&self) -> bool {
        self.kill_signal.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_kill_mode_set(&self) -> bool {
        self.kill_mode.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_reload_signal_set(&self) -> bool {
        self.reload_signal.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_file_limit_set(&self) -> bool {
        self.limits.nofile != 0
    }

    pub fn is_proc_limit_set(&self) -> bool {
        self.limits.nproc != 0
    }

    pub fn is_memlock_limit_set(&self) -> bool {
        self.limits.memlock != 0
    }

    pub fn is_custom_log_enabled(&self) -> bool {
        self.log_file.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_env_set(&self) -> bool {
        !self.env.is_empty()
    }

    pub fn is_env_file_set(&self) -> bool {
        self.env_file.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_multi_instance(&self) -> bool {
        self.count > 0
    }

    /// Names of the units generated for a service called `name`: `name` alone,
    /// or `name1..nameN` when several instances run.
    pub fn instance_names(&self, name: &str) -> Vec<String> {
        if self.is_multi_instance() {
            (1..=self.count).map(|i| format!("{name}{i}")).collect()
        } else {
            vec![name.to_string()]
        }
    }

    /// Environment as `K=V` pairs, sorted by key and space separated.
    pub fn env_string(&self) -> String {
        let mut clauses: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        clauses.sort();
        clauses.join(" ")
    }
}

/// cgroup controls. Only the systemd backend renders them; a `None` field
/// produces no directive at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    pub cpu_weight: Option<i64>,
    pub startup_cpu_weight: Option<i64>,
    pub cpu_quota: Option<i64>,
    pub cpu_affinity: Option<String>,
    pub memory_low: Option<String>,
    pub memory_high: Option<String>,
    pub memory_max: Option<String>,
    pub memory_swap_max: Option<String>,
    pub tasks_max: Option<i64>,
    pub io_weight: Option<i64>,
    pub startup_io_weight: Option<i64>,
    pub io_device_weight: Option<String>,
    pub io_read_bandwidth_max: Option<String>,
    pub io_write_bandwidth_max: Option<String>,
    pub io_read_iops_max: Option<String>,
    pub io_write_iops_max: Option<String>,
    pub ip_address_allow: Option<String>,
    pub ip_address_deny: Option<String>,
}

impl Resources {
    /// Copy every field of `other` that is unset here.
    pub fn fill_from(&mut self, other: &Resources) {
        fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }

        fill(&mut self.cpu_weight, &other.cpu_weight);
        fill(&mut self.startup_cpu_weight, &other.startup_cpu_weight);
        fill(&mut self.cpu_quota, &other.cpu_quota);
        fill(&mut self.cpu_affinity, &other.cpu_affinity);
        fill(&mut self.memory_low, &other.memory_low);
        fill(&mut self.memory_high, &other.memory_high);
        fill(&mut self.memory_max, &other.memory_max);
        fill(&mut self.memory_swap_max, &other.memory_swap_max);
        fill(&mut self.tasks_max, &other.tasks_max);
        fill(&mut self.io_weight, &other.io_weight);
        fill(&mut self.startup_io_weight, &other.startup_io_weight);
        fill(&mut self.io_device_weight, &other.io_device_weight);
        fill(&mut self.io_read_bandwidth_max, &other.io_read_bandwidth_max);
        fill(&mut self.io_write_bandwidth_max, &other.io_write_bandwidth_max);
        fill(&mut self.io_read_iops_max, &other.io_read_iops_max);
        fill(&mut self.io_write_iops_max, &other.io_write_iops_max);
        fill(&mut self.ip_address_allow, &other.ip_address_allow);
        fill(&mut self.ip_address_deny, &other.ip_address_deny);
    }

    /// Numeric fields by name, for range checks.
    pub fn numeric_fields(&self) -> [(&'static str, Option<i64>); 6] {
        [
            ("cpu_weight", self.cpu_weight),
            ("startup_cpu_weight", self.startup_cpu_weight),
            ("cpu_quota", self.cpu_quota),
            ("task_max", self.tasks_max),
            ("io_weight", self.io_weight),
            ("startup_io_weight", self.startup_io_weight),
        ]
    }
}
