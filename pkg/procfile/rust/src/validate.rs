// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Security and sanity checks over a resolved [`Application`]. Every problem is
//! reported, not just the first one.

use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::LazyLock;

use normalize_path::NormalizePath;
use phf::phf_set;
use regex::Regex;

use crate::errors::ValidationError;
use crate::model::{Application, LinkedService, MEMLOCK_UNLIMITED, resolve_path};

#[allow(clippy::expect_used)] // constant pattern
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("valid name regex"));

#[allow(clippy::expect_used)] // constant pattern
static DEVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]*([.:][0-9]+)?$").expect("valid device regex")
});

#[allow(clippy::expect_used)] // constant pattern
static PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-./]+$").expect("valid path regex"));

#[allow(clippy::expect_used)] // constant pattern
static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid env name regex"));

/// Kernel limit for interface names (IFNAMSIZ - 1).
const MAX_DEVICE_LEN: usize = 15;

const MAX_SIGNAL_NUMBER: u32 = 64;

/// Directories no generated file or working directory may point into.
const PROTECTED_DIRS: &[&str] = &[
    "/lost+found",
    "/bin",
    "/boot",
    "/etc",
    "/dev",
    "/lib",
    "/lib64",
    "/proc",
    "/root",
    "/sbin",
    "/selinux",
    "/sys",
    "/usr/bin",
    "/usr/lib",
    "/usr/lib64",
    "/usr/libexec",
    "/usr/sbin",
    "/usr/include",
    "/var/cache",
    "/var/db",
    "/var/lib",
];

static KILL_MODES: phf::Set<&'static str> = phf_set! {
    "control-group",
    "process",
    "mixed",
    "none",
};

static SIGNALS: phf::Set<&'static str> = phf_set! {
    "HUP", "INT", "QUIT", "ILL", "TRAP", "ABRT", "IOT", "BUS", "FPE", "KILL",
    "USR1", "SEGV", "USR2", "PIPE", "ALRM", "TERM", "STKFLT", "CHLD", "CONT",
    "STOP", "TSTP", "TTIN", "TTOU", "URG", "XCPU", "XFSZ", "VTALRM", "PROF",
    "WINCH", "IO", "POLL", "PWR", "SYS",
};

/// Check `app` and return every violation found. An empty result means the
/// application is safe to render.
pub fn validate(app: &Application) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_run_level(&mut errors, "start", app.start_level);
    check_run_level(&mut errors, "stop", app.stop_level);

    if !NAME.is_match(&app.name) {
        errors.push(ValidationError::Value(app.name.clone()));
    }

    if let Some(device) = app.start_device.as_deref()
        && !is_valid_device(device)
    {
        errors.push(ValidationError::Device(device.to_string()));
    }

    for dep in &app.depends {
        if !NAME.is_match(dep) {
            errors.push(ValidationError::Dependency(dep.clone()));
        }
    }

    let mut seen = HashSet::new();
    let mut instances = HashSet::new();
    for service in app.linked_services() {
        if !seen.insert(service.service().name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        } else {
            for instance in service.options.instance_names(&service.name) {
                if !instances.insert(instance.clone()) {
                    errors.push(ValidationError::DuplicateInstance(instance));
                }
            }
        }
        check_service(&mut errors, service);
    }

    errors
}

fn check_run_level(errors: &mut Vec<ValidationError>, which: &'static str, value: i64) {
    if !(1..=6).contains(&value) {
        errors.push(ValidationError::RunLevel { which, value });
    }
}

fn is_valid_device(name: &str) -> bool {
    name.len() <= MAX_DEVICE_LEN && DEVICE.is_match(name)
}

fn check_service(errors: &mut Vec<ValidationError>, service: LinkedService<'_>) {
    let name = &service.name;
    let options = &service.options;

    if !NAME.is_match(name) {
        errors.push(ValidationError::ServiceName(name.clone()));
    }

    let base = &service.application().working_dir;
    if let Some(dir) = options.working_dir.as_deref().filter(|d| !d.is_empty()) {
        check_path(errors, name, "working directory", base, dir);
    }
    if let Some(log) = options.log_file.as_deref().filter(|l| !l.is_empty()) {
        check_path(errors, name, "log", service.working_dir(), log);
    }
    if let Some(env_file) = options.env_file.as_deref().filter(|e| !e.is_empty()) {
        check_path(errors, name, "env file", service.working_dir(), env_file);
    }

    let mut negative = |field: &'static str, value: i64, min: i64| {
        if value < min {
            errors.push(ValidationError::Negative {
                service: name.clone(),
                field,
                value,
            });
        }
    };

    negative("kill_timeout", options.kill_timeout, 0);
    negative("count", options.count, 0);
    negative("respawn.count", options.respawn.count, 0);
    negative("respawn.interval", options.respawn.interval, 0);
    negative("respawn.delay", options.respawn.delay, 0);
    negative("limits.nofile", options.limits.nofile, 0);
    negative("limits.nproc", options.limits.nproc, 0);
    negative("limits.memlock", options.limits.memlock, MEMLOCK_UNLIMITED);

    if let Some(resources) = &options.resources {
        for (field, value) in resources.numeric_fields() {
            if let Some(value) = value {
                negative(field, value, 0);
            }
        }
    }

    if let Some(mode) = options.kill_mode.as_deref().filter(|m| !m.is_empty())
        && !KILL_MODES.contains(mode)
    {
        errors.push(ValidationError::KillMode {
            service: name.clone(),
            value: mode.to_string(),
        });
    }

    for (field, signal) in [
        ("kill signal", &options.kill_signal),
        ("reload signal", &options.reload_signal),
    ] {
        if let Some(signal) = signal.as_deref().filter(|s| !s.is_empty())
            && !is_known_signal(signal)
        {
            errors.push(ValidationError::Signal {
                service: name.clone(),
                field,
                value: signal.to_string(),
            });
        }
    }

    let mut env: Vec<_> = options.env.iter().collect();
    env.sort();
    for (key, value) in env {
        if !ENV_NAME.is_match(key) {
            errors.push(ValidationError::EnvName {
                service: name.clone(),
                name: key.clone(),
            });
        }
        if !is_safe_env_value(value) {
            errors.push(ValidationError::EnvValue {
                service: name.clone(),
                name: key.clone(),
            });
        }
    }
}

fn check_path(
    errors: &mut Vec<ValidationError>,
    service: &str,
    field: &'static str,
    base: &str,
    path: &str,
) {
    if !is_safe_path(base, path) {
        errors.push(ValidationError::UnsafePath {
            service: service.to_string(),
            field,
            path: path.to_string(),
        });
    }
}

/// A path is safe when it only uses allow-listed characters, never climbs
/// above its starting point, and does not land on `/` or inside a protected
/// system directory once resolved against `base`.
pub fn is_safe_path(base: &str, path: &str) -> bool {
    if !PATH_CHARS.is_match(path) || escapes(path) {
        return false;
    }

    let resolved = resolve_path(base, path);
    let resolved = Path::new(&resolved).normalize();

    if !resolved.has_root() {
        // Relative to an unknown base; nothing more to check.
        return true;
    }

    if resolved == Path::new("/") {
        return false;
    }

    !PROTECTED_DIRS
        .iter()
        .any(|dir| resolved.starts_with(Path::new(dir)))
}

/// True if `..` components climb above the path's first component.
fn escapes(path: &str) -> bool {
    let mut depth: i64 = 0;
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    false
}

fn is_known_signal(signal: &str) -> bool {
    if let Ok(number) = signal.parse::<u32>() {
        return (1..=MAX_SIGNAL_NUMBER).contains(&number);
    }

    let upper = signal.to_ascii_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    SIGNALS.contains(name)
}

/// Whitespace or `*` would split or glob once the value reaches a shell, so
/// they are only accepted escaped or inside balanced quotes.
fn is_safe_env_value(value: &str) -> bool {
    let mut escaped = false;
    let mut risky = false;

    for c in value.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' => risky = true,
            c if c.is_whitespace() => risky = true,
            _ => {}
        }
    }

    if !risky {
        return true;
    }

    let balanced = |quote: char| {
        let n = value.chars().filter(|&c| c == quote).count();
        n > 0 && n % 2 == 0
    };

    balanced('"') || balanced('\'')
}
