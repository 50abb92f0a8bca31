// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Structured YAML grammar, selected by a `version: 2` line.

use std::collections::HashMap;

use log::debug;
use yaml_rust2::{Yaml, YamlLoader};

use crate::Parsed;
use crate::errors::Error;
use crate::model::{Application, Config, ProcVersion, Resources, Service, ServiceOptions};
use crate::v1::scan_clause;

pub(crate) fn parse(data: &str, config: &Config) -> Result<Parsed, Error> {
    debug!("Parsing procfile as v2");

    let docs = YamlLoader::load_from_str(data)
        .map_err(|e| Error::Format(format!("can't parse procfile as YAML: {e}")))?;
    let doc = docs.into_iter().next().unwrap_or(Yaml::BadValue);

    let Some(commands) = doc["commands"].as_hash() else {
        return Err(Error::Format("commands section is missing in procfile".to_string()));
    };

    // Top-level options are shared by every service. Respawn is on unless the
    // document says otherwise.
    let mut shared = parse_options(&doc, "")?;
    if shared.respawn.enabled.is_none() {
        shared.respawn.enabled = Some(true);
    }

    let mut services = Vec::with_capacity(commands.len());
    for (key, entry) in commands {
        let Some(name) = scalar_string(key) else {
            return Err(Error::Format(format!(
                "service name must be a scalar, got {}",
                kind(key)
            )));
        };
        services.push(parse_service(name, entry)?);
    }

    let mut application = Application::new(ProcVersion::V2, config, services);

    if let Some(dir) = get_string(&doc, "working_directory", "working_directory")? {
        application.working_dir = dir;
    }
    if let Some(level) = get_int(&doc, "start_on_runlevel", "start_on_runlevel")? {
        application.start_level = level;
    }
    if let Some(level) = get_int(&doc, "stop_on_runlevel", "stop_on_runlevel")? {
        application.stop_level = level;
    }
    application.start_device = get_string(&doc, "start_on_device", "start_on_device")?;
    if let Some(strong) = get_bool(&doc, "strong_dependencies", "strong_dependencies")? {
        application.strong_dependencies = strong;
    }
    if let Some(depends) = get_string(&doc, "depends", "depends")? {
        application.depends = depends.split_whitespace().map(str::to_string).collect();
    }

    Ok(Parsed {
        application,
        shared,
    })
}

fn parse_service(name: String, entry: &Yaml) -> Result<Service, Error> {
    if entry.as_hash().is_none() {
        return Err(Error::Format(format!(
            "service {name}: definition must be a map, got {}",
            kind(entry)
        )));
    }

    let prefix = format!("commands.{name}.");
    let key = |k: &str| format!("{prefix}{k}");

    let Some(command) = get_string(entry, "command", &key("command"))? else {
        return Err(Error::property(&key("command"), "value is required"));
    };

    let mut options = parse_options(entry, &prefix)?;

    // `command` may still carry v1-style decoration; explicit keys win.
    let clause = scan_clause(&command);
    if options.log_file.is_none() {
        options.log_file = clause.log;
    }
    for (env_key, env_value) in clause.env {
        options.env.entry(env_key).or_insert(env_value);
    }

    Ok(Service {
        name,
        cmd: clause.command,
        pre_cmd: get_string(entry, "pre", &key("pre"))?,
        post_cmd: get_string(entry, "post", &key("post"))?,
        options,
    })
}

/// Option keys shared by the top level and every `commands` entry. `prefix`
/// is prepended to key names in error messages.
fn parse_options(doc: &Yaml, prefix: &str) -> Result<ServiceOptions, Error> {
    let key = |k: &str| format!("{prefix}{k}");
    let mut options = ServiceOptions {
        working_dir: get_string(doc, "working_directory", &key("working_directory"))?,
        log_file: get_string(doc, "log", &key("log"))?,
        env_file: get_string(doc, "env_file", &key("env_file"))?,
        kill_signal: get_string(doc, "kill_signal", &key("kill_signal"))?,
        kill_mode: get_string(doc, "kill_mode", &key("kill_mode"))?,
        reload_signal: get_string(doc, "reload_signal", &key("reload_signal"))?,
        kill_timeout: get_int(doc, "kill_timeout", &key("kill_timeout"))?.unwrap_or(0),
        count: get_int(doc, "count", &key("count"))?.unwrap_or(0),
        ..ServiceOptions::default()
    };

    if let Some(env) = lookup(doc, "env") {
        options.env = parse_env(env, &key("env"))?;
    }

    if let Some(respawn) = lookup(doc, "respawn") {
        if respawn.as_hash().is_some() {
            let path = key("respawn");
            let sub = |k: &str| format!("{path}.{k}");
            options.respawn.enabled = Some(true);
            options.respawn.count = get_int(respawn, "count", &sub("count"))?.unwrap_or(0);
            options.respawn.interval = get_int(respawn, "interval", &sub("interval"))?.unwrap_or(0);
            options.respawn.delay = get_int(respawn, "delay", &sub("delay"))?.unwrap_or(0);
        } else {
            options.respawn.enabled = Some(as_bool(respawn, &key("respawn"))?);
        }
    }

    if let Some(limits) = lookup(doc, "limits") {
        let path = key("limits");
        if limits.as_hash().is_none() {
            return Err(Error::property(&path, format!("expected a map, got {}", kind(limits))));
        }
        let sub = |k: &str| format!("{path}.{k}");
        options.limits.nofile = get_int(limits, "nofile", &sub("nofile"))?.unwrap_or(0);
        options.limits.nproc = get_int(limits, "nproc", &sub("nproc"))?.unwrap_or(0);
        options.limits.memlock = get_int(limits, "memlock", &sub("memlock"))?.unwrap_or(0);
    }

    if let Some(resources) = lookup(doc, "resources") {
        options.resources = Some(parse_resources(resources, &key("resources"))?);
    }

    Ok(options)
}

fn parse_env(value: &Yaml, path: &str) -> Result<HashMap<String, String>, Error> {
    let Some(hash) = value.as_hash() else {
        return Err(Error::property(path, format!("expected a map, got {}", kind(value))));
    };

    let mut env = HashMap::with_capacity(hash.len());
    for (name, value) in hash {
        let Some(name) = scalar_string(name) else {
            return Err(Error::property(path, "variable names must be scalars"));
        };
        let value = match value {
            Yaml::Null => String::new(),
            other => scalar_string(other).ok_or_else(|| {
                Error::property(&format!("{path}.{name}"), format!("expected a scalar, got {}", kind(other)))
            })?,
        };
        env.insert(name, value);
    }

    Ok(env)
}

fn parse_resources(doc: &Yaml, path: &str) -> Result<Resources, Error> {
    if doc.as_hash().is_none() {
        return Err(Error::property(path, format!("expected a map, got {}", kind(doc))));
    }

    let key = |k: &str| format!("{path}.{k}");
    let int = |k: &str| get_int(doc, k, &key(k));
    let string = |k: &str| get_string(doc, k, &key(k));

    Ok(Resources {
        cpu_weight: int("cpu_weight")?,
        startup_cpu_weight: int("startup_cpu_weight")?,
        cpu_quota: int("cpu_quota")?,
        cpu_affinity: string("cpu_affinity")?,
        memory_low: string("memory_low")?,
        memory_high: string("memory_high")?,
        memory_max: string("memory_max")?,
        memory_swap_max: string("memory_swap_max")?,
        tasks_max: int("task_max")?,
        io_weight: int("io_weight")?,
        startup_io_weight: int("startup_io_weight")?,
        io_device_weight: string("io_device_weight")?,
        io_read_bandwidth_max: string("io_read_bandwidth_max")?,
        io_write_bandwidth_max: string("io_write_bandwidth_max")?,
        io_read_iops_max: string("io_read_iops_max")?,
        io_write_iops_max: string("io_write_iops_max")?,
        ip_address_allow: string("ip_address_allow")?,
        ip_address_deny: string("ip_address_deny")?,
    })
}

/// Present, non-null value under `key`. Indexing a non-hash yields `BadValue`.
fn lookup<'a>(doc: &'a Yaml, key: &str) -> Option<&'a Yaml> {
    let value = &doc[key];
    (!value.is_badvalue() && !value.is_null()).then_some(value)
}

fn get_string(doc: &Yaml, key: &str, path: &str) -> Result<Option<String>, Error> {
    lookup(doc, key)
        .map(|value| {
            scalar_string(value)
                .ok_or_else(|| Error::property(path, format!("expected a string, got {}", kind(value))))
        })
        .transpose()
}

fn get_int(doc: &Yaml, key: &str, path: &str) -> Result<Option<i64>, Error> {
    lookup(doc, key)
        .map(|value| match value {
            Yaml::Integer(i) => Ok(*i),
            Yaml::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::property(path, format!("{e} (\"{s}\")"))),
            other => Err(Error::property(path, format!("expected an integer, got {}", kind(other)))),
        })
        .transpose()
}

fn get_bool(doc: &Yaml, key: &str, path: &str) -> Result<Option<bool>, Error> {
    lookup(doc, key).map(|value| as_bool(value, path)).transpose()
}

fn as_bool(value: &Yaml, path: &str) -> Result<bool, Error> {
    match value {
        Yaml::Boolean(b) => Ok(*b),
        Yaml::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Yaml::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(Error::property(path, format!("expected a boolean, got {}", kind(other)))),
    }
}

fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) | Yaml::Real(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind(value: &Yaml) -> &'static str {
    match value {
        Yaml::Real(_) => "a float",
        Yaml::Integer(_) => "an integer",
        Yaml::String(_) => "a string",
        Yaml::Boolean(_) => "a boolean",
        Yaml::Array(_) => "a list",
        Yaml::Hash(_) => "a map",
        Yaml::Alias(_) => "an alias",
        Yaml::Null => "null",
        Yaml::BadValue => "nothing",
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn parse_str(data: &str) -> Result<Parsed, Error> {
        let config = Config {
            name: "myapp".into(),
            working_dir: "/srv/default".into(),
            ..Config::default()
        };
        parse(data, &config)
    }

    fn property_key(err: Error) -> String {
        match err {
            Error::Property { key, .. } => key,
            other => panic!("expected a property error, got {other:?}"),
        }
    }

    #[test]
    fn test_top_level_keys() {
        let parsed = parse_str(
            r#"
version: 2
working_directory: /srv/app
start_on_runlevel: 2
stop_on_runlevel: 5
start_on_device: eth0
strong_dependencies: true
depends: postgresql   redis
commands:
  api:
    command: serve
"#,
        )
        .unwrap();

        let app = parsed.application;
        assert_eq!(app.proc_version, ProcVersion::V2);
        assert_eq!(app.name, "myapp");
        assert_eq!(app.working_dir, "/srv/app");
        assert_eq!(app.start_level, 2);
        assert_eq!(app.stop_level, 5);
        assert_eq!(app.start_device.as_deref(), Some("eth0"));
        assert!(app.strong_dependencies);
        assert_eq!(app.depends, vec!["postgresql", "redis"]);
    }

    #[test]
    fn test_defaults_without_top_level_keys() {
        let parsed = parse_str("version: 2\ncommands:\n  api:\n    command: serve\n").unwrap();
        let app = parsed.application;
        assert_eq!(app.working_dir, "/srv/default");
        assert_eq!(app.start_level, 3);
        assert_eq!(app.stop_level, 3);
        assert!(app.start_device.is_none());
        assert!(!app.has_dependencies());
        assert_eq!(parsed.shared.respawn.enabled, Some(true));
    }

    #[test]
    fn test_service_options() {
        let parsed = parse_str(
            r#"
version: 2
commands:
  worker:
    pre: ./prepare
    command: ./work --queue default
    post: ./cleanup
    working_directory: /srv/worker
    log: log/worker.log
    kill_timeout: 30
    kill_signal: SIGINT
    kill_mode: mixed
    reload_signal: USR2
    count: 3
    env_file: .env
    env:
      RAILS_ENV: production
      THREADS: 4
    respawn:
      count: 7
      interval: 15
      delay: 2
    limits:
      nofile: 4096
      nproc: 512
      memlock: -1
"#,
        )
        .unwrap();

        let svc = &parsed.application.services[0];
        assert_eq!(svc.name, "worker");
        assert_eq!(svc.cmd, "./work --queue default");
        assert_eq!(svc.pre_cmd.as_deref(), Some("./prepare"));
        assert_eq!(svc.post_cmd.as_deref(), Some("./cleanup"));

        let o = &svc.options;
        assert_eq!(o.working_dir.as_deref(), Some("/srv/worker"));
        assert_eq!(o.log_file.as_deref(), Some("log/worker.log"));
        assert_eq!(o.kill_timeout, 30);
        assert_eq!(o.kill_signal.as_deref(), Some("SIGINT"));
        assert_eq!(o.kill_mode.as_deref(), Some("mixed"));
        assert_eq!(o.reload_signal.as_deref(), Some("USR2"));
        assert_eq!(o.count, 3);
        assert_eq!(o.env_file.as_deref(), Some(".env"));
        assert_eq!(o.env["RAILS_ENV"], "production");
        assert_eq!(o.env["THREADS"], "4");
        assert_eq!(o.respawn.enabled, Some(true));
        assert_eq!((o.respawn.count, o.respawn.interval, o.respawn.delay), (7, 15, 2));
        assert_eq!((o.limits.nofile, o.limits.nproc, o.limits.memlock), (4096, 512, -1));
        assert!(o.resources.is_none());
    }

    #[test]
    fn test_missing_keys_stay_unset() {
        let parsed = parse_str("version: 2\ncommands:\n  api:\n    command: serve\n").unwrap();
        let o = &parsed.application.services[0].options;
        assert_eq!(o.respawn.enabled, None);
        assert_eq!(o.kill_timeout, 0);
        assert_eq!(o.count, 0);
        assert!(o.log_file.is_none());
        assert!(o.env.is_empty());
    }

    #[test]
    fn test_respawn_shorthand() {
        let parsed = parse_str(
            "version: 2\nrespawn: false\ncommands:\n  a:\n    command: run\n    respawn: true\n  b:\n    command: run\n",
        )
        .unwrap();
        assert_eq!(parsed.shared.respawn.enabled, Some(false));
        assert_eq!(parsed.application.services[0].options.respawn.enabled, Some(true));
        assert_eq!(parsed.application.services[1].options.respawn.enabled, None);
    }

    #[test]
    fn test_command_decoration() {
        let parsed = parse_str(
            r#"
version: 2
commands:
  a:
    command: env A=1 B=2 ./run >> /var/log/a.log
    env:
      A: explicit
  b:
    command: ./run >> /var/log/ignored.log
    log: /var/log/b.log
"#,
        )
        .unwrap();

        let a = &parsed.application.services[0];
        assert_eq!(a.cmd, "./run");
        assert_eq!(a.options.log_file.as_deref(), Some("/var/log/a.log"));
        assert_eq!(a.options.env["A"], "explicit");
        assert_eq!(a.options.env["B"], "2");

        let b = &parsed.application.services[1];
        assert_eq!(b.cmd, "./run");
        assert_eq!(b.options.log_file.as_deref(), Some("/var/log/b.log"));
    }

    #[test]
    fn test_resources() {
        let parsed = parse_str(
            r#"
version: 2
commands:
  api:
    command: serve
    resources:
      cpu_weight: 50
      cpu_quota: 35
      memory_max: 1G
      task_max: 100
      io_read_bandwidth_max: /var/log 1M
"#,
        )
        .unwrap();

        let r = parsed.application.services[0].options.resources.clone().unwrap();
        assert_eq!(r.cpu_weight, Some(50));
        assert_eq!(r.cpu_quota, Some(35));
        assert_eq!(r.memory_max.as_deref(), Some("1G"));
        assert_eq!(r.tasks_max, Some(100));
        assert_eq!(r.io_read_bandwidth_max.as_deref(), Some("/var/log 1M"));
        assert_eq!(r.startup_cpu_weight, None);
        assert_eq!(r.memory_low, None);
    }

    #[test]
    fn test_commands_required() {
        assert!(matches!(parse_str("version: 2\nworking_directory: /srv\n"), Err(Error::Format(_))));
        assert!(matches!(parse_str("version: 2\ncommands: nope\n"), Err(Error::Format(_))));
    }

    #[test]
    fn test_command_required() {
        let err = parse_str("version: 2\ncommands:\n  api:\n    log: /tmp/x\n").unwrap_err();
        assert_eq!(property_key(err), "commands.api.command");
    }

    #[test]
    fn test_coercion_errors_name_dotted_key() {
        let err = parse_str("version: 2\ncommands:\n  api:\n    command: x\n    count: many\n").unwrap_err();
        assert_eq!(property_key(err), "commands.api.count");

        let err = parse_str(
            "version: 2\ncommands:\n  api:\n    command: x\n    resources:\n      cpu_weight: heavy\n",
        )
        .unwrap_err();
        assert_eq!(property_key(err), "commands.api.resources.cpu_weight");

        let err = parse_str("version: 2\nlimits:\n  nofile: [1]\ncommands:\n  api:\n    command: x\n").unwrap_err();
        assert_eq!(property_key(err), "limits.nofile");

        let err = parse_str("version: 2\nstart_on_runlevel: high\ncommands:\n  api:\n    command: x\n").unwrap_err();
        assert_eq!(property_key(err), "start_on_runlevel");

        let err = parse_str("version: 2\ncommands:\n  api:\n    command: x\n    respawn: sometimes\n").unwrap_err();
        assert_eq!(property_key(err), "commands.api.respawn");
    }

    #[test]
    fn test_limits_must_be_a_map() {
        let err = parse_str("version: 2
commands:
  web:
    command: x
    limits: 4096
").unwrap_err();
        assert_eq!(property_key(err), "commands.web.limits");

        let err = parse_str("version: 2
limits: [1, 2]
commands:
  web:
    command: x
").unwrap_err();
        assert_eq!(property_key(err), "limits");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(parse_str("version: 2\ncommands: [unclosed\n"), Err(Error::Format(_))));
    }

    #[test]
    fn test_service_order_preserved() {
        let parsed = parse_str(
            "version: 2\ncommands:\n  zeta:\n    command: z\n  alpha:\n    command: a\n  mid:\n    command: m\n",
        )
        .unwrap();
        let names: Vec<&str> = parsed.application.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
