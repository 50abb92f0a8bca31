// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Rewrites a parsed v1 application as a v2 document.

use yaml_rust2::yaml::Hash;
use yaml_rust2::{Yaml, YamlEmitter};

use crate::errors::Error;
use crate::model::{Application, Config, ProcVersion};

pub const DEFAULT_RESPAWN_COUNT: i64 = 10;
pub const DEFAULT_RESPAWN_INTERVAL: i64 = 5;

/// Render `app` (which must come from a v1 Procfile) as v2 YAML. Global
/// defaults from `config` are written out explicitly so the converted file
/// behaves the same without them.
pub fn to_v2(app: &Application, config: &Config) -> Result<String, Error> {
    if app.proc_version != ProcVersion::V1 {
        return Err(Error::Format("procfile is already in v2 format".to_string()));
    }

    let mut doc = Hash::new();
    insert(&mut doc, "version", Yaml::Integer(2));
    insert(&mut doc, "start_on_runlevel", Yaml::Integer(app.start_level));
    insert(&mut doc, "stop_on_runlevel", Yaml::Integer(app.stop_level));

    if config.is_respawn_enabled {
        let count = non_zero_or(config.respawn_count, DEFAULT_RESPAWN_COUNT);
        let interval = non_zero_or(config.respawn_interval, DEFAULT_RESPAWN_INTERVAL);
        let mut respawn = Hash::new();
        insert(&mut respawn, "count", Yaml::Integer(count));
        insert(&mut respawn, "interval", Yaml::Integer(interval));
        if config.respawn_delay > 0 {
            insert(&mut respawn, "delay", Yaml::Integer(config.respawn_delay));
        }
        insert(&mut doc, "respawn", Yaml::Hash(respawn));
    } else {
        insert(&mut doc, "respawn", Yaml::Boolean(false));
    }

    let mut limits = Hash::new();
    for (key, value) in [
        ("nofile", config.limit_file),
        ("nproc", config.limit_proc),
        ("memlock", config.limit_memlock),
    ] {
        if value != 0 {
            insert(&mut limits, key, Yaml::Integer(value));
        }
    }
    if !limits.is_empty() {
        insert(&mut doc, "limits", Yaml::Hash(limits));
    }

    if config.kill_timeout > 0 {
        insert(&mut doc, "kill_timeout", Yaml::Integer(config.kill_timeout));
    }

    if !app.working_dir.is_empty() {
        insert(&mut doc, "working_directory", string(&app.working_dir));
    }

    let mut commands = Hash::new();
    for service in &app.services {
        let mut entry = Hash::new();
        if let Some(pre) = &service.pre_cmd {
            insert(&mut entry, "pre", string(pre));
        }
        insert(&mut entry, "command", string(&service.cmd));
        if let Some(post) = &service.post_cmd {
            insert(&mut entry, "post", string(post));
        }

        let options = &service.options;
        if let Some(dir) = options.working_dir.as_deref().filter(|d| !d.is_empty()) {
            insert(&mut entry, "working_directory", string(dir));
        }
        if let Some(log) = options.log_file.as_deref().filter(|l| !l.is_empty()) {
            insert(&mut entry, "log", string(log));
        }
        if options.is_env_set() {
            let mut vars: Vec<_> = options.env.iter().collect();
            vars.sort();
            let mut env = Hash::new();
            for (key, value) in vars {
                insert(&mut env, key, string(value));
            }
            insert(&mut entry, "env", Yaml::Hash(env));
        }

        insert(&mut commands, &service.name, Yaml::Hash(entry));
    }
    insert(&mut doc, "commands", Yaml::Hash(commands));

    let mut out = String::new();
    YamlEmitter::new(&mut out)
        .dump(&Yaml::Hash(doc))
        .map_err(|e| Error::Render(e.to_string()))?;
    out.push('\n');

    Ok(out)
}

fn insert(hash: &mut Hash, key: &str, value: Yaml) {
    hash.insert(string(key), value);
}

fn string(value: &str) -> Yaml {
    Yaml::String(value.to_string())
}

fn non_zero_or(value: i64, default: i64) -> i64 {
    if value == 0 { default } else { value }
}
