// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Option resolution. Each service is filled from the shared block first and
//! from the global config second; a value set by an earlier source is never
//! overwritten by a later one.

use crate::model::{Application, Config, ServiceOptions};

/// Apply both fill stages to every service of `app`.
pub fn resolve(app: &mut Application, shared: &ServiceOptions, config: &Config) {
    for service in &mut app.services {
        merge_shared(&mut service.options, shared);
        fill_from_config(&mut service.options, config);
    }
}

/// Copy every field unset in `dst` from `src`. Environment maps are united
/// without overwriting keys `dst` already has.
pub fn merge_shared(dst: &mut ServiceOptions, src: &ServiceOptions) {
    fn fill_str(dst: &mut Option<String>, src: &Option<String>) {
        if dst.as_deref().is_none_or(str::is_empty) {
            dst.clone_from(src);
        }
    }

    fn fill_num(dst: &mut i64, src: i64) {
        if *dst == 0 {
            *dst = src;
        }
    }

    for (key, value) in &src.env {
        dst.env.entry(key.clone()).or_insert_with(|| value.clone());
    }

    fill_str(&mut dst.working_dir, &src.working_dir);
    fill_str(&mut dst.log_file, &src.log_file);
    fill_str(&mut dst.env_file, &src.env_file);
    fill_str(&mut dst.kill_signal, &src.kill_signal);
    fill_str(&mut dst.kill_mode, &src.kill_mode);
    fill_str(&mut dst.reload_signal, &src.reload_signal);

    fill_num(&mut dst.kill_timeout, src.kill_timeout);
    fill_num(&mut dst.count, src.count);

    if dst.respawn.enabled.is_none() {
        dst.respawn.enabled = src.respawn.enabled;
    }
    fill_num(&mut dst.respawn.count, src.respawn.count);
    fill_num(&mut dst.respawn.interval, src.respawn.interval);
    fill_num(&mut dst.respawn.delay, src.respawn.delay);

    fill_num(&mut dst.limits.nofile, src.limits.nofile);
    fill_num(&mut dst.limits.nproc, src.limits.nproc);
    fill_num(&mut dst.limits.memlock, src.limits.memlock);

    match (&mut dst.resources, &src.resources) {
        (Some(own), Some(common)) => own.fill_from(common),
        (own @ None, Some(common)) => *own = Some(common.clone()),
        _ => {}
    }
}

/// Fill still-unset limits, kill timeout and respawn policy from the global
/// config.
pub fn fill_from_config(options: &mut ServiceOptions, config: &Config) {
    if options.limits.nofile == 0 {
        options.limits.nofile = config.limit_file;
    }
    if options.limits.nproc == 0 {
        options.limits.nproc = config.limit_proc;
    }
    if options.limits.memlock == 0 {
        options.limits.memlock = config.limit_memlock;
    }
    if options.kill_timeout == 0 {
        options.kill_timeout = config.kill_timeout;
    }

    if config.is_respawn_enabled {
        options.respawn.enabled = Some(true);
    }

    if options.is_respawn_enabled() {
        if options.respawn.count == 0 {
            options.respawn.count = config.respawn_count;
        }
        if options.respawn.interval == 0 {
            options.respawn.interval = config.respawn_interval;
        }
        if options.respawn.delay == 0 {
            options.respawn.delay = config.respawn_delay;
        }
    }
}
