// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::PathBuf;

use procfile::{Application, Config, Error, ProcVersion, ServiceOptions, ValidationError};

fn testdata(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn config() -> Config {
    Config {
        name: "test_app".into(),
        user: "service".into(),
        group: "service".into(),
        working_dir: "/tmp".into(),
        limit_file: 10240,
        limit_proc: 10240,
        kill_timeout: 30,
        ..Config::default()
    }
}

fn options<'a>(app: &'a Application, name: &str) -> &'a ServiceOptions {
    &app.service(name).expect("service exists").service().options
}

#[test]
fn test_v1_file() {
    let app = procfile::read(testdata("procfile_v1"), &config()).unwrap();

    assert_eq!(app.proc_version, ProcVersion::V1);
    assert_eq!(app.name, "test_app");
    assert_eq!(app.working_dir, "/tmp");
    assert_eq!(app.services.len(), 4);
    assert!(procfile::validate(&app).is_empty());

    let tail = app.service("my_tail_cmd").unwrap();
    assert_eq!(tail.cmd, "/usr/bin/tail -F /var/log/messages");
    assert_eq!(tail.working_dir(), "/tmp");
    assert!(!tail.options.is_respawn_enabled());
    assert_eq!(tail.options.limits.nofile, 10240);
    assert_eq!(tail.options.kill_timeout, 30);

    let another = app.service("my_another_tail_cmd").unwrap();
    assert_eq!(another.options.log_file.as_deref(), Some("/var/log/tail.log"));

    let cd = app.service("cmd_with_cd").unwrap();
    assert_eq!(cd.working_dir(), "/srv/projects/my_website/current");
    assert_eq!(cd.options.env_string(), "RAILS_ENV=staging STAGING_ENV=1");

    let chained = app.service("chained").unwrap();
    assert_eq!(chained.pre_cmd.as_deref(), Some("./bin/migrate"));
    assert_eq!(chained.cmd, "./bin/server");
    assert_eq!(chained.post_cmd.as_deref(), Some("./bin/notify"));
    assert_eq!(chained.full_log_path().as_deref(), Some("/srv/app/log/server.log"));
}

#[test]
fn test_v2_file() {
    let app = procfile::read(testdata("procfile_v2"), &config()).unwrap();

    assert_eq!(app.proc_version, ProcVersion::V2);
    assert_eq!(app.start_level, 2);
    assert_eq!(app.stop_level, 5);
    assert_eq!(app.working_dir, "/srv/projects/my_website/current");
    assert!(app.is_reload_signal_set());
    assert!(procfile::validate(&app).is_empty());

    let tail = options(&app, "my_tail_cmd");
    assert_eq!(tail.count, 2);
    assert_eq!(tail.env["RAILS_ENV"], "production");
    assert_eq!(tail.env["TEST"], "true");
    assert_eq!(tail.kill_timeout, 60);
    assert_eq!(tail.limits.nofile, 4096);
    assert_eq!(tail.limits.nproc, 2048);
    assert!(tail.is_respawn_enabled());
    assert_eq!(
        app.service("my_tail_cmd").unwrap().full_log_path().as_deref(),
        Some("/srv/projects/my_website/current/log/my_tail_cmd.log")
    );

    let another = options(&app, "my_another_tail_cmd");
    assert_eq!(another.kill_timeout, 5);
    assert_eq!(another.kill_mode.as_deref(), Some("process"));
    assert!(!another.is_respawn_enabled());
    assert_eq!(another.env_file.as_deref(), Some(".env"));

    let worker = app.service("cmd_with_respawn").unwrap();
    assert_eq!(worker.cmd, "/usr/bin/ruby worker.rb");
    assert_eq!(worker.working_dir(), "/srv/worker");
    assert_eq!(worker.options.log_file.as_deref(), Some("/var/log/worker.log"));
    assert_eq!(worker.options.respawn.count, 3);
    assert_eq!(worker.options.respawn.interval, 20);
    assert_eq!(worker.options.respawn.delay, 4);
    assert_eq!(worker.options.limits.nofile, 1024);
    assert_eq!(worker.options.limits.nproc, 2048);
    assert_eq!(worker.options.limits.memlock, -1);
    let resources = worker.options.resources.as_ref().unwrap();
    assert_eq!(resources.cpu_weight, Some(50));
    assert_eq!(resources.tasks_max, Some(64));
}

#[test]
fn test_key_order_does_not_change_resolved_options() {
    let app = procfile::read(testdata("procfile_v2"), &config()).unwrap();
    let reordered = procfile::read(testdata("procfile_v2_reordered"), &config()).unwrap();

    assert_eq!(app.start_level, reordered.start_level);
    assert_eq!(app.stop_level, reordered.stop_level);
    assert_eq!(app.working_dir, reordered.working_dir);
    assert_eq!(app.services.len(), reordered.services.len());

    for service in &app.services {
        let other = reordered.service(&service.name).unwrap();
        assert_eq!(service, other.service(), "{}", service.name);
    }
}

#[test]
fn test_merge_precedence() {
    let data = b"\
version: 2
kill_timeout: 20
limits:
  nofile: 2048
commands:
  own:
    command: ./own
    kill_timeout: 10
    limits:
      nofile: 1024
  shared:
    command: ./shared
";
    let config = Config {
        kill_timeout: 99,
        limit_file: 9999,
        limit_proc: 77,
        ..config()
    };
    let app = procfile::parse(data, &config).unwrap();

    let own = options(&app, "own");
    assert_eq!(own.kill_timeout, 10);
    assert_eq!(own.limits.nofile, 1024);
    assert_eq!(own.limits.nproc, 77);

    let shared = options(&app, "shared");
    assert_eq!(shared.kill_timeout, 20);
    assert_eq!(shared.limits.nofile, 2048);
    assert_eq!(shared.limits.nproc, 77);
}

#[test]
fn test_respawn_default_differs_by_format() {
    let v2 = procfile::parse(b"version: 2\ncommands:\n  api:\n    command: serve\n", &config()).unwrap();
    assert!(options(&v2, "api").is_respawn_enabled());

    let v1 = procfile::parse(b"api: serve\n", &config()).unwrap();
    assert!(!options(&v1, "api").is_respawn_enabled());

    let forced = Config {
        is_respawn_enabled: true,
        ..config()
    };
    let v1 = procfile::parse(b"api: serve\n", &forced).unwrap();
    assert!(options(&v1, "api").is_respawn_enabled());
}

#[test]
fn test_partial_respawn_limit_takes_the_rest_from_config() {
    let config = Config {
        respawn_count: 10,
        respawn_interval: 30,
        ..config()
    };
    let data = b"version: 2\ncommands:\n  web:\n    command: serve\n    respawn:\n      count: 5\n";
    let app = procfile::parse(data, &config).unwrap();

    let web = options(&app, "web");
    assert!(web.is_respawn_enabled());
    assert_eq!((web.respawn.count, web.respawn.interval), (5, 30));
}

#[test]
fn test_validation_reports_every_problem() {
    let app = procfile::read(testdata("procfile_invalid"), &config()).unwrap();
    let errors = procfile::validate(&app);

    assert!(errors.len() >= 3, "{errors:?}");
    assert!(errors.iter().any(|e| matches!(e, ValidationError::RunLevel { value: 9, .. })));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::UnsafePath { field: "log", .. })));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::KillMode { .. })));
}

#[test]
fn test_read_rejects_missing_and_empty_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("Procfile");
    assert!(matches!(
        procfile::read(&missing, &config()),
        Err(Error::File { reason: "does not exist", .. })
    ));

    fs::write(&missing, "").unwrap();
    assert!(matches!(
        procfile::read(&missing, &config()),
        Err(Error::File { reason: "is empty", .. })
    ));

    assert!(matches!(
        procfile::read(dir.path(), &config()),
        Err(Error::File { reason: "is not a regular file", .. })
    ));
}

#[test]
fn test_parse_errors_abort() {
    assert!(matches!(
        procfile::parse(b"web: cd /srv/app\n", &config()),
        Err(Error::Format(_))
    ));
    assert!(matches!(
        procfile::parse(b"version: 2\ncommands:\n  web:\n    command: x\n    kill_timeout: soon\n", &config()),
        Err(Error::Property { .. })
    ));
    assert!(matches!(
        procfile::parse(&[0xff, 0xfe, b'\n'], &config()),
        Err(Error::Format(_))
    ));
}
