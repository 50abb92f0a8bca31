// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Fixtures shared by the unit tests.

use std::cell::RefCell;
use std::io;

use procfile::{Application, Config, Limits, ProcVersion, Resources, RespawnOptions, Service};

use crate::exec::{CommandOutput, CommandRunner};

/// Records every command and answers with a canned output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<String>>,
    output: CommandOutput,
}

impl RecordingRunner {
    pub fn with_stdout(stdout: &str) -> Self {
        Self {
            output: CommandOutput {
                stdout: stdout.to_string(),
                ..CommandOutput::default()
            },
            ..Self::default()
        }
    }

    pub fn failing(status: i32, stderr: &str) -> Self {
        Self {
            output: CommandOutput {
                status,
                stderr: stderr.to_string(),
                ..CommandOutput::default()
            },
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let mut call = vec![program];
        call.extend_from_slice(args);
        self.calls.borrow_mut().push(call.join(" "));
        Ok(self.output.clone())
    }
}

pub fn app_with(services: Vec<Service>) -> Application {
    let config = Config {
        name: "myapp".into(),
        user: "service".into(),
        group: "service".into(),
        working_dir: "/srv/myapp".into(),
        ..Config::default()
    };
    Application::new(ProcVersion::V2, &config, services)
}

/// `web`: a single instance with every option set.
/// `worker`: three bare instances with pre/post commands and an env file.
pub fn sample_app() -> Application {
    let mut web = Service::new("web", "./bin/web");
    web.options.env.insert("PORT".into(), "8080".into());
    web.options.env.insert("RACK_ENV".into(), "production".into());
    web.options.log_file = Some("log/web.log".into());
    web.options.kill_timeout = 30;
    web.options.kill_signal = Some("QUIT".into());
    web.options.reload_signal = Some("USR2".into());
    web.options.respawn = RespawnOptions {
        enabled: Some(true),
        count: 5,
        interval: 15,
        delay: 2,
    };
    web.options.limits = Limits {
        nofile: 4096,
        nproc: 0,
        memlock: -1,
    };
    web.options.resources = Some(Resources {
        cpu_quota: Some(40),
        memory_max: Some("1G".into()),
        ..Resources::default()
    });

    let mut worker = Service::new("worker", "./bin/worker");
    worker.pre_cmd = Some("./bin/prepare".into());
    worker.post_cmd = Some("./bin/cleanup".into());
    worker.options.env_file = Some(".env".into());
    worker.options.working_dir = Some("/srv/worker".into());
    worker.options.count = 3;

    app_with(vec![web, worker])
}
