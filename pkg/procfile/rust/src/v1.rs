// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Legacy line grammar: `label: [cd DIR &&] [pre &&] main [&& post]`.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::Parsed;
use crate::errors::Error;
use crate::model::{Application, Config, ProcVersion, Service, ServiceOptions};

#[allow(clippy::expect_used)] // constant pattern
static LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\s:]+):\s*(.+)$").expect("valid v1 line regex"));

/// One `&&`-separated piece of a shell fragment with its decorations removed.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Clause {
    pub command: String,
    pub log: Option<String>,
    pub env: HashMap<String, String>,
}

pub(crate) fn parse(data: &str, config: &Config) -> Result<Parsed, Error> {
    debug!("Parsing procfile as v1");

    let mut services = Vec::new();
    for line in data.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        services.push(parse_line(line)?);
    }

    Ok(Parsed {
        application: Application::new(ProcVersion::V1, config, services),
        shared: ServiceOptions::default(),
    })
}

fn parse_line(line: &str) -> Result<Service, Error> {
    let Some((name, fragment)) = LINE
        .captures(line)
        .and_then(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
    else {
        return Err(Error::Format(format!(
            "procfile v1 should have format 'some_label: command', got: {line}"
        )));
    };

    let mut service = Service::new(name, "");
    let mut clauses: Vec<&str> = fragment.split("&&").map(str::trim).collect();

    if let Some(first) = clauses.first().copied()
        && (first == "cd" || first.starts_with("cd "))
    {
        let dir = first.trim_start_matches("cd").trim();
        if !dir.is_empty() {
            service.options.working_dir = Some(dir.to_string());
        }
        clauses.remove(0);

        if clauses.is_empty() {
            return Err(Error::Format(format!(
                "service {name}: 'cd' must be followed by a command"
            )));
        }
    }

    if clauses.iter().any(|c| c.is_empty()) {
        return Err(Error::Format(format!("service {name}: empty command in '{fragment}'")));
    }

    let (pre, main, post) = match clauses.as_slice() {
        [main] => (None, *main, None),
        [pre, main] => (Some(*pre), *main, None),
        [pre, main, post] => (Some(*pre), *main, Some(*post)),
        _ => {
            return Err(Error::Format(format!(
                "service {name}: at most pre, main and post commands can be chained"
            )));
        }
    };

    let main = scan_clause(main);
    service.cmd = main.command;
    service.options.log_file = main.log;
    service.options.env = main.env;
    service.pre_cmd = pre.map(|c| scan_clause(c).command);
    service.post_cmd = post.map(|c| scan_clause(c).command);

    Ok(service)
}

/// Split a clause into its command body, a leading `env K=V ...` prefix and a
/// trailing `>> logfile` redirection.
pub(crate) fn scan_clause(fragment: &str) -> Clause {
    let mut clause = Clause::default();
    let mut tokens = fragment.split_whitespace().peekable();

    let capture_env = match tokens.peek() {
        Some(&"env") => {
            tokens.next();
            true
        }
        Some(first) => first.contains('='),
        None => false,
    };

    if capture_env {
        while let Some((key, value)) = tokens.peek().and_then(|t| t.split_once('=')) {
            if key.is_empty() {
                break;
            }
            clause.env.insert(key.to_string(), value.to_string());
            tokens.next();
        }
    }

    let mut body = Vec::new();
    while let Some(token) = tokens.next() {
        if let Some((head, tail)) = token.split_once(">>") {
            if !head.is_empty() && !is_fd_prefix(head) {
                body.push(head);
            }
            clause.log = if tail.is_empty() {
                tokens.next().map(str::to_string)
            } else {
                Some(tail.to_string())
            };
            break;
        }
        body.push(token);
    }

    clause.command = body.join(" ");
    clause
}

// `2>>file`, `&>>file`
fn is_fd_prefix(head: &str) -> bool {
    head == "&" || head.chars().all(|c| c.is_ascii_digit())
}
