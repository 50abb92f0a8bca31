// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt::Display;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::errors::ExportError;

/// Line-oriented text for unit files and scripts. Lines are collected in
/// blocks; empty blocks disappear and the rest are separated by one blank
/// line, so optional directives never leave holes behind.
#[derive(Debug, Default)]
pub(crate) struct Template {
    blocks: Vec<Vec<String>>,
}

impl Template {
    pub fn new() -> Self {
        Self {
            blocks: vec![Vec::new()],
        }
    }

    /// Start a new block.
    pub fn block(&mut self) -> &mut Self {
        self.blocks.push(Vec::new());
        self
    }

    pub fn line(&mut self, line: impl Into<String>) -> &mut Self {
        if let Some(block) = self.blocks.last_mut() {
            block.push(line.into());
        }
        self
    }

    /// `Key=value`
    pub fn directive(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.line(format!("{key}={value}"))
    }

    /// `Key=value` only when `value` is present.
    pub fn directive_opt<T: Display>(&mut self, key: &str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.directive(key, value);
        }
        self
    }

    pub fn render(&self) -> String {
        let mut out = self
            .blocks
            .iter()
            .filter(|block| !block.is_empty())
            .map(|block| block.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push('\n');
        out
    }
}

/// Timestamp written into every generated file header.
pub(crate) fn export_date() -> Result<String, ExportError> {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]/[month]/[day] [hour]:[minute]:[second]"
        ))
        .map_err(|e| ExportError::Render(e.to_string()))
}
