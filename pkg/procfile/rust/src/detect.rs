// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::model::ProcVersion;

#[allow(clippy::expect_used)] // constant pattern
static V2_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*version:\s*2\s*$").expect("valid v2 marker regex"));

/// Decide which grammar applies. Anything without a `version: 2` line is v1.
pub fn detect_version(data: &[u8]) -> ProcVersion {
    if V2_MARKER.is_match(data) {
        ProcVersion::V2
    } else {
        ProcVersion::V1
    }
}
