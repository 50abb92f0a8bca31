// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use clap::Parser;
use init_exporter::cli::{Args, program_name};
use log::error;

fn main() -> Result<()> {
    let args = Args::parse();
    let program = program_name(std::env::args().next());

    init_exporter::run(&args, &program).inspect_err(|e| error!("{e:#}"))
}
