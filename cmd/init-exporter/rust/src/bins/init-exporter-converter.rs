// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::Result;
use clap::Parser;
use init_exporter::cli::ConvertArgs;

fn main() -> Result<()> {
    let args = ConvertArgs::parse();

    if let Some(data) = init_exporter::convert(&args)? {
        print!("{data}");
    }
    Ok(())
}
