// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use log::debug;

use crate::errors::ExportError;

pub(crate) const UNIT_PERMS: u32 = 0o644;
pub(crate) const HELPER_PERMS: u32 = 0o755;

/// Write `data` next to `path` and rename it into place, so readers never see
/// a half-written unit.
pub(crate) fn write_file(path: &Path, data: &str, mode: u32) -> Result<(), ExportError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(&tmp_path)
        .map_err(ExportError::io(&tmp_path))?;
    file.write_all(data.as_bytes())
        .map_err(ExportError::io(&tmp_path))?;
    // The umask may have narrowed the mode given at creation.
    file.set_permissions(fs::Permissions::from_mode(mode))
        .map_err(ExportError::io(&tmp_path))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(ExportError::io(path))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

pub(crate) fn create_dir(path: &Path) -> Result<(), ExportError> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .map_err(ExportError::io(path))
}

/// Remove `path`; a missing file is not an error.
pub(crate) fn remove_file(path: &Path) -> Result<bool, ExportError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ExportError::io(path)(e)),
    }
}

/// Remove every regular file directly in `dir` whose name matches the glob
/// `pattern`. Returns the removed paths, sorted.
pub(crate) fn delete_by_pattern(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ExportError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ExportError::io(dir)(e)),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ExportError::io(dir))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !glob_match::glob_match(pattern, name) {
            continue;
        }
        if !entry.file_type().map_err(ExportError::io(entry.path()))?.is_file() {
            continue;
        }

        let path = entry.path();
        if remove_file(&path)? {
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}
