// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy Migrator (4.4): one-shot move of a workspace-local `.harness/`
//! directory into the global runtime and config roots.

use std::fs;
use std::path::{Path, PathBuf};

use harness_core::Paths;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("both the global and legacy config files have been modified; migration aborted")]
    MigrationConflict,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy `.harness/` directory was present; nothing to do.
    #[default]
    NotNeeded,
    /// Legacy state was moved into the global roots.
    Migrated,
}

/// Bootstrapped default config content, used to tell "untouched" from
/// "user-modified" global/legacy config files.
fn bootstrapped_default_config() -> &'static str {
    "{}\n"
}

/// Runs the migration for `paths` if a legacy `<workspace>/.harness/`
/// directory is present. Idempotent: a second call after a successful
/// migration is a no-op because the legacy directory no longer exists.
pub fn migrate(paths: &Paths) -> Result<MigrationOutcome, MigrateError> {
    let legacy_dir = paths.workspace_root.join(".harness");
    if !legacy_dir.is_dir() {
        return Ok(MigrationOutcome::NotNeeded);
    }

    move_if_present(&legacy_dir.join("gateway.json"), &paths.gateway_record)?;
    move_if_present(&legacy_dir.join("gateway.log"), &paths.gateway_log)?;

    migrate_config_file(
        &legacy_dir.join("harness.config.jsonc"),
        &paths.config_file,
    )?;
    move_if_present(&legacy_dir.join("secrets.env"), &paths.secrets_file)?;

    fs::remove_dir_all(&legacy_dir)?;
    println!("[migration] local .harness migrated");
    Ok(MigrationOutcome::Migrated)
}

fn move_if_present(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(src, dst)
}

/// Config migration follows the rule in 4.4: a global config file that is
/// byte-identical to the bootstrapped default is treated as untouched and
/// is safe to back up and replace; one that differs is "user-modified". A
/// legacy config that differs from the default is likewise "user-modified".
/// Two user-modified files in conflict abort the whole migration.
fn migrate_config_file(legacy: &Path, global: &Path) -> Result<(), MigrateError> {
    if !legacy.exists() {
        return Ok(());
    }

    let legacy_text = fs::read_to_string(legacy)?;
    let legacy_modified = legacy_text != bootstrapped_default_config();

    match fs::read_to_string(global) {
        Ok(global_text) => {
            let global_modified = global_text != bootstrapped_default_config();
            if global_modified && legacy_modified {
                return Err(MigrateError::MigrationConflict);
            }
            if !global_modified {
                let backup = backup_path(global);
                fs::write(&backup, global_text.as_bytes())?;
            }
            if let Some(parent) = global.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(legacy, global)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = global.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(legacy, global)?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn backup_path(config_path: &Path) -> PathBuf {
    let mut name = config_path.file_name().unwrap_or_default().to_os_string();
    name.push(".pre-migration.bak");
    config_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_core::paths::{resolve, MapEnv};

    fn test_paths(workspace: &Path) -> Paths {
        let mut env = std::collections::HashMap::new();
        env.insert("HOME".to_string(), workspace.join("home").to_string_lossy().to_string());
        resolve(workspace, None, &MapEnv(env)).unwrap()
    }

    #[test]
    fn no_legacy_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(dir.path());
        assert_eq!(migrate(&paths).unwrap(), MigrationOutcome::NotNeeded);
    }

    #[test]
    fn migrates_record_log_and_pristine_config() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join(".harness");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("gateway.json"), "{}").unwrap();
        fs::write(legacy.join("gateway.log"), "log").unwrap();
        fs::write(legacy.join("harness.config.jsonc"), "{\"a\":1}\n").unwrap();
        fs::write(legacy.join("secrets.env"), "KEY=1").unwrap();

        let paths = test_paths(dir.path());
        let outcome = migrate(&paths).unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated);
        assert!(paths.gateway_record.exists());
        assert!(paths.gateway_log.exists());
        assert!(paths.config_file.exists());
        assert!(paths.secrets_file.exists());
        assert!(!legacy.exists());
    }

    #[test]
    fn conflicting_user_modified_configs_abort() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join(".harness");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("harness.config.jsonc"), "{\"legacy\":true}\n").unwrap();

        let paths = test_paths(dir.path());
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.config_file, "{\"global\":true}\n").unwrap();

        let err = migrate(&paths).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationConflict));
        assert!(legacy.exists(), "conflicting migration must leave both configs intact");
    }

    #[test]
    fn untouched_global_config_is_backed_up_then_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join(".harness");
        fs::create_dir_all(&legacy).unwrap();
        fs::write(legacy.join("harness.config.jsonc"), "{\"legacy\":true}\n").unwrap();

        let paths = test_paths(dir.path());
        fs::create_dir_all(&paths.config_dir).unwrap();
        fs::write(&paths.config_file, bootstrapped_default_config()).unwrap();

        migrate(&paths).unwrap();
        assert_eq!(
            fs::read_to_string(&paths.config_file).unwrap(),
            "{\"legacy\":true}\n"
        );
        assert!(backup_path(&paths.config_file).exists());
    }
}
