//! Discovery of the `.formcalc/` directory.
//!
//! The `.formcalc/` directory holds `config.yaml` for a project. It is found
//! by walking up from the working directory, unless `FORMCALC_DIR` points
//! somewhere explicitly.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CONFIG_FILE_NAME;

/// The name of the formcalc metadata directory.
pub const CONFIG_DIR_NAME: &str = ".formcalc";

/// Environment variable that overrides directory discovery.
pub const CONFIG_DIR_ENV: &str = "FORMCALC_DIR";

/// Walk up the directory tree from `start` looking for a `.formcalc/` directory.
///
/// `FORMCALC_DIR` is checked first and wins when it names an existing
/// directory. Returns `None` when the filesystem root is reached.
///
/// # Examples
///
/// ```no_run
/// use formcalc_config::config_dir::find_config_dir;
/// use std::path::Path;
///
/// if let Some(dir) = find_config_dir(Path::new(".")) {
///     println!("Found config dir at {}", dir.display());
/// }
/// ```
pub fn find_config_dir(start: &Path) -> Option<PathBuf> {
    if let Ok(env_dir) = std::env::var(CONFIG_DIR_ENV) {
        let env_path = PathBuf::from(&env_dir);
        if env_path.is_dir() {
            debug!(path = %env_path.display(), "using {}", CONFIG_DIR_ENV);
            return Some(env_path);
        }
    }

    let start = start.canonicalize().ok()?;
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .find(|candidate| candidate.is_dir())
}

/// Resolve the config file to load.
///
/// An explicit path is returned as-is. Otherwise the discovered
/// `.formcalc/config.yaml` is used, or `None` when there is no `.formcalc/`
/// directory and defaults apply.
pub fn resolve_config_path(explicit: Option<&Path>, start: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_dir(start).map(|dir| dir.join(CONFIG_FILE_NAME)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_config_dir_in_child() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".formcalc")).unwrap();
            std::fs::create_dir_all(jail.directory().join("forms/deep")).unwrap();
            let found = find_config_dir(&jail.directory().join("forms/deep")).unwrap();
            let expected = jail.directory().join(".formcalc").canonicalize().unwrap();
            assert_eq!(found.canonicalize().unwrap(), expected);
            Ok(())
        });
    }

    #[test]
    fn test_env_var_wins() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".formcalc")).unwrap();
            std::fs::create_dir_all(jail.directory().join("elsewhere")).unwrap();
            let elsewhere = jail.directory().join("elsewhere");
            jail.set_env(CONFIG_DIR_ENV, elsewhere.display());
            assert_eq!(find_config_dir(jail.directory()), Some(elsewhere));
            Ok(())
        });
    }

    #[test]
    fn test_env_var_ignored_when_missing() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".formcalc")).unwrap();
            jail.set_env(CONFIG_DIR_ENV, jail.directory().join("nope").display());
            let found = find_config_dir(jail.directory()).unwrap();
            assert!(found.ends_with(CONFIG_DIR_NAME));
            Ok(())
        });
    }

    #[test]
    fn test_missing_start_means_defaults() {
        Jail::expect_with(|jail| {
            let missing = jail.directory().join("missing");
            assert_eq!(find_config_dir(&missing), None);
            assert_eq!(resolve_config_path(None, &missing), None);
            Ok(())
        });
    }

    #[test]
    fn test_resolve_config_path() {
        Jail::expect_with(|jail| {
            let explicit = Path::new("/etc/formcalc.yaml");
            assert_eq!(
                resolve_config_path(Some(explicit), jail.directory()),
                Some(explicit.to_path_buf())
            );

            std::fs::create_dir_all(jail.directory().join(".formcalc")).unwrap();
            let resolved = resolve_config_path(None, jail.directory()).unwrap();
            assert!(resolved.ends_with(".formcalc/config.yaml"));
            Ok(())
        });
    }
}
