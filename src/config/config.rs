// src/config/config.rs

use anyhow::{bail, Result};
use notify::event::{AccessKind, AccessMode, CreateKind, EventKind, ModifyKind, RemoveKind};
use notify::{RecursiveMode, Watcher};

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use configparser::ini::Ini;

use crate::globals::*;
use crate::modules::system_info::InfoSources;

const PANEL: &str = "panel";

pub struct Config {
    path: Arc<Mutex<PathBuf>>,
    config: Arc<Mutex<Ini>>,
    watcher: Arc<Mutex<Option<notify::RecommendedWatcher>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    if let Err(e) = ini.load(path.to_str().unwrap_or("")) {
        bail!("{}", e);
    }
    Ok(ini)
}

impl Config {
    pub fn new() -> Self {
        Config {
            path: Arc::new(Mutex::new(PathBuf::new())),
            config: Arc::new(Mutex::new(Ini::new())),
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_path(&self, path: PathBuf) -> Result<()> {
        *lock(&self.path) = path.clone();

        if path.exists() {
            self.update_config()?;
        }

        if let Err(e) = self.setup_watcher(&path) {
            log::warn!("Config changes will not be picked up: {:#}", e);
        }

        Ok(())
    }

    fn setup_watcher(&self, path: &Path) -> Result<()> {
        let config_clone: Arc<Mutex<Ini>> = Arc::clone(&self.config);
        let path_clone = Arc::clone(&self.path);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let should_update = matches!(
                        event.kind,
                        EventKind::Create(CreateKind::File)
                            | EventKind::Modify(ModifyKind::Data(_))
                            | EventKind::Access(AccessKind::Close(AccessMode::Write))
                            | EventKind::Remove(RemoveKind::File)
                    );
                    if !should_update {
                        return;
                    }

                    let current_path = lock(&path_clone).clone();
                    if !event.paths.iter().any(|p| p == &current_path) {
                        return;
                    }

                    if !current_path.exists() {
                        log::info!("Config file {} removed, using defaults", current_path.display());
                        *lock(&config_clone) = Ini::new();
                        return;
                    }

                    match load_ini(&current_path) {
                        Ok(new_config) => {
                            log::info!("Reloaded config from {}", current_path.display());
                            *lock(&config_clone) = new_config;
                        }
                        Err(e) => log::warn!("Keeping previous config: {}", e),
                    }
                }
                Err(e) => log::warn!("Watch error: {:?}", e),
            }
        })?;

        if let Some(parent) = path.parent().filter(|p| p.is_dir()) {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *lock(&self.watcher) = Some(watcher);

        Ok(())
    }

    pub fn has_config(&self) -> bool {
        lock(&self.path).exists()
    }

    pub fn get_path(&self) -> PathBuf {
        lock(&self.path).clone()
    }

    pub fn update_config(&self) -> Result<()> {
        let path = lock(&self.path).clone();

        match load_ini(&path) {
            Ok(new_config) => {
                *lock(&self.config) = new_config;
            }
            Err(e) => {
                // Don't propagate the error, just log it
                log::error!("The following error occurred while parsing the config file:\n{}", e);
            }
        }
        Ok(())
    }

    pub fn load_str(&self, content: &str) -> Result<()> {
        let mut ini = Ini::new();
        if let Err(e) = ini.read(content.to_string()) {
            bail!("{}", e);
        }
        *lock(&self.config) = ini;
        Ok(())
    }

    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        lock(&self.config).get(section, key)
    }

    pub fn get_uint(&self, section: &str, key: &str) -> Result<Option<u64>> {
        match self.get_string(section, key) {
            Some(s) => match s.trim().parse::<u64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => bail!("Invalid value for [{}] {}: {}", section, key, s),
            },
            None => Ok(None),
        }
    }

    pub fn has_option(&self, section: &str, key: &str) -> bool {
        self.get_string(section, key).is_some()
    }

    pub fn get(&self, section: &str, key: &str, fallback: &str) -> String {
        self.get_string(section, key)
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Panel refresh interval, never below the minimum.
    pub fn refresh_interval(&self) -> Duration {
        let secs = match self.get_uint(PANEL, "refresh_interval") {
            Ok(v) => v.unwrap_or(DEFAULT_REFRESH_SECS),
            Err(e) => {
                log::warn!("{}", e);
                DEFAULT_REFRESH_SECS
            }
        };
        Duration::from_secs(secs.max(MIN_REFRESH_SECS))
    }

    pub fn columns(&self) -> usize {
        match self.get_uint(PANEL, "columns") {
            Ok(Some(v)) if v > 0 => v as usize,
            Ok(_) => DEFAULT_COLUMNS,
            Err(e) => {
                log::warn!("{}", e);
                DEFAULT_COLUMNS
            }
        }
    }

    pub fn info_sources(&self) -> InfoSources {
        InfoSources {
            cpuinfo: PathBuf::from(self.get(PANEL, "cpuinfo_path", CPUINFO_PATH)),
            os_release: PathBuf::from(self.get(PANEL, "os_release_path", OS_RELEASE_PATH)),
        }
    }

    pub fn cpu_sysfs_dir(&self) -> PathBuf {
        PathBuf::from(self.get(PANEL, "cpu_sysfs_dir", CPU_SYSFS_DIR))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// Global config instance
lazy_static::lazy_static! {
    pub static ref CONFIG: Config = Config::new();
}

/// Find the config file to use
///
/// Look for a config file in the following prioritization order:
/// 1. Command line argument
/// 2. User config file
/// 3. System config file
pub fn find_config_file(args_config_file: Option<&str>) -> Result<PathBuf> {
    // (1) Command line argument was specified
    if let Some(config_path) = args_config_file {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Ok(path);
        }
        bail!("Config file specified with '--config {}' not found.", config_path);
    }

    let user_config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| get_home_dir().join(".config"));

    // (2) User config file
    let user_config_file = user_config_dir.join("cpufreq-info/cpufreq-info.conf");
    if user_config_file.is_file() {
        return Ok(user_config_file);
    }

    // (3) System config file (default if nothing else is found)
    Ok(PathBuf::from("/etc/cpufreq-info.conf"))
}

fn get_home_dir() -> PathBuf {
    // Try to get home directory from $SUDO_USER or $USER
    let output = Command::new("sh")
        .arg("-c")
        .arg("getent passwd ${SUDO_USER:-$USER} | cut -d: -f6")
        .output();

    match output {
        Ok(output) if output.status.success() && !output.stdout.is_empty() => {
            let home = String::from_utf8_lossy(&output.stdout);
            PathBuf::from(home.trim())
        }
        _ => {
            // Fallback to HOME environment variable
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/root"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert!(!config.has_config());
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.columns(), 4);
        assert_eq!(config.cpu_sysfs_dir(), PathBuf::from("/sys/devices/system/cpu"));

        let sources = config.info_sources();
        assert_eq!(sources.cpuinfo, PathBuf::from("/proc/cpuinfo"));
        assert_eq!(sources.os_release, PathBuf::from("/etc/os-release"));
    }

    #[test]
    fn test_panel_overrides() {
        let config = Config::new();
        config
            .load_str("[panel]\nrefresh_interval = 5\ncolumns = 8\ncpuinfo_path = /tmp/cpuinfo\n")
            .unwrap();

        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.columns(), 8);
        assert_eq!(config.info_sources().cpuinfo, PathBuf::from("/tmp/cpuinfo"));
        assert!(config.has_option("panel", "columns"));
        assert!(!config.has_option("panel", "os_release_path"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::new();
        config
            .load_str("[panel]\nrefresh_interval = 0\ncolumns = lots\n")
            .unwrap();

        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.columns(), 4);
        assert!(config.get_uint("panel", "columns").is_err());
    }

    #[test]
    fn test_set_path_loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpufreq-info.conf");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[panel]\ncolumns = 2").unwrap();

        let config = Config::new();
        config.set_path(path.clone()).unwrap();
        assert!(config.has_config());
        assert_eq!(config.get_path(), path);
        assert_eq!(config.columns(), 2);
    }

    fn wait_for_columns(config: &Config, expected: usize) -> usize {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while config.columns() != expected && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        config.columns()
    }

    #[test]
    fn test_watcher_reloads_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpufreq-info.conf");
        std::fs::write(&path, "[panel]\ncolumns = 2\n").unwrap();

        let config = Config::new();
        config.set_path(path.clone()).unwrap();
        assert_eq!(config.columns(), 2);

        std::fs::write(&path, "[panel]\ncolumns = 6\n").unwrap();
        assert_eq!(wait_for_columns(&config, 6), 6);
    }

    #[test]
    fn test_watcher_removed_file_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpufreq-info.conf");
        std::fs::write(&path, "[panel]\ncolumns = 3\nrefresh_interval = 9\n").unwrap();

        let config = Config::new();
        config.set_path(path.clone()).unwrap();
        assert_eq!(config.columns(), 3);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(wait_for_columns(&config, DEFAULT_COLUMNS), DEFAULT_COLUMNS);
        assert_eq!(config.refresh_interval(), Duration::from_secs(DEFAULT_REFRESH_SECS));
        assert!(!config.has_config());
    }

    #[test]
    fn test_find_config_file_missing_arg() {
        assert!(find_config_file(Some("/nonexistent/cpufreq-info.conf")).is_err());
    }
}
