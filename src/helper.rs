// src/helper.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use sysinfo::System;

use crate::globals::CPU_SYSFS_DIR;

/// Process-information collaborator used by the info panel.
///
/// `get_frequency` is blocking; the asynchronous side lives in
/// [`FrequencySampler`](crate::modules::FrequencySampler), which calls it from
/// worker threads.
pub trait CpuFreqHelper: Send + Sync {
    /// Run `command` and return its trimmed stdout, `None` on any failure.
    fn get_info_string(&self, command: &str) -> Option<String>;

    /// Current frequency of `core` as a display-ready label.
    fn get_frequency(&self, core: usize) -> Option<String>;
}

pub fn footer(length: usize) {
    println!("\n{}\n", "-".repeat(length));
}

pub fn run_info_command(command: &str) -> Result<String> {
    let mut parts = command.split_whitespace();
    let program = match parts.next() {
        Some(p) => p,
        None => bail!("Empty command"),
    };

    let output = Command::new(program)
        .args(parts)
        .stderr(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run '{}'", command))?;

    if !output.status.success() {
        bail!("'{}' exited with {}", command, output.status);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Format a kHz reading the way the panel shows it.
pub fn format_frequency_khz(khz: u64) -> String {
    if khz >= 1_000_000 {
        format!("{:.2} GHz", khz as f64 / 1_000_000.0)
    } else {
        format!("{} MHz", khz / 1000)
    }
}

fn read_khz(path: &Path) -> Option<u64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&khz| khz > 0)
}

/// Reads per-core frequencies from cpufreq sysfs, falling back to `sysinfo`
/// when the kernel exposes no cpufreq policy for the core.
pub struct SysfsHelper {
    cpu_dir: PathBuf,
    sysinfo_fallback: bool,
    system: Mutex<Option<System>>,
}

impl SysfsHelper {
    pub fn new(cpu_dir: impl Into<PathBuf>) -> Self {
        Self {
            cpu_dir: cpu_dir.into(),
            sysinfo_fallback: true,
            system: Mutex::new(None),
        }
    }

    /// Disable the `sysinfo` fallback so only files under `cpu_dir` are read.
    pub fn sysfs_only(mut self) -> Self {
        self.sysinfo_fallback = false;
        self
    }

    pub fn cpu_dir(&self) -> &Path {
        &self.cpu_dir
    }

    /// Whether the kernel exposes a cpufreq policy for cpu0 under `cpu_dir`.
    pub fn has_cpufreq(&self) -> bool {
        self.cpu_dir.join("cpu0/cpufreq").is_dir()
    }

    fn read_sysfs_khz(&self, core: usize) -> Option<u64> {
        let cpufreq = self.cpu_dir.join(format!("cpu{}", core)).join("cpufreq");
        read_khz(&cpufreq.join("scaling_cur_freq"))
            .or_else(|| read_khz(&cpufreq.join("cpuinfo_cur_freq")))
    }

    fn read_sysinfo_khz(&self, core: usize) -> Option<u64> {
        let mut guard = self.system.lock().ok()?;
        let sys = guard.get_or_insert_with(System::new);
        sys.refresh_cpu();
        sys.cpus()
            .get(core)
            .map(|cpu| cpu.frequency())
            .filter(|&mhz| mhz > 0)
            .map(|mhz| mhz * 1000)
    }
}

impl Default for SysfsHelper {
    fn default() -> Self {
        Self::new(CPU_SYSFS_DIR)
    }
}

impl CpuFreqHelper for SysfsHelper {
    fn get_info_string(&self, command: &str) -> Option<String> {
        match run_info_command(command) {
            Ok(s) if !s.is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                log::warn!("{:#}", e);
                None
            }
        }
    }

    fn get_frequency(&self, core: usize) -> Option<String> {
        let khz = self.read_sysfs_khz(core).or_else(|| {
            if self.sysinfo_fallback {
                log::debug!("No cpufreq reading for cpu{}, asking sysinfo", core);
                self.read_sysinfo_khz(core)
            } else {
                None
            }
        });

        khz.map(format_frequency_khz)
    }
}
