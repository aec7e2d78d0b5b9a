// src/modules/system_info.rs
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sysinfo::System;

use crate::globals::*;
use crate::helper::CpuFreqHelper;

/// Static identification text shown at the top of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInfo {
    pub cpu_model_name: String,
    pub os_distribution_label: String,
    pub kernel_version: String,
}

/// Where the identity is read from.
#[derive(Debug, Clone)]
pub struct InfoSources {
    pub cpuinfo: PathBuf,
    pub os_release: PathBuf,
}

impl Default for InfoSources {
    fn default() -> Self {
        Self {
            cpuinfo: PathBuf::from(CPUINFO_PATH),
            os_release: PathBuf::from(OS_RELEASE_PATH),
        }
    }
}

impl IdentityInfo {
    /// One-shot scan of the identity sources. Never fails; every missing
    /// piece degrades to its fallback text.
    pub fn collect(sources: &InfoSources, helper: &dyn CpuFreqHelper) -> Self {
        let kernel_version = helper
            .get_info_string(UNAME_COMMAND)
            .or_else(System::kernel_version)
            .unwrap_or_default();

        Self {
            cpu_model_name: read_cpu_model(&sources.cpuinfo),
            os_distribution_label: read_os_label(&sources.os_release),
            kernel_version,
        }
    }

    /// Distribution label followed by a `Kernel` line when the version is known.
    pub fn linux_label(&self) -> String {
        if self.kernel_version.is_empty() {
            self.os_distribution_label.clone()
        } else {
            format!("{}\nKernel {}", self.os_distribution_label, self.kernel_version)
        }
    }
}

/// Return the first line of `path` containing `prefix`, stopping the scan there.
pub fn first_matching_line(path: &Path, prefix: &str) -> Result<Option<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            return Ok(None);
        }

        // lines are decoded one at a time so a bad byte elsewhere doesn't end the scan
        let line = String::from_utf8_lossy(&buf);
        if line.contains(prefix) {
            return Ok(Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()));
        }
    }
}

pub fn read_cpu_model(path: &Path) -> String {
    if !path.exists() {
        return UNKNOWN_PROCESSOR.to_string();
    }

    match first_matching_line(path, CPU_MODEL_PREFIX) {
        Ok(Some(line)) => {
            let value = line.split_once(':').map(|(_, v)| v).unwrap_or("");
            let model = normalize_cpu_model(value);
            if model.is_empty() {
                UNKNOWN_PROCESSOR.to_string()
            } else {
                model
            }
        }
        Ok(None) => UNKNOWN_PROCESSOR.to_string(),
        Err(e) => {
            log::warn!("Get CPU error: {:#}", e);
            UNKNOWN_PROCESSOR.to_string()
        }
    }
}

pub fn read_os_label(path: &Path) -> String {
    if !path.exists() {
        return DISTRO_PREFIX.to_string();
    }

    match first_matching_line(path, PRETTY_NAME_PREFIX) {
        Ok(Some(line)) => {
            let value = line
                .find(PRETTY_NAME_PREFIX)
                .map(|i| &line[i + PRETTY_NAME_PREFIX.len()..])
                .unwrap_or("");
            let label = normalize_pretty_name(value);
            if label.is_empty() {
                DISTRO_PREFIX.to_string()
            } else {
                label
            }
        }
        Ok(None) => DISTRO_PREFIX.to_string(),
        Err(e) => {
            log::warn!("Get release error: {:#}", e);
            DISTRO_PREFIX.to_string()
        }
    }
}

/// `Intel(R) Core(TM) i7-8550U CPU @ 1.80GHz` -> `Intel® Core™ i7-8550U CPU`
pub fn normalize_cpu_model(raw: &str) -> String {
    let mut model = raw.trim();
    if let Some(at) = model.rfind('@') {
        model = model[..at].trim();
    }

    model
        .replace("(R)", "®")
        .replace("(TM)", "™")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"Ubuntu 20.04 LTS (Focal Fossa)"` -> `Ubuntu 20.04 LTS Focal Fossa`
pub fn normalize_pretty_name(raw: &str) -> String {
    let mut label = raw.trim().replace('"', "");
    label = label.replacen(&format!("{} ", DISTRO_PREFIX), "", 1);

    if let Some(open) = label.find('(') {
        let rest = &label[open + 1..];
        if let Some(first) = rest.chars().next() {
            let tail = &rest[first.len_utf8()..];
            let codename: String = first.to_uppercase().collect();
            label = format!("{}{}{}", &label[..open], codename, tail).replacen(')', "", 1);
        }
    }

    label.trim().to_string()
}
