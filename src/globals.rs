// src/globals.rs

pub const CPUINFO_PATH: &str = "/proc/cpuinfo";
pub const OS_RELEASE_PATH: &str = "/etc/os-release";
pub const CPU_SYSFS_DIR: &str = "/sys/devices/system/cpu";

pub const CPU_MODEL_PREFIX: &str = "model name";
pub const PRETTY_NAME_PREFIX: &str = "PRETTY_NAME=";

pub const UNKNOWN_PROCESSOR: &str = "unknown processor";
pub const DISTRO_PREFIX: &str = "GNU/Linux";

/// Shown in a core cell until its first successful sample.
pub const FREQUENCY_PLACEHOLDER: &str = "---";

pub const UNAME_COMMAND: &str = "uname -r";

pub const DEFAULT_REFRESH_SECS: u64 = 2;
pub const MIN_REFRESH_SECS: u64 = 1;
pub const DEFAULT_COLUMNS: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallbacks() {
        assert_eq!(UNKNOWN_PROCESSOR, "unknown processor");
        assert_eq!(FREQUENCY_PLACEHOLDER, "---");
        assert!(MIN_REFRESH_SECS <= DEFAULT_REFRESH_SECS);
    }
}
