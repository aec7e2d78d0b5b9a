// src/bin/cpufreq_info.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use cpufreq_info::config::{find_config_file, CONFIG};
use cpufreq_info::globals::MIN_REFRESH_SECS;
use cpufreq_info::helper::{footer, SysfsHelper};
use cpufreq_info::modules::{FrequencySampler, IdentityInfo, InfoPanel, SystemMonitor, ViewType};

#[derive(Parser, Debug)]
#[command(name = "cpufreq-info")]
#[command(about = "CPU identity and live per-core frequency panel for Linux", long_about = None)]
struct Args {
    /// Use config file at defined path
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Print the panel once and exit
    #[arg(long)]
    once: bool,

    /// Print a JSON snapshot of the panel and exit
    #[arg(long)]
    json: bool,

    /// Only print CPU, distribution and kernel identification
    #[arg(long)]
    identity: bool,

    /// Refresh interval in seconds (overrides the config file)
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Stop after this many refreshes
    #[arg(long, value_name = "N")]
    count: Option<u64>,

    /// Show debug output
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cpufreq_info::init_logging(args.verbose);

    let config_path = find_config_file(args.config.as_deref())?;
    CONFIG.set_path(config_path)?;
    if CONFIG.has_config() {
        log::info!("Using settings defined in {} file", CONFIG.get_path().display());
    }

    let interval = match args.interval {
        Some(secs) if secs < MIN_REFRESH_SECS => {
            bail!("--interval must be at least {} second(s)", MIN_REFRESH_SECS)
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    let cpu_count = num_cpus::get();
    let helper = Arc::new(SysfsHelper::new(CONFIG.cpu_sysfs_dir()));
    if !helper.has_cpufreq() {
        log::debug!(
            "No cpufreq policy under {}, frequencies come from sysinfo",
            helper.cpu_dir().display()
        );
    }

    let identity = IdentityInfo::collect(&CONFIG.info_sources(), helper.as_ref());

    if args.identity {
        footer(79);
        println!("{}", identity.cpu_model_name);
        println!("{}", identity.linux_label());
        println!("Cores: {}", cpu_count);
        footer(79);
        return Ok(());
    }

    let panel = InfoPanel::with_columns(identity, cpu_count, CONFIG.columns());
    let sampler = FrequencySampler::new(helper);

    if args.json {
        let mut monitor = SystemMonitor::new(ViewType::Stats, panel, sampler);
        monitor.update();
        println!("{}", serde_json::to_string_pretty(&monitor.snapshot())?);
    } else if args.once {
        let mut monitor = SystemMonitor::new(ViewType::Stats, panel, sampler);
        monitor.update();
        println!("{}", monitor.render());
    } else {
        let mut monitor = SystemMonitor::new(ViewType::Live, panel, sampler);
        monitor.run_blocking(interval, args.count);
    }

    Ok(())
}
