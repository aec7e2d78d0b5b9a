// src/modules/system_monitor.rs
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use serde_json::{json, Value};

use crate::modules::frequency_sampler::FrequencySampler;
use crate::modules::info_panel::{InfoPanel, PanelView, TextView};

/// How long a refresh waits for outstanding samples before rendering.
const SAMPLE_SETTLE: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    Stats,
    Live,
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewType::Stats => write!(f, "Stats"),
            ViewType::Live => write!(f, "Live"),
        }
    }
}

/// Refresh driver for the info panel: one sample request per core per tick.
pub struct SystemMonitor {
    pub view: ViewType,
    panel: InfoPanel,
    sampler: FrequencySampler,
    renderer: Box<dyn PanelView>,
    last_refresh: Option<chrono::DateTime<Local>>,
}

impl SystemMonitor {
    pub fn new(view: ViewType, panel: InfoPanel, sampler: FrequencySampler) -> Self {
        Self {
            view,
            panel,
            sampler,
            renderer: Box::new(TextView::default()),
            last_refresh: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn PanelView>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn panel(&self) -> &InfoPanel {
        &self.panel
    }

    /// Sample every core and wait briefly for the answers.
    pub fn update(&mut self) -> usize {
        self.panel.update(&mut self.sampler);
        let delivered = self.sampler.wait(SAMPLE_SETTLE);
        if self.sampler.pending() > 0 {
            log::debug!("{} samples still outstanding after refresh", self.sampler.pending());
        }
        self.last_refresh = Some(Local::now());
        delivered
    }

    pub fn render(&self) -> String {
        let body = self.renderer.render(&self.panel);
        match (self.view, self.last_refresh) {
            (ViewType::Live, Some(at)) => {
                format!("cpufreq-info · updated {}\n\n{}", at.format("%H:%M:%S"), body)
            }
            _ => body,
        }
    }

    pub fn snapshot(&self) -> Value {
        let identity = self.panel.identity();
        let cores: Vec<Value> = self
            .panel
            .cells()
            .into_iter()
            .map(|c| json!({ "core": c.core, "title": c.title, "frequency": c.frequency_label }))
            .collect();

        json!({
            "cpu_model_name": identity.cpu_model_name,
            "os_distribution_label": identity.os_distribution_label,
            "kernel_version": identity.kernel_version,
            "cpu_count": self.panel.cpu_count(),
            "updated": self.last_refresh.map(|t| t.to_rfc3339()),
            "cores": cores,
        })
    }

    /// Redraw the panel until `ticks` refreshes have run (forever if `None`).
    ///
    /// Without an explicit `interval` the configured one is re-read each tick.
    pub fn run_blocking(&mut self, interval: Option<Duration>, ticks: Option<u64>) {
        let mut done = 0u64;
        loop {
            let started = Instant::now();
            self.update();

            println!("\x1B[2J\x1B[1;1H"); // clear screen
            println!("{}", self.render());

            done += 1;
            if ticks.is_some_and(|t| done >= t) {
                break;
            }

            let every = interval.unwrap_or_else(|| crate::CONFIG.refresh_interval());
            thread::sleep(every.saturating_sub(started.elapsed()));
        }
    }
}
