// src/modules/info_panel.rs
use std::cell::RefCell;
use std::rc::Rc;

use crate::globals::{DEFAULT_COLUMNS, FREQUENCY_PLACEHOLDER};
use crate::modules::frequency_sampler::{CoreSample, FrequencySampler};
use crate::modules::system_info::IdentityInfo;

/// Display cell for one logical CPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCell {
    pub core: usize,
    pub title: String,
    pub frequency_label: String,
}

impl CoreCell {
    pub fn new(core: usize) -> Self {
        Self {
            core,
            title: format!("cpu{}", core),
            frequency_label: FREQUENCY_PLACEHOLDER.to_string(),
        }
    }

    /// A placeholder delivery means the sample failed; keep what is shown.
    pub fn apply(&mut self, sample: CoreSample) {
        if sample.core_index != self.core || sample.frequency_label == FREQUENCY_PLACEHOLDER {
            return;
        }
        self.frequency_label = sample.frequency_label;
    }
}

pub struct InfoPanel {
    identity: IdentityInfo,
    cores: Vec<Rc<RefCell<CoreCell>>>,
    columns: usize,
}

impl InfoPanel {
    pub fn new(identity: IdentityInfo, cpu_count: usize) -> Self {
        Self::with_columns(identity, cpu_count, DEFAULT_COLUMNS)
    }

    /// At most `max_columns` cells per row, fewer when the machine has fewer cores.
    pub fn with_columns(identity: IdentityInfo, cpu_count: usize, max_columns: usize) -> Self {
        let cores = (0..cpu_count)
            .map(|i| Rc::new(RefCell::new(CoreCell::new(i))))
            .collect();

        Self {
            identity,
            cores,
            columns: max_columns.max(1).min(cpu_count.max(1)),
        }
    }

    pub fn identity(&self) -> &IdentityInfo {
        &self.identity
    }

    pub fn cpu_count(&self) -> usize {
        self.cores.len()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cells(&self) -> Vec<CoreCell> {
        self.cores.iter().map(|c| c.borrow().clone()).collect()
    }

    /// Request a fresh sample for every core. Cells change as the sampler
    /// dispatches completions.
    pub fn update(&self, sampler: &mut FrequencySampler) {
        for cell in &self.cores {
            let core = cell.borrow().core;
            let cell = Rc::clone(cell);
            sampler.get_frequency_async(core, move |sample| cell.borrow_mut().apply(sample));
        }
    }
}

/// Presentation adapter for an [`InfoPanel`].
pub trait PanelView {
    fn render(&self, panel: &InfoPanel) -> String;
}

/// Plain terminal rendering: identity lines, then a grid of core cells.
pub struct TextView {
    pub cell_width: usize,
}

impl Default for TextView {
    fn default() -> Self {
        Self { cell_width: 12 }
    }
}

impl PanelView for TextView {
    fn render(&self, panel: &InfoPanel) -> String {
        let mut out = Vec::new();
        out.push(panel.identity().cpu_model_name.clone());
        out.push(panel.identity().linux_label());
        out.push(String::new());

        let cells = panel.cells();
        let width = self.cell_width;
        for row in cells.chunks(panel.columns()) {
            out.push(
                row.iter()
                    .map(|c| format!("{:^width$}", c.title, width = width))
                    .collect::<String>()
                    .trim_end()
                    .to_string(),
            );
            out.push(
                row.iter()
                    .map(|c| format!("{:^width$}", c.frequency_label, width = width))
                    .collect::<String>()
                    .trim_end()
                    .to_string(),
            );
        }

        out.join("\n")
    }
}
