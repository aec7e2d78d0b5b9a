pub mod system_info;
pub mod frequency_sampler;
pub mod info_panel;
pub mod system_monitor;

// Re-export commonly used items
pub use system_info::*;
pub use frequency_sampler::*;
pub use info_panel::*;
pub use system_monitor::*;
