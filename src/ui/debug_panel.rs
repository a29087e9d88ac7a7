//! Debug overlay: render mode and target selection, frame timing and the
//! adapter the renderer runs on

use std::time::Duration;

use crate::gfx::{
    backend::AdapterDetails,
    dispatch::{RenderMode, RenderSettings, RenderTarget},
};

/// Number of frames averaged for the FPS readout
const SAMPLE_WINDOW: usize = 60;

/// Rolling frame time average
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    samples: Vec<f32>,
    next: usize,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame_time: Duration) {
        let seconds = frame_time.as_secs_f32();
        if self.samples.len() < SAMPLE_WINDOW {
            self.samples.push(seconds);
        } else {
            self.samples[self.next] = seconds;
        }
        self.next = (self.next + 1) % SAMPLE_WINDOW;
    }

    /// Mean frame time in milliseconds
    pub fn frame_time_ms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32 * 1000.0
    }

    pub fn fps(&self) -> f32 {
        let ms = self.frame_time_ms();
        if ms > 0.0 {
            1000.0 / ms
        } else {
            0.0
        }
    }
}

/// Combo listing `items`; returns the picked item if it changed
fn combo<T: Copy + PartialEq>(
    ui: &imgui::Ui,
    label: &str,
    current: T,
    items: &[T],
    name: impl Fn(T) -> &'static str,
) -> Option<T> {
    let mut picked = None;
    if let Some(_token) = ui.begin_combo(label, name(current)) {
        for &item in items {
            let selected = item == current;
            if ui.selectable_config(name(item)).selected(selected).build() && !selected {
                picked = Some(item);
            }
            if selected {
                ui.set_item_default_focus();
            }
        }
    }
    picked
}

/// Draws the menu bar and the info windows, writing selections into `settings`
pub fn debug_panel(
    ui: &imgui::Ui,
    settings: &mut RenderSettings,
    stats: &FrameStats,
    adapter: &AdapterDetails,
) {
    if let Some(_bar) = ui.begin_main_menu_bar() {
        ui.set_next_item_width(220.0);
        if let Some(mode) = combo(ui, "Render Mode", settings.mode, &RenderMode::ALL, RenderMode::label) {
            log::info!("Render mode set to {}", mode.label());
            settings.mode = mode;
        }

        ui.set_next_item_width(220.0);
        if let Some(target) = combo(
            ui,
            "Render target",
            settings.target,
            &RenderTarget::ALL,
            RenderTarget::label,
        ) {
            log::info!("Render target set to {}", target.label());
            settings.target = target;
        }
    }

    let display_size = ui.io().display_size;
    if display_size[0] <= 0.0 || display_size[1] <= 0.0 {
        return;
    }

    ui.window("Frame")
        .position([20.0, 60.0], imgui::Condition::FirstUseEver)
        .always_auto_resize(true)
        .collapsible(true)
        .build(|| {
            ui.text(format!("{:.1} FPS", stats.fps()));
            ui.text(format!("{:.2} ms", stats.frame_time_ms()));
        });

    ui.window("Adapter")
        .position([20.0, display_size[1] - 260.0], imgui::Condition::FirstUseEver)
        .always_auto_resize(true)
        .collapsible(true)
        .build(|| {
            ui.text(format!("Name: {}", adapter.name));
            ui.text(format!("Vendor: {}", adapter.vendor));
            ui.text(format!("Backend: {}", adapter.backend));
            ui.text(format!("Type: {}", adapter.device_type));
            ui.text(format!("Driver: {} {}", adapter.driver, adapter.driver_info));
            if !adapter.features.is_empty() {
                ui.separator();
                ui.text("Features");
                for feature in &adapter.features {
                    ui.bullet_text(feature);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_report_zero() {
        let stats = FrameStats::new();
        assert_eq!(stats.fps(), 0.0);
        assert_eq!(stats.frame_time_ms(), 0.0);
    }

    #[test]
    fn test_average_over_recorded_frames() {
        let mut stats = FrameStats::new();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));

        assert!((stats.frame_time_ms() - 20.0).abs() < 1e-3);
        assert!((stats.fps() - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_window_drops_oldest_samples() {
        let mut stats = FrameStats::new();
        stats.record(Duration::from_millis(100));
        for _ in 0..SAMPLE_WINDOW {
            stats.record(Duration::from_millis(10));
        }

        assert!((stats.frame_time_ms() - 10.0).abs() < 1e-3);
    }
}
