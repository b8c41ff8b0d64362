//! Capacitive "home" channel.
//!
//! The raw intensity goes through two first-order low-pass filters: a fast
//! one that strips sample noise, and a slower one that trails it as the
//! running average. A touch shows up as the filtered value jumping away from
//! the average before the average catches up; slow ambient drift never opens
//! that gap. A hysteretic comparator sits between them:
//!
//! ```text
//!   pressed  when filtered > average + press_margin
//!   released when filtered < average - release_margin
//! ```
//!
//! Inside the dead band the comparator holds its last output, and that output
//! is then debounced in time like any mechanical switch.

use crate::config::TouchConfig;
use crate::debounce::{Debouncer, Edge};

/// First-order low-pass filter, primed by its first input.
#[derive(Debug, Clone)]
pub struct LowPass {
    weight: f32,
    value: Option<f32>,
}

impl LowPass {
    /// `weight` is the share of each new input, in (0, 1].
    pub const fn new(weight: f32) -> Self {
        Self {
            weight,
            value: None,
        }
    }

    pub fn update(&mut self, input: f32) -> f32 {
        let next = match self.value {
            Some(v) => v + self.weight * (input - v),
            None => input,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }
}

#[derive(Debug, Clone)]
pub struct CapacitiveDebouncer {
    raw: f32,
    filtered: LowPass,
    average: LowPass,
    press_margin: f32,
    release_margin: f32,
    /// Comparator output before time debouncing.
    touching: bool,
    debouncer: Debouncer,
}

impl CapacitiveDebouncer {
    pub fn new(config: &TouchConfig) -> Self {
        Self {
            raw: 0.0,
            filtered: LowPass::new(config.filter_weight),
            average: LowPass::new(config.average_weight),
            press_margin: config.press_margin,
            release_margin: config.release_margin,
            touching: false,
            debouncer: Debouncer::new(config.debounce_us),
        }
    }

    pub fn sample(&mut self, raw_intensity: f32, now: u32) {
        self.raw = raw_intensity;
        let filtered = self.filtered.update(raw_intensity);
        // Compare against the baseline as it stood before this sample
        let baseline = self.average.value().unwrap_or(filtered);

        if self.touching {
            if filtered < baseline - self.release_margin {
                self.touching = false;
            }
        } else if filtered > baseline + self.press_margin {
            self.touching = true;
        }

        self.average.update(filtered);
        self.debouncer.sample(self.touching, now);
    }

    /// Slow running average (the adaptive baseline).
    pub fn get_average(&self) -> f32 {
        self.average.value().unwrap_or(0.0)
    }

    /// Most recent raw intensity.
    pub fn get_raw(&self) -> f32 {
        self.raw
    }

    pub fn press_threshold(&self) -> f32 {
        self.get_average() + self.press_margin
    }

    pub fn release_threshold(&self) -> f32 {
        self.get_average() - self.release_margin
    }

    pub fn is_pressed_edge(&mut self) -> bool {
        self.debouncer.is_pressed_edge()
    }

    pub fn is_released_edge(&mut self) -> bool {
        self.debouncer.is_released_edge()
    }

    pub fn take_edge(&mut self) -> Option<Edge> {
        self.debouncer.take_edge()
    }

    pub fn is_pressed(&self) -> bool {
        self.debouncer.is_pressed()
    }
}
