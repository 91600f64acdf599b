//! Texture-memory budget and the four-level pressure signal that drives
//! adaptive quality: effective pixel ratio, texture size caps and LOD
//! aggressiveness all key off [`MemoryPressure`].

use std::time::{Duration, Instant};

use serde::Deserialize;
use sysinfo::System;
use tracing::debug;

const MIB: u64 = 1024 * 1024;
/// Fraction of the raw device budget actually granted to textures.
const BUDGET_FRACTION: f64 = 0.6;
/// A single texture may claim at most this share of the budget.
const PER_TEXTURE_FRACTION: f64 = 0.3;
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

impl DeviceClass {
    /// Advisory texture-memory budget in bytes. High-density mobile screens
    /// get the larger tier.
    pub fn budget_bytes(self, device_pixel_ratio: f64) -> u64 {
        let raw = match self {
            DeviceClass::Mobile if device_pixel_ratio >= 3.0 => 256 * MIB,
            DeviceClass::Mobile => 128 * MIB,
            DeviceClass::Desktop => 512 * MIB,
        };
        (raw as f64 * BUDGET_FRACTION) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_usage(ratio: f64) -> Self {
        if ratio <= 0.5 {
            MemoryPressure::Low
        } else if ratio <= 0.7 {
            MemoryPressure::Medium
        } else if ratio <= 0.9 {
            MemoryPressure::High
        } else {
            MemoryPressure::Critical
        }
    }

    /// Device pixel ratio after pressure capping.
    pub fn effective_pixel_ratio(self, device_ratio: f64) -> f64 {
        match self {
            MemoryPressure::Low => device_ratio,
            MemoryPressure::Medium => device_ratio.min(2.0),
            MemoryPressure::High => device_ratio.min(1.5),
            MemoryPressure::Critical => device_ratio.min(1.0),
        }
    }

    /// Largest texture dimension allowed under this pressure.
    pub fn max_texture_dimension(self, device_max: u32) -> u32 {
        match self {
            MemoryPressure::Low => device_max,
            MemoryPressure::Medium => device_max.min(8192),
            MemoryPressure::High => device_max.min(4096),
            MemoryPressure::Critical => device_max.min(2048),
        }
    }

    /// Scales the fit-relative viewport scale before LOD lookup; under
    /// pressure the policy behaves as if the user were zoomed out further,
    /// which selects a coarser level.
    pub fn lod_modifier(self) -> f64 {
        match self {
            MemoryPressure::Low => 1.0,
            MemoryPressure::Medium => 0.9,
            MemoryPressure::High => 0.7,
            MemoryPressure::Critical => 0.5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MemoryPressure::Low => "low",
            MemoryPressure::Medium => "medium",
            MemoryPressure::High => "high",
            MemoryPressure::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    pub texture_bytes: u64,
    pub budget_bytes: u64,
    /// Best-effort process resident size; `None` when the platform query is
    /// unavailable.
    pub process_bytes: Option<u64>,
    pub pressure: MemoryPressure,
}

/// Tracks texture bytes against the budget and re-derives the pressure
/// signal at most once per second, folding in the observed process memory
/// when the platform exposes it.
pub struct MemoryMonitor {
    device_class: DeviceClass,
    budget_bytes: u64,
    texture_bytes: u64,
    pressure: MemoryPressure,
    system: System,
    pid: Option<sysinfo::Pid>,
    process_bytes: Option<u64>,
    last_probe: Option<Instant>,
}

impl MemoryMonitor {
    pub fn new(device_class: DeviceClass, device_pixel_ratio: f64) -> Self {
        Self {
            device_class,
            budget_bytes: device_class.budget_bytes(device_pixel_ratio),
            texture_bytes: 0,
            pressure: MemoryPressure::Low,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            process_bytes: None,
            last_probe: None,
        }
    }

    /// Re-derive the budget when the device pixel ratio becomes known.
    pub fn rebudget(&mut self, device_pixel_ratio: f64) {
        self.budget_bytes = self.device_class.budget_bytes(device_pixel_ratio);
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    pub fn per_texture_byte_cap(&self) -> u64 {
        (self.budget_bytes as f64 * PER_TEXTURE_FRACTION) as u64
    }

    pub fn texture_bytes(&self) -> u64 {
        self.texture_bytes
    }

    pub fn set_texture_bytes(&mut self, bytes: u64) {
        self.texture_bytes = bytes;
    }

    pub fn pressure(&self) -> MemoryPressure {
        self.pressure
    }

    pub fn info(&self) -> MemoryInfo {
        MemoryInfo {
            texture_bytes: self.texture_bytes,
            budget_bytes: self.budget_bytes,
            process_bytes: self.process_bytes,
            pressure: self.pressure,
        }
    }

    /// Once-per-second probe. Returns the new pressure when it changed.
    pub fn tick(&mut self, now: Instant) -> Option<MemoryPressure> {
        if let Some(last) = self.last_probe
            && now.saturating_duration_since(last) < PROBE_INTERVAL
        {
            return None;
        }
        self.last_probe = Some(now);
        let previous = self.pressure;
        self.pressure = self.derive();
        if self.pressure == previous {
            return None;
        }
        debug!(
            pressure = self.pressure.label(),
            texture_bytes = self.texture_bytes,
            budget_bytes = self.budget_bytes,
            "memory pressure changed"
        );
        Some(self.pressure)
    }

    fn derive(&mut self) -> MemoryPressure {
        let usage = self.texture_bytes as f64 / self.budget_bytes.max(1) as f64;
        let mut pressure = MemoryPressure::from_usage(usage);
        if let Some(pid) = self.pid {
            self.system.refresh_memory();
            if self.system.refresh_process(pid)
                && let Some(process) = self.system.process(pid)
            {
                self.process_bytes = Some(process.memory());
                let total = self.system.total_memory();
                if total > 0 {
                    let share = process.memory() as f64 / total as f64;
                    if share > 0.9 {
                        pressure = pressure.max(MemoryPressure::Critical);
                    } else if share > 0.8 {
                        pressure = pressure.max(MemoryPressure::High);
                    }
                }
            }
        }
        pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_thresholds_match_the_four_levels() {
        assert_eq!(MemoryPressure::from_usage(0.0), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_usage(0.5), MemoryPressure::Low);
        assert_eq!(MemoryPressure::from_usage(0.51), MemoryPressure::Medium);
        assert_eq!(MemoryPressure::from_usage(0.7), MemoryPressure::Medium);
        assert_eq!(MemoryPressure::from_usage(0.9), MemoryPressure::High);
        assert_eq!(MemoryPressure::from_usage(0.91), MemoryPressure::Critical);
    }

    #[test]
    fn pixel_ratio_caps_tighten_with_pressure() {
        assert_eq!(MemoryPressure::Low.effective_pixel_ratio(3.0), 3.0);
        assert_eq!(MemoryPressure::Medium.effective_pixel_ratio(3.0), 2.0);
        assert_eq!(MemoryPressure::High.effective_pixel_ratio(3.0), 1.5);
        assert_eq!(MemoryPressure::Critical.effective_pixel_ratio(3.0), 1.0);
        // A low-density device is never upscaled.
        assert_eq!(MemoryPressure::Critical.effective_pixel_ratio(0.75), 0.75);
    }

    #[test]
    fn texture_dimension_caps_tighten_with_pressure() {
        assert_eq!(MemoryPressure::Low.max_texture_dimension(16384), 16384);
        assert_eq!(MemoryPressure::Medium.max_texture_dimension(16384), 8192);
        assert_eq!(MemoryPressure::High.max_texture_dimension(16384), 4096);
        assert_eq!(MemoryPressure::Critical.max_texture_dimension(16384), 2048);
        // The device limit stays authoritative when it is the smaller one.
        assert_eq!(MemoryPressure::Medium.max_texture_dimension(4096), 4096);
    }

    #[test]
    fn budgets_follow_device_class() {
        let desktop = DeviceClass::Desktop.budget_bytes(1.0);
        assert_eq!(desktop, (512 * MIB as u64) * 6 / 10);
        assert_eq!(DeviceClass::Mobile.budget_bytes(2.0), (128 * MIB) * 6 / 10);
        assert_eq!(DeviceClass::Mobile.budget_bytes(3.0), (256 * MIB) * 6 / 10);
    }

    #[test]
    fn tick_is_rate_limited_to_one_hertz() {
        let mut monitor = MemoryMonitor::new(DeviceClass::Desktop, 1.0);
        let t0 = Instant::now();
        monitor.tick(t0);
        // Push usage into the critical band; the probe must not fire early.
        monitor.set_texture_bytes(monitor.budget_bytes());
        assert_eq!(monitor.tick(t0 + Duration::from_millis(200)), None);
        assert_eq!(
            monitor.tick(t0 + Duration::from_millis(1100)),
            Some(MemoryPressure::Critical)
        );
    }
}
