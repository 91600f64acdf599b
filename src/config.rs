use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::gesture::GestureOptions;
use crate::lod::{self, LodLevel, LodTable};
use crate::memory::DeviceClass;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Initial scale relative to fit.
    pub initial_scale: f64,
    /// Minimum scale relative to fit.
    pub min_scale: f64,
    /// Maximum scale relative to fit; the absolute maximum is floored so
    /// 1:1 pixel parity stays reachable.
    pub max_scale: f64,
    pub wheel: WheelConfig,
    pub panning: PanningConfig,
    pub pinch: PinchConfig,
    pub double_click: DoubleClickConfig,
    /// Eased animations; when false every animated operation lands in one
    /// frame.
    pub smooth: bool,
    pub center_on_init: bool,
    pub limit_to_bounds: bool,
    pub debug: bool,
    /// Memory-budget tier; a desktop crate cannot sniff user agents, so the
    /// class is declared here.
    pub device_class: DeviceClass,
    pub lod_levels: Vec<LodLevel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WheelConfig {
    /// Fractional zoom per wheel tick.
    pub step: f64,
    pub wheel_disabled: bool,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            step: 0.2,
            wheel_disabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PanningConfig {
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PinchConfig {
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DoubleClickMode {
    /// Flip between fit and 1:1.
    Toggle,
    /// Apply the configured step factor.
    Zoom,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DoubleClickConfig {
    pub disabled: bool,
    pub mode: DoubleClickMode,
    /// Zoom factor in `zoom` mode.
    pub step: f64,
    pub animation_time_ms: u64,
}

impl Default for DoubleClickConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            mode: DoubleClickMode::Toggle,
            step: 2.0,
            animation_time_ms: 300,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            initial_scale: 1.0,
            min_scale: 0.1,
            max_scale: 8.0,
            wheel: WheelConfig::default(),
            panning: PanningConfig::default(),
            pinch: PinchConfig::default(),
            double_click: DoubleClickConfig::default(),
            smooth: true,
            center_on_init: true,
            limit_to_bounds: true,
            debug: false,
            device_class: DeviceClass::Desktop,
            lod_levels: lod::default_levels(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Rejects out-of-range numerics and malformed LOD tables.
    pub fn validated(self) -> Result<Self, Error> {
        if !(self.initial_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "initial-scale {} must be positive",
                self.initial_scale
            )));
        }
        if !(self.min_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min-scale {} must be positive",
                self.min_scale
            )));
        }
        if self.max_scale < self.min_scale {
            return Err(Error::InvalidConfig(format!(
                "max-scale {} must not be below min-scale {}",
                self.max_scale, self.min_scale
            )));
        }
        if !(self.wheel.step > 0.0 && self.wheel.step < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "wheel.step {} must be in (0, 1)",
                self.wheel.step
            )));
        }
        if !(self.double_click.step > 1.0) {
            return Err(Error::InvalidConfig(format!(
                "double-click.step {} must be greater than 1",
                self.double_click.step
            )));
        }
        LodTable::new(self.lod_levels.clone())?;
        Ok(self)
    }

    pub fn lod_table(&self) -> Result<LodTable, Error> {
        LodTable::new(self.lod_levels.clone())
    }

    /// Ease duration for animated operations; zero when `smooth` is off.
    pub fn animation_duration(&self) -> Duration {
        if self.smooth {
            Duration::from_millis(self.double_click.animation_time_ms)
        } else {
            Duration::ZERO
        }
    }

    pub fn gesture_options(&self) -> GestureOptions {
        GestureOptions {
            panning_disabled: self.panning.disabled,
            pinch_disabled: self.pinch.disabled,
            wheel_disabled: self.wheel.wheel_disabled,
            double_click_disabled: self.double_click.disabled,
            wheel_step: self.wheel.step,
        }
    }
}
