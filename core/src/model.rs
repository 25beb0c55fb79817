//! Calculator models and per-model hardware presets
//!
//! The model ordering matters: several gates in the core compare models
//! (`model >= TI83PSE` enables delay timing, `model >= TI73` enables flash
//! writes, `model <= TI83P` selects the pre-ASIC execution protection). The
//! enum discriminants follow the hardware family order used by the ROMs.
//!
//! # References
//! - WikiTI port documentation (https://wikiti.brandonw.net)

use crate::error::{CoreError, CoreResult};
use crate::memory::PAGE_SIZE;

/// Calculator model, ordered by hardware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum CalcModel {
    Ti81 = 0,
    Ti82 = 1,
    Ti83 = 2,
    Ti85 = 3,
    Ti86 = 4,
    Ti73 = 5,
    Ti83p = 6,
    Ti83pse = 7,
    Ti84p = 8,
    Ti84pse = 9,
    Ti84pcse = 10,
}

/// Every model, in id order
pub const ALL_MODELS: [CalcModel; 11] = [
    CalcModel::Ti81,
    CalcModel::Ti82,
    CalcModel::Ti83,
    CalcModel::Ti85,
    CalcModel::Ti86,
    CalcModel::Ti73,
    CalcModel::Ti83p,
    CalcModel::Ti83pse,
    CalcModel::Ti84p,
    CalcModel::Ti84pse,
    CalcModel::Ti84pcse,
];

impl CalcModel {
    /// Models that boot from a flash chip (bank 0 holds the boot page)
    pub fn is_flash_era(self) -> bool {
        self >= CalcModel::Ti73
    }

    pub fn name(self) -> &'static str {
        match self {
            CalcModel::Ti81 => "TI-81",
            CalcModel::Ti82 => "TI-82",
            CalcModel::Ti83 => "TI-83",
            CalcModel::Ti85 => "TI-85",
            CalcModel::Ti86 => "TI-86",
            CalcModel::Ti73 => "TI-73",
            CalcModel::Ti83p => "TI-83 Plus",
            CalcModel::Ti83pse => "TI-83 Plus Silver Edition",
            CalcModel::Ti84p => "TI-84 Plus",
            CalcModel::Ti84pse => "TI-84 Plus Silver Edition",
            CalcModel::Ti84pcse => "TI-84 Plus C Silver Edition",
        }
    }

    /// Parse a display name or the short "TI-84+SE" style name
    pub fn from_name(name: &str) -> Option<Self> {
        let short = match name {
            "TI-83+" => Some(CalcModel::Ti83p),
            "TI-83+SE" => Some(CalcModel::Ti83pse),
            "TI-84+" => Some(CalcModel::Ti84p),
            "TI-84+SE" => Some(CalcModel::Ti84pse),
            "TI-84+CSE" => Some(CalcModel::Ti84pcse),
            _ => None,
        };
        short.or_else(|| ALL_MODELS.into_iter().find(|model| model.name() == name))
    }
}

impl TryFrom<i32> for CalcModel {
    type Error = CoreError;

    fn try_from(id: i32) -> CoreResult<Self> {
        Ok(match id {
            0 => CalcModel::Ti81,
            1 => CalcModel::Ti82,
            2 => CalcModel::Ti83,
            3 => CalcModel::Ti85,
            4 => CalcModel::Ti86,
            5 => CalcModel::Ti73,
            6 => CalcModel::Ti83p,
            7 => CalcModel::Ti83pse,
            8 => CalcModel::Ti84p,
            9 => CalcModel::Ti84pse,
            10 => CalcModel::Ti84pcse,
            other => return Err(CoreError::UnknownModel(other)),
        })
    }
}

/// CPU clock rates selectable through port 0x20
pub mod clock {
    pub const MHZ_6: u32 = 6_000_000;
    pub const MHZ_15: u32 = 15_000_000;
    pub const MHZ_20: u32 = 20_000_000;
    pub const MHZ_25: u32 = 25_000_000;
}

/// Memory geometry and protection parameters for one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareConfig {
    /// Number of 16KB flash (or ROM) pages
    pub flash_pages: usize,
    /// Number of 16KB RAM pages
    pub ram_pages: usize,
    /// Flash chip generation (1 = no fast mode)
    pub flash_version: u8,
    /// RAM hardware version (2 = high pages shadow page 2). Every preset
    /// leaves this at 0; version 2 is opt-in.
    pub ram_version: u8,
    /// Flash execution window: pages in (lower, upper] are no-exec
    pub flash_lower: u16,
    pub flash_upper: u16,
    /// RAM execution window, as absolute RAM addresses
    pub ram_lower: u32,
    pub ram_upper: u32,
    pub flash_locked: bool,
    /// RAM protection mode (0..=3)
    pub prot_mode: u8,
    pub cpu_version: u8,
    /// Capability bits gating writes to certificate/boot pages
    pub model_bits: u8,
    pub clock_hz: u32,
}

impl HardwareConfig {
    /// Power-on preset for `model`
    pub fn for_model(model: CalcModel) -> Self {
        let base = HardwareConfig {
            flash_pages: 32,
            ram_pages: 2,
            flash_version: 1,
            ram_version: 0,
            flash_lower: 0x08,
            flash_upper: 0x18,
            ram_lower: 0,
            ram_upper: 0x3FF,
            flash_locked: true,
            prot_mode: 0,
            cpu_version: 0,
            model_bits: 1,
            clock_hz: clock::MHZ_6,
        };
        match model {
            CalcModel::Ti81 => HardwareConfig {
                flash_pages: 2,
                ram_pages: 1,
                ..base
            },
            CalcModel::Ti82 | CalcModel::Ti85 => HardwareConfig {
                flash_pages: 8,
                ..base
            },
            CalcModel::Ti83 => HardwareConfig {
                flash_pages: 16,
                ..base
            },
            CalcModel::Ti86 => HardwareConfig {
                flash_pages: 16,
                ram_pages: 8,
                ..base
            },
            CalcModel::Ti73 | CalcModel::Ti83p => base,
            CalcModel::Ti83pse | CalcModel::Ti84pse => HardwareConfig {
                flash_pages: 128,
                ram_pages: 8,
                flash_version: 2,
                flash_lower: 0x10,
                flash_upper: 0x60,
                cpu_version: 1,
                clock_hz: clock::MHZ_15,
                ..base
            },
            CalcModel::Ti84p => HardwareConfig {
                flash_pages: 64,
                ram_pages: 8,
                flash_version: 3,
                flash_lower: 0x10,
                flash_upper: 0x30,
                cpu_version: 1,
                model_bits: 0,
                clock_hz: clock::MHZ_15,
                ..base
            },
            CalcModel::Ti84pcse => HardwareConfig {
                flash_pages: 256,
                ram_pages: 8,
                flash_version: 2,
                flash_lower: 0x10,
                flash_upper: 0xC0,
                cpu_version: 1,
                clock_hz: clock::MHZ_15,
                ..base
            },
        }
    }

    pub fn flash_size(&self) -> usize {
        self.flash_pages * PAGE_SIZE
    }

    pub fn ram_size(&self) -> usize {
        self.ram_pages * PAGE_SIZE
    }

    /// Page holding the boot code (last flash page)
    pub fn boot_page(&self) -> u16 {
        (self.flash_pages.saturating_sub(1)) as u16
    }
}
