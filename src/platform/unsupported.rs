//! Fallback for targets without a display-configuration backend.

use crate::{Display, DisplayMode, DisplayModeError, DisplayResult, DisplayService, ModeCatalog};

/// Display service whose every call fails with [`DisplayModeError::Unsupported`]
#[derive(Debug, Default)]
pub struct SystemDisplays;

impl SystemDisplays {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayService for SystemDisplays {
    type DisplayId = u32;

    fn main_display(&self) -> DisplayResult<u32> {
        Err(DisplayModeError::Unsupported)
    }

    fn active_displays(&self) -> DisplayResult<Vec<u32>> {
        Err(DisplayModeError::Unsupported)
    }

    fn display_modes(&self, _display: &Display<u32>) -> DisplayResult<ModeCatalog> {
        Err(DisplayModeError::Unsupported)
    }

    fn configure(&mut self, _display: &Display<u32>, _mode: &DisplayMode) -> DisplayResult {
        Err(DisplayModeError::Unsupported)
    }
}
