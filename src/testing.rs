//! In-memory display service used by the unit tests.

use crate::{
    ConfigStep, Display, DisplayMode, DisplayModeError, DisplayResult, DisplayService, ModeCatalog,
};

/// Displays held in memory. Records every committed configuration.
#[derive(Debug, Default)]
pub(crate) struct FakeDisplays {
    main: u32,
    displays: Vec<(u32, ModeCatalog)>,
    enumeration_error: Option<i32>,
    configuration_error: Option<(ConfigStep, i32)>,
    pub configured: Vec<(u32, DisplayMode)>,
}

impl FakeDisplays {
    pub fn new(main: u32) -> Self {
        Self {
            main,
            ..Default::default()
        }
    }

    /// Adds a display after the ones already present
    pub fn with_display(mut self, id: u32, catalog: ModeCatalog) -> Self {
        self.displays.push((id, catalog));
        self
    }

    pub fn failing_enumeration(mut self, code: i32) -> Self {
        self.enumeration_error = Some(code);
        self
    }

    pub fn failing_configuration(mut self, step: ConfigStep, code: i32) -> Self {
        self.configuration_error = Some((step, code));
        self
    }
}

impl DisplayService for FakeDisplays {
    type DisplayId = u32;

    fn main_display(&self) -> DisplayResult<u32> {
        Ok(self.main)
    }

    fn active_displays(&self) -> DisplayResult<Vec<u32>> {
        if let Some(code) = self.enumeration_error {
            return Err(DisplayModeError::Enumeration { code });
        }
        Ok(self.displays.iter().map(|(id, _)| *id).collect())
    }

    fn display_modes(&self, display: &Display<u32>) -> DisplayResult<ModeCatalog> {
        self.displays
            .iter()
            .find(|(id, _)| *id == display.id)
            .map(|(_, catalog)| catalog.clone())
            .ok_or(DisplayModeError::ModeQuery {
                index: display.index,
                code: 1001,
            })
    }

    fn configure(&mut self, display: &Display<u32>, mode: &DisplayMode) -> DisplayResult {
        if let Some((step, code)) = self.configuration_error {
            return Err(DisplayModeError::Configuration { step, code });
        }

        if let Some((_, catalog)) = self.displays.iter_mut().find(|(id, _)| *id == display.id) {
            catalog.current = *mode;
        }
        self.configured.push((display.id, *mode));
        Ok(())
    }

    fn range_check_code(&self) -> i32 {
        1007
    }
}
