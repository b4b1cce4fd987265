//! macOS display service using CoreGraphics.

use std::mem;
use std::ptr;

use log::{debug, trace, warn};
use objc2_core_foundation::{CFArray, CFRetained};
use objc2_core_graphics::{
    CGBeginDisplayConfiguration, CGCancelDisplayConfiguration, CGCompleteDisplayConfiguration,
    CGConfigureDisplayWithDisplayMode, CGConfigureOption, CGDirectDisplayID, CGDisplayConfigRef,
    CGDisplayCopyAllDisplayModes, CGDisplayCopyDisplayMode, CGDisplayMode, CGError,
    CGGetActiveDisplayList, CGMainDisplayID,
};

use crate::{
    ConfigStep, Display, DisplayMode, DisplayModeError, DisplayResult, DisplayService, ModeCatalog,
};

/// Displays managed by the CoreGraphics display-configuration service
#[derive(Debug, Default)]
pub struct SystemDisplays;

impl SystemDisplays {
    pub fn new() -> Self {
        Self
    }
}

fn to_display_mode(mode: &CGDisplayMode) -> DisplayMode {
    DisplayMode::new(
        CGDisplayMode::width(Some(mode)) as u32,
        CGDisplayMode::height(Some(mode)) as u32,
        CGDisplayMode::refresh_rate(Some(mode)),
        CGDisplayMode::is_usable_for_desktop_gui(Some(mode)),
    )
    .with_detail(CGDisplayMode::io_display_mode_id(Some(mode)) as i64)
}

/// Borrows the modes stored in an array returned by `CGDisplayCopyAllDisplayModes`
fn mode_refs<'a>(modes: &'a CFArray) -> impl Iterator<Item = &'a CGDisplayMode> + 'a {
    (0..modes.count()).map(move |index| {
        // SAFETY: index is in bounds, the array holds CGDisplayMode values and is never mutated
        unsafe { &*modes.value_at_index(index).cast::<CGDisplayMode>() }
    })
}

fn copy_all_modes(display: &Display<CGDirectDisplayID>) -> DisplayResult<CFRetained<CFArray>> {
    unsafe { CGDisplayCopyAllDisplayModes(display.id, None) }.ok_or(DisplayModeError::ModeQuery {
        index: display.index,
        code: CGError::Failure.0,
    })
}

fn check(status: CGError, step: ConfigStep) -> DisplayResult {
    if status == CGError::Success {
        Ok(())
    } else {
        Err(DisplayModeError::Configuration { step, code: status.0 })
    }
}

/// A pending display configuration. Cancelled on drop unless committed.
struct Transaction {
    config: CGDisplayConfigRef,
}

impl Transaction {
    fn begin() -> DisplayResult<Self> {
        let mut config: CGDisplayConfigRef = ptr::null_mut();
        check(unsafe { CGBeginDisplayConfiguration(&mut config) }, ConfigStep::Begin)?;
        Ok(Self { config })
    }

    fn set_mode(&self, display: CGDirectDisplayID, mode: &CGDisplayMode) -> DisplayResult {
        check(
            unsafe { CGConfigureDisplayWithDisplayMode(self.config, display, Some(mode), None) },
            ConfigStep::Apply,
        )
    }

    /// Completes the configuration so it persists across logins
    fn commit_permanently(self) -> DisplayResult {
        let config = self.config;
        // CGCompleteDisplayConfiguration releases the configuration, success or not
        mem::forget(self);
        check(
            unsafe { CGCompleteDisplayConfiguration(config, CGConfigureOption::Permanently) },
            ConfigStep::Commit,
        )
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let status = unsafe { CGCancelDisplayConfiguration(self.config) };
        if status != CGError::Success {
            warn!("CGCancelDisplayConfiguration failed: {:?}", status);
        }
    }
}

impl DisplayService for SystemDisplays {
    type DisplayId = CGDirectDisplayID;

    fn main_display(&self) -> DisplayResult<CGDirectDisplayID> {
        Ok(CGMainDisplayID())
    }

    fn active_displays(&self) -> DisplayResult<Vec<CGDirectDisplayID>> {
        let mut max_displays = 8usize;
        loop {
            let mut displays = vec![0; max_displays];
            let mut count: u32 = 0;
            let status = unsafe {
                CGGetActiveDisplayList(max_displays as u32, displays.as_mut_ptr(), &mut count)
            };
            if status != CGError::Success {
                return Err(DisplayModeError::Enumeration { code: status.0 });
            }

            // The list was cut short if the buffer filled up; ask again with more room
            if (count as usize) < max_displays {
                displays.truncate(count as usize);
                return Ok(displays);
            }

            max_displays *= 2;
        }
    }

    fn display_modes(&self, display: &Display<CGDirectDisplayID>) -> DisplayResult<ModeCatalog> {
        let current = CGDisplayCopyDisplayMode(display.id).ok_or(DisplayModeError::ModeQuery {
            index: display.index,
            code: CGError::Failure.0,
        })?;
        let modes = copy_all_modes(display)?;

        let modes: Vec<DisplayMode> = mode_refs(&modes).map(to_display_mode).collect();
        trace!("Display {} modes: {:?}", display.id, modes);

        Ok(ModeCatalog::new(modes, to_display_mode(&current)))
    }

    fn configure(
        &mut self,
        display: &Display<CGDirectDisplayID>,
        mode: &DisplayMode,
    ) -> DisplayResult {
        let modes = copy_all_modes(display)?;
        let native = mode_refs(&modes)
            .find(|native| to_display_mode(native) == *mode)
            .ok_or(DisplayModeError::Configuration {
                step: ConfigStep::Apply,
                code: CGError::IllegalArgument.0,
            })?;

        debug!("Configuring display {} with {}", display.id, mode);
        let transaction = Transaction::begin()?;
        transaction.set_mode(display.id, native)?;
        transaction.commit_permanently()
    }

    fn range_check_code(&self) -> i32 {
        CGError::RangeCheck.0
    }
}
