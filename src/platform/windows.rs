//! Windows display service using the `winuser.h` display settings API.

use log::{debug, info, trace};
use winsafe::prelude::*;
use winsafe::{
    co, ChangeDisplaySettingsEx, EnumDisplayDevices, EnumDisplaySettings, EnumDisplaySettingsEx,
    GmidxEnum, DEVMODE,
};

use crate::{
    ConfigStep, Display, DisplayMode, DisplayModeError, DisplayResult, DisplayService, ModeCatalog,
};

/// Displays attached to the Windows desktop, identified by device name (e.g. `\\.\DISPLAY1`)
#[derive(Debug, Default)]
pub struct SystemDisplays;

impl SystemDisplays {
    pub fn new() -> Self {
        Self
    }
}

/// Device names and state flags of every display device
fn display_devices() -> DisplayResult<Vec<(String, co::DISPLAY_DEVICE)>> {
    EnumDisplayDevices(None, None)
        .map(|device| -> DisplayResult<_> {
            let device = device.map_err(|err| DisplayModeError::Enumeration {
                code: err.raw() as i32,
            })?;
            Ok((device.DeviceName(), device.StateFlags))
        })
        .collect()
}

fn is_active(flags: co::DISPLAY_DEVICE) -> bool {
    flags.has(co::DISPLAY_DEVICE::ATTACHED_TO_DESKTOP)
        && !flags.has(co::DISPLAY_DEVICE::MIRRORING_DRIVER)
}

fn to_display_mode(devmode: &DEVMODE, usable: bool) -> DisplayMode {
    DisplayMode::new(
        devmode.dmPelsWidth,
        devmode.dmPelsHeight,
        devmode.dmDisplayFrequency as f64,
        usable,
    )
    .with_detail(devmode.dmBitsPerPel as i64)
}

/// Provides methods to describe a display mode in a `winsafe::DEVMODE`
trait FromDisplayMode {
    fn set_resolution(&mut self, mode: &DisplayMode);
    fn set_refresh_rate(&mut self, mode: &DisplayMode);
    fn set_bits_per_pel(&mut self, mode: &DisplayMode);

    /// Converts a display mode into a `winsafe::DEVMODE` struct
    fn from_display_mode(mode: &DisplayMode) -> DEVMODE {
        let mut devmode = DEVMODE::default();
        devmode.set_resolution(mode);
        devmode.set_refresh_rate(mode);
        devmode.set_bits_per_pel(mode);
        devmode
    }
}

impl FromDisplayMode for DEVMODE {
    fn set_resolution(&mut self, mode: &DisplayMode) {
        self.dmPelsWidth = mode.width();
        self.dmPelsHeight = mode.height();
        self.dmFields |= co::DM::PELSWIDTH | co::DM::PELSHEIGHT;
    }

    fn set_refresh_rate(&mut self, mode: &DisplayMode) {
        self.dmDisplayFrequency = mode.refresh_rate.0.round() as u32;
        self.dmFields |= co::DM::DISPLAYFREQUENCY;
    }

    fn set_bits_per_pel(&mut self, mode: &DisplayMode) {
        self.dmBitsPerPel = mode.detail as u32;
        self.dmFields |= co::DM::BITSPERPEL;
    }
}

/// Every graphics mode of a device. With `co::EDS::RAWMODE` this includes modes the monitor does
/// not report as supported.
fn enumerate_modes(display: &Display<String>, flags: co::EDS) -> DisplayResult<Vec<DEVMODE>> {
    let mut modes = Vec::new();
    let mut graphics_mode_idx = 0u32;

    loop {
        let mut devmode = DEVMODE::default();
        let found = EnumDisplaySettingsEx(
            Some(display.id.as_str()),
            GmidxEnum::Gmidx(graphics_mode_idx),
            &mut devmode,
            flags,
        );
        match found {
            Ok(true) => modes.push(devmode),
            Ok(false) => break,
            // Past the last mode the call fails with whatever error was left behind
            Err(err) if graphics_mode_idx > 0 => {
                trace!(
                    "Mode enumeration of {} stopped at {}: {}",
                    display.id,
                    graphics_mode_idx,
                    err
                );
                break;
            }
            Err(err) => {
                return Err(DisplayModeError::ModeQuery {
                    index: display.index,
                    code: err.raw() as i32,
                })
            }
        }
        graphics_mode_idx += 1;
    }

    Ok(modes)
}

fn change_settings(
    name: &str,
    devmode: &mut DEVMODE,
    flags: co::CDS,
    step: ConfigStep,
) -> DisplayResult {
    match ChangeDisplaySettingsEx(Some(name), Some(devmode), flags) {
        Ok(co::DISP_CHANGE::RESTART) => {
            info!("The new display mode takes effect after a restart");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(err) => Err(DisplayModeError::Configuration {
            step,
            code: err.raw(),
        }),
    }
}

/// Calls made to switch a display, in order. Only the last one writes the registry, and it also
/// applies the mode.
fn configure_steps() -> [(co::CDS, ConfigStep); 2] {
    [
        (co::CDS::TEST, ConfigStep::Begin),
        (co::CDS::UPDATEREGISTRY | co::CDS::GLOBAL, ConfigStep::Commit),
    ]
}

impl DisplayService for SystemDisplays {
    type DisplayId = String;

    fn main_display(&self) -> DisplayResult<String> {
        display_devices()?
            .into_iter()
            .find(|(_, flags)| {
                is_active(*flags) && flags.has(co::DISPLAY_DEVICE::PRIMARY_DEVICE)
            })
            .map(|(name, _)| name)
            .ok_or(DisplayModeError::Enumeration {
                code: co::ERROR::NOT_FOUND.raw() as i32,
            })
    }

    fn active_displays(&self) -> DisplayResult<Vec<String>> {
        Ok(display_devices()?
            .into_iter()
            .filter(|(_, flags)| is_active(*flags))
            .map(|(name, _)| name)
            .collect())
    }

    fn display_modes(&self, display: &Display<String>) -> DisplayResult<ModeCatalog> {
        let supported: Vec<DisplayMode> = enumerate_modes(display, co::EDS::default())?
            .iter()
            .map(|devmode| to_display_mode(devmode, true))
            .collect();
        let is_supported = |mode: &DisplayMode| supported.contains(mode);

        let modes: Vec<DisplayMode> = enumerate_modes(display, co::EDS::RAWMODE)?
            .iter()
            .map(|devmode| {
                let mode = to_display_mode(devmode, true);
                DisplayMode {
                    usable: is_supported(&mode),
                    ..mode
                }
            })
            .collect();
        trace!("Display {} modes: {:?}", display.id, modes);

        let mut current = DEVMODE::default();
        let found = EnumDisplaySettings(
            Some(display.id.as_str()),
            GmidxEnum::Enum(co::ENUM_SETTINGS::CURRENT),
            &mut current,
        )
        .map_err(|err| DisplayModeError::ModeQuery {
            index: display.index,
            code: err.raw() as i32,
        })?;
        if !found {
            return Err(DisplayModeError::ModeQuery {
                index: display.index,
                code: co::ERROR::NOT_FOUND.raw() as i32,
            });
        }
        let current = to_display_mode(&current, true);
        let current = DisplayMode {
            usable: is_supported(&current),
            ..current
        };

        Ok(ModeCatalog::new(modes, current))
    }

    fn configure(&mut self, display: &Display<String>, mode: &DisplayMode) -> DisplayResult {
        let mut devmode = DEVMODE::from_display_mode(mode);
        debug!("Configuring display {} with {}", display.id, mode);

        for (flags, step) in configure_steps() {
            change_settings(&display.id, &mut devmode, flags, step)?;
        }
        Ok(())
    }

    fn range_check_code(&self) -> i32 {
        co::ERROR::INVALID_PARAMETER.raw() as i32
    }
}
