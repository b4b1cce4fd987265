use std::fmt;

use log::{debug, info, trace, warn};

use crate::{DisplayMode, DisplayModeError, DisplayResult, TargetSpec};

/// The OS display-configuration service.
///
/// Implementations live in [`crate::platform`]. Every handle an implementation obtains from the OS
/// must be released before the call returns, on success and on error.
pub trait DisplayService {
    /// Opaque identifier the OS assigns to a display
    type DisplayId: Clone + PartialEq + fmt::Debug;

    /// The OS primary display
    fn main_display(&self) -> DisplayResult<Self::DisplayId>;

    /// All currently active displays, in the order the OS reports them
    fn active_displays(&self) -> DisplayResult<Vec<Self::DisplayId>>;

    /// Supported modes and the current mode of a display
    fn display_modes(&self, display: &Display<Self::DisplayId>) -> DisplayResult<ModeCatalog>;

    /// Switches `display` to `mode` in a single transaction persisted across logins.
    ///
    /// Either the whole change is committed or nothing is.
    fn configure(
        &mut self,
        display: &Display<Self::DisplayId>,
        mode: &DisplayMode,
    ) -> DisplayResult;

    /// Exit code reported when a display index is out of range
    fn range_check_code(&self) -> i32 {
        1
    }
}

/// An active display, addressed by its position in the enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display<Id> {
    pub index: usize,
    pub id: Id,
}

impl<Id> Display<Id> {
    /// Index 0 is always the main display
    pub fn is_main(&self) -> bool {
        self.index == 0
    }
}

/// Returns the active displays, the main display first.
pub fn active_displays<S: DisplayService>(
    service: &S,
) -> DisplayResult<Vec<Display<S::DisplayId>>> {
    let mut ids = service.active_displays()?;
    let main = service.main_display()?;

    match ids.iter().position(|id| *id == main) {
        Some(0) => {}
        Some(position) => {
            let main = ids.remove(position);
            ids.insert(0, main);
        }
        None => warn!("Main display {:?} is not among the active displays", main),
    }

    debug!("Found {} active display(s): {:?}", ids.len(), ids);

    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| Display { index, id })
        .collect())
}

/// Resolves a display index to the display currently at that position.
pub fn resolve_display<S: DisplayService>(
    service: &S,
    index: usize,
) -> DisplayResult<Display<S::DisplayId>> {
    let mut displays = active_displays(service)?;
    let count = displays.len();

    if index >= count {
        return Err(DisplayModeError::DisplayOutOfRange {
            index,
            count,
            code: service.range_check_code(),
        });
    }

    Ok(displays.swap_remove(index))
}

/// Every mode the OS reports for a display, plus the one currently active
#[derive(Debug, Clone, PartialEq)]
pub struct ModeCatalog {
    pub modes: Vec<DisplayMode>,
    pub current: DisplayMode,
}

/// One printed line of a catalog
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ModeRow {
    pub mode: DisplayMode,
    pub current: bool,
}

impl ModeCatalog {
    pub fn new(modes: Vec<DisplayMode>, current: DisplayMode) -> Self {
        Self { modes, current }
    }

    /// Position of the first supported mode equal to the current mode
    pub fn current_position(&self) -> Option<usize> {
        self.modes.iter().position(|mode| *mode == self.current)
    }

    /// The catalog as printed: each supported mode in order, with exactly one row marked current.
    ///
    /// The OS does not always list the current mode among the supported ones. In that case it is
    /// appended as an extra row.
    pub fn rows(&self) -> Vec<ModeRow> {
        let current = self.current_position();
        let mut rows: Vec<ModeRow> = self
            .modes
            .iter()
            .enumerate()
            .map(|(position, mode)| ModeRow {
                mode: *mode,
                current: Some(position) == current,
            })
            .collect();

        if current.is_none() {
            warn!("Current mode {} is missing from the supported modes", self.current);
            rows.push(ModeRow {
                mode: self.current,
                current: true,
            });
        }

        rows
    }

    /// The first mode, in catalog order, accepted by `target`
    pub fn select(&self, target: &TargetSpec) -> Option<&DisplayMode> {
        select_mode(&self.modes, target)
    }
}

/// Returns the first mode with exactly the target resolution and a refresh rate within tolerance.
///
/// Never substitutes a closest match.
pub fn select_mode<'a>(modes: &'a [DisplayMode], target: &TargetSpec) -> Option<&'a DisplayMode> {
    let selected = modes.iter().find(|mode| target.accepts(mode));
    trace!("Selected {:?} for {}", selected, target);
    selected
}

/// Lists every active display together with its modes.
pub fn display_catalogs<S: DisplayService>(
    service: &S,
) -> DisplayResult<Vec<(Display<S::DisplayId>, ModeCatalog)>> {
    active_displays(service)?
        .into_iter()
        .map(|display| -> DisplayResult<_> {
            let catalog = service.display_modes(&display)?;
            debug!(
                "Display {} ({:?}) reports {} mode(s)",
                display.index,
                display.id,
                catalog.modes.len()
            );
            Ok((display, catalog))
        })
        .collect()
}

/// Outcome of a mode change
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ModeChange {
    pub display: usize,
    /// The mode active before the change
    pub previous: DisplayMode,
    /// The mode that was (or, for a dry run, would be) applied
    pub applied: DisplayMode,
    pub dry_run: bool,
}

/// Changes the resolution of the target display.
///
/// Nothing is sent to the OS when the display does not exist or no mode matches. With `dry_run`
/// the mode is selected and reported but never applied.
pub fn change_mode<S: DisplayService>(
    service: &mut S,
    target: &TargetSpec,
    dry_run: bool,
) -> DisplayResult<ModeChange> {
    let display = resolve_display(service, target.display)?;
    let catalog = service.display_modes(&display)?;

    let mode = *catalog
        .select(target)
        .ok_or(DisplayModeError::NoMatchingMode(*target))?;
    let previous = catalog.current;

    if dry_run {
        info!("Dry run, not applying {} to display {}", mode, display.index);
    } else {
        service.configure(&display, &mode)?;
        info!("Display {} changed from {} to {}", display.index, previous, mode);
    }

    Ok(ModeChange {
        display: display.index,
        previous,
        applied: mode,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDisplays;
    use crate::ConfigStep;

    fn laptop_catalog() -> ModeCatalog {
        let current = DisplayMode::new(2560, 1600, 60.0, true);
        ModeCatalog::new(
            vec![
                current,
                DisplayMode::new(1280, 800, 60.0, true),
                DisplayMode::new(640, 480, 60.0, false),
            ],
            current,
        )
    }

    #[test]
    fn test_rows_mark_current_once() {
        let rows = laptop_catalog().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|row| row.current).count(), 1);
        assert!(rows[0].current);
    }

    #[test]
    fn test_rows_mark_only_first_duplicate() {
        let current = DisplayMode::new(1920, 1080, 60.0, true);
        let catalog = ModeCatalog::new(vec![current, current], current);
        let rows = catalog.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].current);
        assert!(!rows[1].current);
    }

    #[test]
    fn test_rows_append_missing_current() {
        let current = DisplayMode::new(1440, 900, 59.88, true);
        let mut catalog = laptop_catalog();
        catalog.current = current;

        let rows = catalog.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|row| row.current).count(), 1);
        assert_eq!(rows[3], ModeRow { mode: current, current: true });
    }

    #[test]
    fn test_current_requires_full_equality() {
        let catalog = ModeCatalog::new(
            vec![DisplayMode::new(1280, 800, 60.0, true)],
            DisplayMode::new(1280, 800, 59.0, true),
        );
        assert_eq!(catalog.current_position(), None);
        assert_eq!(catalog.rows().len(), 2);
    }

    #[test]
    fn test_select_every_listed_resolution() {
        let catalog = laptop_catalog();
        for mode in &catalog.modes {
            let target = TargetSpec::new(mode.width(), mode.height());
            let selected = catalog.select(&target).unwrap();
            assert_eq!(selected.resolution, mode.resolution);
        }
    }

    #[test]
    fn test_select_first_match_wins() {
        let first = DisplayMode::new(1920, 1080, 60.0, true).with_detail(32);
        let second = DisplayMode::new(1920, 1080, 60.0, true).with_detail(16);
        let modes = [first, second];
        assert_eq!(select_mode(&modes, &TargetSpec::new(1920, 1080)), Some(&first));
    }

    #[test]
    fn test_select_refresh_rate() {
        let modes = [
            DisplayMode::new(1920, 1080, 60.0, true),
            DisplayMode::new(1920, 1080, 59.94, true),
            DisplayMode::new(1920, 1080, 144.0, true),
        ];

        let target = TargetSpec::new(1920, 1080).with_refresh_rate(59.94);
        assert_eq!(select_mode(&modes, &target), Some(&modes[1]));

        let target = TargetSpec::new(1920, 1080).with_refresh_rate(144.004);
        assert_eq!(select_mode(&modes, &target), Some(&modes[2]));

        let target = TargetSpec::new(1920, 1080).with_refresh_rate(145.0);
        assert_eq!(select_mode(&modes, &target), None);

        let target = TargetSpec::new(1920, 1200);
        assert_eq!(select_mode(&modes, &target), None);
    }

    #[test]
    fn test_main_display_first() {
        let fake = FakeDisplays::new(7)
            .with_display(3, laptop_catalog())
            .with_display(7, laptop_catalog())
            .with_display(5, laptop_catalog());

        let displays = active_displays(&fake).unwrap();
        let ids: Vec<u32> = displays.iter().map(|display| display.id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
        assert!(displays[0].is_main());
        assert_eq!(resolve_display(&fake, 0).unwrap().id, 7);
        assert_eq!(resolve_display(&fake, 2).unwrap().id, 5);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let fake = FakeDisplays::new(1).with_display(1, laptop_catalog());
        let err = resolve_display(&fake, 1).unwrap_err();
        assert!(matches!(
            err,
            DisplayModeError::DisplayOutOfRange { index: 1, count: 1, .. }
        ));
    }

    #[test]
    fn test_enumeration_failure() {
        let fake = FakeDisplays::new(1)
            .with_display(1, laptop_catalog())
            .failing_enumeration(1001);
        let err = active_displays(&fake).unwrap_err();
        assert!(matches!(err, DisplayModeError::Enumeration { code: 1001 }));
        assert_eq!(err.exit_code(), 1001);
    }

    #[test]
    fn test_change_mode() {
        let mut fake = FakeDisplays::new(1).with_display(1, laptop_catalog());
        let change = change_mode(&mut fake, &TargetSpec::new(1280, 800), false).unwrap();

        assert_eq!(change.display, 0);
        assert_eq!(change.previous, DisplayMode::new(2560, 1600, 60.0, true));
        assert_eq!(change.applied, DisplayMode::new(1280, 800, 60.0, true));
        assert_eq!(fake.configured, vec![(1, change.applied)]);
    }

    #[test]
    fn test_change_mode_on_secondary_display() {
        let external = ModeCatalog::new(
            vec![
                DisplayMode::new(3840, 2160, 60.0, true),
                DisplayMode::new(1920, 1080, 60.0, true),
            ],
            DisplayMode::new(3840, 2160, 60.0, true),
        );
        let mut fake = FakeDisplays::new(1)
            .with_display(1, laptop_catalog())
            .with_display(2, external);

        let target = TargetSpec::new(1920, 1080).on_display(1);
        let change = change_mode(&mut fake, &target, false).unwrap();
        assert_eq!(change.display, 1);
        assert_eq!(fake.configured.len(), 1);
        assert_eq!(fake.configured[0].0, 2);
    }

    #[test]
    fn test_change_mode_without_match_does_not_configure() {
        let mut fake = FakeDisplays::new(1).with_display(1, laptop_catalog());
        let err = change_mode(&mut fake, &TargetSpec::new(1920, 1080), false).unwrap_err();
        assert!(matches!(err, DisplayModeError::NoMatchingMode(_)));
        assert!(fake.configured.is_empty());
    }

    #[test]
    fn test_change_mode_out_of_range_does_not_configure() {
        let mut fake = FakeDisplays::new(1).with_display(1, laptop_catalog());
        let target = TargetSpec::new(1280, 800).on_display(1);
        let err = change_mode(&mut fake, &target, false).unwrap_err();
        assert!(matches!(err, DisplayModeError::DisplayOutOfRange { .. }));
        assert!(fake.configured.is_empty());
    }

    #[test]
    fn test_change_mode_dry_run() {
        let mut fake = FakeDisplays::new(1).with_display(1, laptop_catalog());
        let change = change_mode(&mut fake, &TargetSpec::new(1280, 800), true).unwrap();
        assert!(change.dry_run);
        assert!(fake.configured.is_empty());
    }

    #[test]
    fn test_change_mode_configuration_failure() {
        let mut fake = FakeDisplays::new(1)
            .with_display(1, laptop_catalog())
            .failing_configuration(ConfigStep::Commit, 1004);
        let err = change_mode(&mut fake, &TargetSpec::new(1280, 800), false).unwrap_err();
        assert!(matches!(
            err,
            DisplayModeError::Configuration {
                step: ConfigStep::Commit,
                code: 1004
            }
        ));
        assert_eq!(err.exit_code(), 1004);
        assert!(fake.configured.is_empty());
    }
}
