use core::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::str::FromStr;

use thiserror::Error;

/// Absolute tolerance, in Hz, when comparing a requested refresh rate against the OS-reported one.
pub const REFRESH_RATE_TOLERANCE: f64 = 0.005;

/// Step of the display configuration transaction that failed
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigStep {
    Begin,
    Apply,
    Commit,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStep::Begin => write!(f, "Beginning the display configuration"),
            ConfigStep::Apply => write!(f, "Applying the display mode"),
            ConfigStep::Commit => write!(f, "Committing the display configuration"),
        }
    }
}

/// Error type for every displaymode operation
#[derive(Error, Debug)]
pub enum DisplayModeError {
    #[error("Missing option; server mode is not supported")]
    MissingCommand,
    #[error("Invalid option: '{0}'")]
    InvalidCommand(String),
    #[error("Invalid mode: {0}")]
    InvalidMode(#[from] ParseTargetError),
    #[error("Could not enumerate the active displays (error {code})")]
    Enumeration { code: i32 },
    #[error("Display {index} does not exist; {count} active display(s), valid indices are 0..{count}")]
    DisplayOutOfRange { index: usize, count: usize, code: i32 },
    #[error("Could not read the display modes of display {index} (error {code})")]
    ModeQuery { index: usize, code: i32 },
    #[error("Could not find a mode for resolution {0}")]
    NoMatchingMode(TargetSpec),
    #[error("{step} failed with error {code}")]
    Configuration { step: ConfigStep, code: i32 },
    #[error("Changing display modes is not supported on this platform")]
    Unsupported,
    #[error("Could not write output")]
    Io(#[from] std::io::Error),
}

impl DisplayModeError {
    /// Whether the error came from the command line alone, before any OS call
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            DisplayModeError::MissingCommand
                | DisplayModeError::InvalidCommand(_)
                | DisplayModeError::InvalidMode(_)
        )
    }

    /// The process exit status for this error. OS error codes are passed through; never zero.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            DisplayModeError::Enumeration { code }
            | DisplayModeError::DisplayOutOfRange { code, .. }
            | DisplayModeError::ModeQuery { code, .. }
            | DisplayModeError::Configuration { code, .. } => *code,
            _ => 1,
        };

        if code == 0 {
            1
        } else {
            code
        }
    }
}

pub type DisplayResult<T = ()> = std::result::Result<T, DisplayModeError>;

/// Contains the resolution of a display
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Creates a new resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Refresh rate in Hz. Zero means the OS does not know the rate.
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RefreshRate(pub f64);

impl RefreshRate {
    /// Whether `other` lies within [`REFRESH_RATE_TOLERANCE`] of this rate, bounds included.
    ///
    /// The bound is widened by the rounding error of the subtraction so that rates exactly
    /// 0.005 Hz away match on both sides.
    pub fn matches(self, other: RefreshRate) -> bool {
        let rounding = f64::EPSILON * self.0.abs().max(other.0.abs());
        (self.0 - other.0).abs() <= REFRESH_RATE_TOLERANCE + rounding
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}Hz", self.0)
    }
}

/// A mode a display can be switched to, as reported by the OS
///
/// Equality covers every field, including the OS-specific `detail`, so two entries with the same
/// resolution and rate but different underlying modes stay distinct.
#[derive(Debug, Copy, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DisplayMode {
    pub resolution: Resolution,
    pub refresh_rate: RefreshRate,
    /// Whether the OS considers the mode suitable for a regular desktop session
    pub usable: bool,
    /// OS-specific discriminator: the IOKit mode id on macOS, the colour depth on Windows
    #[serde(skip)]
    pub detail: i64,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, refresh_rate: f64, usable: bool) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            refresh_rate: RefreshRate(refresh_rate),
            usable,
            detail: 0,
        }
    }

    /// Sets the OS-specific discriminator
    pub fn with_detail(mut self, detail: i64) -> Self {
        self.detail = detail;
        self
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {} @{}",
            self.resolution.width, self.resolution.height, self.refresh_rate
        )
    }
}

/// The mode requested on the command line
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TargetSpec {
    pub resolution: Resolution,
    /// `None` accepts any refresh rate
    pub refresh_rate: Option<RefreshRate>,
    pub display: usize,
}

impl TargetSpec {
    /// Creates a target for the main display accepting any refresh rate
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: Resolution::new(width, height),
            refresh_rate: None,
            display: 0,
        }
    }

    pub fn with_refresh_rate(mut self, refresh_rate: f64) -> Self {
        self.refresh_rate = Some(RefreshRate(refresh_rate));
        self
    }

    pub fn on_display(mut self, display: usize) -> Self {
        self.display = display;
        self
    }

    /// Whether `mode` has exactly this resolution and an acceptable refresh rate
    pub fn accepts(&self, mode: &DisplayMode) -> bool {
        mode.resolution == self.resolution
            && self
                .refresh_rate
                .map_or(true, |rate| rate.matches(mode.refresh_rate))
    }

    /// Parses the arguments following the `t` command: `<width> <height> [@<refresh>] [display]`
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> std::result::Result<Self, ParseTargetError> {
        let mut tokens = args.iter().map(AsRef::<str>::as_ref);

        let width = parse_dimension(tokens.next().ok_or(ParseTargetError::MissingWidth)?)?;
        let height = parse_dimension(tokens.next().ok_or(ParseTargetError::MissingHeight)?)?;
        let mut target = TargetSpec::new(width, height);

        let mut next = tokens.next();
        if let Some(token) = next.and_then(|token| token.strip_prefix('@')) {
            let rate = token
                .parse()
                .map_err(|source| ParseTargetError::RefreshRate(token.to_string(), source))?;
            target.refresh_rate = Some(rate);
            next = tokens.next();
        }

        if let Some(token) = next {
            target.display = token
                .parse()
                .map_err(|source| ParseTargetError::Display(token.to_string(), source))?;
        }

        if let Some(extra) = tokens.next() {
            return Err(ParseTargetError::Unexpected(extra.to_string()));
        }

        Ok(target)
    }
}

fn parse_dimension(token: &str) -> std::result::Result<u32, ParseTargetError> {
    match token.parse::<u32>() {
        Ok(0) => Err(ParseTargetError::Zero(token.to_string())),
        Ok(value) => Ok(value),
        Err(source) => Err(ParseTargetError::Dimension(token.to_string(), source)),
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolution)?;
        // As requested, not rounded like the mode table
        if let Some(rate) = self.refresh_rate {
            write!(f, " @{}Hz", rate.0)?;
        }
        write!(f, " on display {}", self.display)
    }
}

/// Errors that occur while parsing a refresh rate from a string
#[derive(Error, Debug)]
pub enum ParseRefreshRateError {
    #[error("not a number")]
    FloatError(#[from] ParseFloatError),
    #[error("must be a finite, non-negative number")]
    OutOfRange,
}

impl FromStr for RefreshRate {
    type Err = ParseRefreshRateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let rate: f64 = s.parse()?;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ParseRefreshRateError::OutOfRange);
        }
        Ok(Self(rate))
    }
}

/// Errors that occur while parsing the arguments of a mode change
#[derive(Error, Debug)]
pub enum ParseTargetError {
    #[error("width is missing. Expected: t <width> <height> [@<refresh>] [display]")]
    MissingWidth,
    #[error("height is missing. Expected: t <width> <height> [@<refresh>] [display]")]
    MissingHeight,
    #[error("'{0}' is not a positive integer")]
    Dimension(String, #[source] ParseIntError),
    #[error("'{0}' must be greater than zero")]
    Zero(String),
    #[error("'@{0}' is not a refresh rate: {1}")]
    RefreshRate(String, #[source] ParseRefreshRateError),
    #[error("'{0}' is not a display index")]
    Display(String, #[source] ParseIntError),
    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}
