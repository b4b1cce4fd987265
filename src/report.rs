//! Text and JSON rendering of displays, modes and mode changes.

use std::io::{self, Write};

use serde::Serialize;

use crate::{Display, ModeCatalog, ModeChange, ModeRow};

/// Writes the mode table of every display, one block per display separated by a blank line.
pub fn write_catalogs<W: Write, Id>(
    out: &mut W,
    catalogs: &[(Display<Id>, ModeCatalog)],
) -> io::Result<()> {
    for (position, (display, catalog)) in catalogs.iter().enumerate() {
        if position > 0 {
            writeln!(out)?;
        }
        write_header(out, display)?;
        for row in catalog.rows() {
            writeln!(out, "{}", format_row(&row))?;
        }
    }
    Ok(())
}

fn write_header<W: Write, Id>(out: &mut W, display: &Display<Id>) -> io::Result<()> {
    if display.is_main() {
        writeln!(out, "Display {}: (main)", display.index)
    } else {
        writeln!(out, "Display {}:", display.index)
    }
}

/// `<width> x <height> @<rate>Hz`, then ` *` for the current mode and ` !` for a mode not usable
/// on the desktop.
pub fn format_row(row: &ModeRow) -> String {
    let mut line = row.mode.to_string();
    if row.current {
        line.push_str(" *");
    }
    if !row.mode.usable {
        line.push_str(" !");
    }
    line
}

/// One-line summary of a mode change. Refresh rates are shown when the request constrained them.
pub fn format_change(change: &ModeChange, with_rate: bool) -> String {
    let describe = |mode: &crate::DisplayMode| {
        if with_rate {
            format!("{} @{}", mode.resolution, mode.refresh_rate)
        } else {
            mode.resolution.to_string()
        }
    };

    let verb = if change.dry_run { "Would change" } else { "Changed" };
    format!(
        "{} display {} resolution from {} to {}",
        verb,
        change.display,
        describe(&change.previous),
        describe(&change.applied)
    )
}

#[derive(Debug, Serialize)]
struct DisplayReport {
    index: usize,
    main: bool,
    modes: Vec<ModeReport>,
}

#[derive(Debug, Serialize)]
struct ModeReport {
    width: u32,
    height: u32,
    refresh_rate: f64,
    usable: bool,
    current: bool,
}

impl From<&ModeRow> for ModeReport {
    fn from(row: &ModeRow) -> Self {
        ModeReport {
            width: row.mode.width(),
            height: row.mode.height(),
            refresh_rate: row.mode.refresh_rate.0,
            usable: row.mode.usable,
            current: row.current,
        }
    }
}

/// Writes the same information as [`write_catalogs`] as a pretty-printed JSON array.
pub fn write_catalogs_json<W: Write, Id>(
    out: &mut W,
    catalogs: &[(Display<Id>, ModeCatalog)],
) -> serde_json::Result<()> {
    let reports: Vec<DisplayReport> = catalogs
        .iter()
        .map(|(display, catalog)| DisplayReport {
            index: display.index,
            main: display.is_main(),
            modes: catalog.rows().iter().map(ModeReport::from).collect(),
        })
        .collect();

    serde_json::to_writer_pretty(&mut *out, &reports)?;
    writeln!(out).map_err(serde_json::Error::io)
}
