//! Colors and glyphs of the sync console.
//!
//! Every printed line has a [`Tone`]. The four key outcomes each get their
//! own tone so the progress lines, the summary rows and the failures table
//! agree on how a copied, skipped, vanished or failed key looks.

use colored::Color;
use comfy_table::Color as TableColor;
use once_cell::sync::Lazy;
use redis_sync::CopyOutcome;

/// Colors for the parts of the console that are not tied to an outcome.
pub struct Palette {
    /// Section headings and the usage line of `--help`.
    pub heading: Color,
    /// Endpoint and option labels.
    pub label: Color,
    pub text: Color,
    /// Flags and example commands.
    pub literal: Color,
    pub dim: Color,
}

pub static PALETTE: Lazy<Palette> = Lazy::new(|| Palette {
    heading: Color::BrightBlue,
    label: Color::BrightCyan,
    text: Color::White,
    literal: Color::Magenta,
    dim: Color::BrightBlack,
});

/// Glyph placed in front of example commands.
pub const EXAMPLE_GLYPH: &str = "→";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Copied,
    Skipped,
    Vanished,
    Failed,
    /// Dry-run banner, marker requirement and other things worth noticing.
    Notice,
    /// An operation in flight.
    Working,
    /// An operation that finished, such as a connection being established.
    Ready,
    /// Verbose-only details.
    Detail,
}

impl Tone {
    pub fn glyph(self) -> &'static str {
        match self {
            Tone::Copied => "✓",
            Tone::Skipped => "↷",
            Tone::Vanished => "∅",
            Tone::Failed => "✗",
            Tone::Notice => "⚠",
            Tone::Working => "⟳",
            Tone::Ready => "●",
            Tone::Detail => "·",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Tone::Copied => Color::Green,
            Tone::Skipped => Color::Yellow,
            Tone::Vanished => Color::Blue,
            Tone::Failed => Color::Red,
            Tone::Notice => Color::BrightYellow,
            Tone::Working => Color::Cyan,
            Tone::Ready => Color::Green,
            Tone::Detail => PALETTE.dim,
        }
    }

    /// Same color for `comfy-table` cells.
    pub fn table_color(self) -> TableColor {
        match self {
            Tone::Copied => TableColor::Green,
            Tone::Skipped => TableColor::Yellow,
            Tone::Vanished => TableColor::Blue,
            Tone::Failed => TableColor::Red,
            Tone::Notice => TableColor::Yellow,
            Tone::Working => TableColor::Cyan,
            Tone::Ready => TableColor::Green,
            Tone::Detail => TableColor::DarkGrey,
        }
    }
}

impl From<CopyOutcome> for Tone {
    fn from(outcome: CopyOutcome) -> Self {
        match outcome {
            CopyOutcome::Copied => Tone::Copied,
            CopyOutcome::Skipped => Tone::Skipped,
            CopyOutcome::Vanished => Tone::Vanished,
        }
    }
}
