//! Console output of the sync CLI.
//!
//! Chatter (headings, endpoints, connection steps) goes to stdout and is
//! silenced by `--quiet` and by `--output json`, so that JSON output stays
//! parseable. Failures go to stderr and are never silenced.

use std::fmt::Display;
use std::future::Future;
use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{presets, Attribute, Cell, Table};
use serde::Serialize;

use crate::theme::{PALETTE, Tone};

/// How the end-of-run summary is printed.
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    #[default]
    Table,
    /// Pretty-printed JSON of the whole report
    Json,
    /// One `name=value` line
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// A value the summary can print in each `OutputFormat`.
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct Console {
    pub options: GlobalOptions,
}

impl Console {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.options.no_color {
            text.to_string()
        } else {
            text.color(color).to_string()
        }
    }

    fn toned(&self, tone: Tone, message: &str) -> String {
        format!("{} {}", self.paint(tone.glyph(), tone.color()), self.paint(message, tone.color()))
    }

    /// Print one line in the given tone. `Tone::Failed` goes to stderr even when quiet.
    pub fn say(&self, tone: Tone, message: &str) {
        match tone {
            Tone::Failed => eprintln!("{}", self.toned(tone, message)),
            Tone::Detail => self.detail(message),
            _ if self.chatty() => println!("{}", self.toned(tone, message)),
            _ => {}
        }
    }

    /// Only shown with `--verbose`.
    pub fn detail(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.toned(Tone::Detail, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "-".repeat(text.chars().count()));
        } else {
            println!("\n{}", text.color(PALETTE.heading).bold());
        }
    }

    /// `label: value`, labels padded so endpoints line up.
    pub fn field(&self, label: &str, value: &str) {
        if !self.chatty() {
            return;
        }
        let label = format!("{label:>12}");
        if self.options.no_color {
            println!("{label}  {value}");
        } else {
            println!("{}  {}", label.color(PALETTE.label).bold(), value.color(PALETTE.text));
        }
    }

    /// Show `label` while `work` runs, then clear it.
    ///
    /// The caller prints the outcome; on error the line is cleared first so
    /// the error message starts on a clean line.
    pub async fn step<T, E, F>(&self, label: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.chatty() {
            return work.await;
        }

        let line = format!("{}...", self.toned(Tone::Working, label));
        print!("\r{line}");
        std::io::stdout().flush().ok();

        let result = work.await;

        // Glyph, space and the trailing dots.
        let width = label.chars().count() + 5;
        print!("\r{}\r", " ".repeat(width));
        std::io::stdout().flush().ok();

        result
    }

    /// Print `data` in the configured format. JSON is printed even when quiet.
    pub fn render<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            _ if self.options.quiet => {}
            OutputFormat::Table => println!("{}", data.to_table(&self.options)),
            OutputFormat::Compact => println!("{}", data.to_compact()),
        }
        Ok(())
    }
}

/// Empty table with bold headers, plain ASCII when colors are off.
pub fn new_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(if options.no_color {
        presets::ASCII_FULL
    } else {
        presets::UTF8_FULL_CONDENSED
    });
    let header: Vec<Cell> = headers
        .iter()
        .map(|header| Cell::new(header).add_attribute(Attribute::Bold))
        .collect();
    table.set_header(header);
    table
}

/// Cell prefixed with the tone's glyph, colored unless colors are off.
pub fn tone_cell(options: &GlobalOptions, tone: Tone, text: impl Display) -> Cell {
    let cell = Cell::new(format!("{} {text}", tone.glyph()));
    if options.no_color {
        cell
    } else {
        cell.fg(tone.table_color())
    }
}
