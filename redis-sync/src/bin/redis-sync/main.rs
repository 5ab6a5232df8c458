mod examples;
mod output;
mod summary;
mod theme;

use anyhow::{Context, Result};
use clap::{
    builder::{
        styling::{AnsiColor, Color as ClapColor, RgbColor, Style},
        Styles,
    },
    error::ErrorKind,
    ArgAction, ColorChoice, Command, CommandFactory, FromArgMatches, Parser,
};

use colored::{control::ShouldColorize, Color as ThemeColor, Colorize};
use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use examples::{ExampleGroup, EXAMPLES};
use output::{Console, GlobalOptions, OutputFormat};
use redis_sync::{
    ConfigFile, ConfigOverrides, EndpointOverrides, ErrorPolicy, ExistingKeyPolicy, SyncConfig, SyncRunner,
    TtlPolicy,
};
use summary::failures_table;
use theme::{EXAMPLE_GLYPH, PALETTE, Tone};

/// Fatal errors: bad configuration, unreachable store, missing marker, abort.
const EXIT_FAILURE: i32 = 1;
/// The run finished but at least one key failed to copy.
const EXIT_PARTIAL: i32 = 2;

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_SYNC_SOURCE_PASSWORD", "Password for the source instance"),
    ("REDIS_SYNC_DEST_PASSWORD", "Password for the destination instance"),
    ("RUST_LOG", "Log filter (e.g. redis_sync=debug)"),
];

#[derive(Parser)]
#[command(name = "redis-sync")]
#[command(version = "0.1.0")]
#[command(
    about = "Copy keys from a source Redis instance into a destination instance",
    long_about = r#"Copy keys from a source Redis instance into a destination instance:

• Strings, lists, sets, hashes, sorted sets and streams keep their type and value
• Remaining TTLs are preserved unless --ttl drop is given
• Every key is written in its own MULTI/EXEC block
• The source is only ever read

Exit codes:
  0  every key was copied
  1  configuration or connection error (nothing written)
  2  the run finished but some keys failed
"#
)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Source (read-from) host
    #[arg(short = 'H', long = "source-host", value_name = "HOST", help_heading = "Source")]
    source_host: Option<String>,

    /// Source port
    #[arg(short = 'P', long = "source-port", value_name = "PORT", help_heading = "Source")]
    source_port: Option<String>,

    /// Source database number
    #[arg(long = "source-db", value_name = "DB", help_heading = "Source")]
    source_db: Option<i64>,

    /// Source ACL username
    #[arg(long = "source-user", value_name = "USER", help_heading = "Source")]
    source_user: Option<String>,

    /// Source password
    #[arg(
        long = "source-password",
        value_name = "PASSWORD",
        env = "REDIS_SYNC_SOURCE_PASSWORD",
        hide_env_values = true,
        help_heading = "Source"
    )]
    source_password: Option<String>,

    /// Destination (write-to) host
    #[arg(short = 'h', long = "dest-host", value_name = "HOST", help_heading = "Destination")]
    dest_host: Option<String>,

    /// Destination port
    #[arg(short = 'p', long = "dest-port", value_name = "PORT", help_heading = "Destination")]
    dest_port: Option<String>,

    /// Destination database number
    #[arg(long = "dest-db", value_name = "DB", help_heading = "Destination")]
    dest_db: Option<i64>,

    /// Destination ACL username
    #[arg(long = "dest-user", value_name = "USER", help_heading = "Destination")]
    dest_user: Option<String>,

    /// Destination password
    #[arg(
        long = "dest-password",
        value_name = "PASSWORD",
        env = "REDIS_SYNC_DEST_PASSWORD",
        hide_env_values = true,
        help_heading = "Destination"
    )]
    dest_password: Option<String>,

    /// Only copy keys matching this glob [default: *]
    #[arg(short = 'm', long = "match", value_name = "GLOB")]
    pattern: Option<String>,

    /// COUNT hint for each SCAN call [default: 500]
    #[arg(long, value_name = "N")]
    scan_count: Option<usize>,

    /// What to do with expirations [default: preserve]
    #[arg(long, value_enum)]
    ttl: Option<TtlPolicy>,

    /// What to do with keys already in the destination [default: overwrite]
    #[arg(long, value_enum)]
    existing: Option<ExistingKeyPolicy>,

    /// What to do when a key fails to copy [default: continue]
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,

    /// Read and classify keys without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Refuse to run unless this key exists in the source
    #[arg(long, value_name = "KEY")]
    require_marker: Option<String>,

    /// Seconds to wait for each connection [default: 5]
    #[arg(long = "connect-timeout", value_name = "SECS")]
    connect_timeout: Option<u64>,

    /// TOML config file; command-line flags take precedence
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors and JSON summaries will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output and debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Print help (-h is the destination host)
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let matches = match command.styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = print_blank_line_stdout();
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display help: {print_err}");
                    }
                    let _ = print_blank_line_stdout();
                    std::process::exit(0);
                }
                _ => {
                    let _ = print_blank_line_stderr();
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display error: {print_err}");
                    }
                    let _ = print_blank_line_stderr();
                    // Usage errors are configuration errors; 2 is reserved for partial runs.
                    std::process::exit(EXIT_FAILURE);
                }
            },
        };

        Cli::from_arg_matches(&matches).unwrap_or_else(|err| {
            eprintln!("{err}");
            std::process::exit(EXIT_FAILURE);
        })
    }

    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            output_format: self.output.clone(),
            quiet: self.quiet,
            verbose: self.verbose,
            no_color: self.no_color,
        }
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source: EndpointOverrides {
                host: self.source_host.clone(),
                port: self.source_port.clone(),
                db: self.source_db,
                username: self.source_user.clone(),
                password: self.source_password.clone(),
            },
            destination: EndpointOverrides {
                host: self.dest_host.clone(),
                port: self.dest_port.clone(),
                db: self.dest_db,
                username: self.dest_user.clone(),
                password: self.dest_password.clone(),
            },
            pattern: self.pattern.clone(),
            scan_count: self.scan_count,
            ttl: self.ttl,
            existing: self.existing,
            on_error: self.on_error,
            dry_run: self.dry_run,
            require_marker: self.require_marker.clone(),
            connect_timeout_secs: self.connect_timeout,
        }
    }
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_appendix(EXAMPLES, use_color);
    let command = Cli::command().after_long_help(appendix);
    command.color(if use_color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

fn render_appendix(groups: &[ExampleGroup], use_color: bool) -> String {
    let palette = &PALETTE;
    let mut buffer = String::new();

    let heading = stylize("Examples:", palette.heading, true, use_color);
    let _ = writeln!(buffer, "{heading}");

    for group in groups {
        let title = stylize(group.title, palette.label, true, use_color);
        let _ = writeln!(buffer, "  {title}");

        for command in group.commands {
            let arrow = stylize(EXAMPLE_GLYPH, palette.dim, false, use_color);
            let command_text = stylize(command, palette.literal, false, use_color);
            let _ = writeln!(buffer, "    {arrow} {command_text}");
        }

        buffer.push('\n');
    }

    let env_heading = stylize("Environment Variables:", palette.heading, true, use_color);
    let _ = writeln!(buffer, "{env_heading}");
    for (key, description) in ENVIRONMENT_VARIABLES {
        let key_text = stylize(key, palette.label, true, use_color);
        let value_text = stylize(description, palette.text, false, use_color);
        let _ = writeln!(buffer, "  {key_text}  {value_text}");
    }

    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn stylize(text: &str, color: ThemeColor, bold: bool, use_color: bool) -> String {
    if use_color {
        let styled = text.color(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    } else {
        text.to_string()
    }
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    let palette = &PALETTE;
    Styles::styled()
        .usage(style_from_color(palette.heading).bold())
        .header(style_from_color(palette.heading).bold())
        .literal(style_from_color(palette.literal))
        .placeholder(style_from_color(palette.dim))
        .valid(style_from_color(Tone::Copied.color()))
        .invalid(style_from_color(Tone::Notice.color()))
        .error(style_from_color(Tone::Failed.color()).bold())
}

fn style_from_color(color: ThemeColor) -> Style {
    Style::new().fg_color(Some(color_to_clap_color(color)))
}

fn color_to_clap_color(color: ThemeColor) -> ClapColor {
    match color {
        ThemeColor::Black => ClapColor::Ansi(AnsiColor::Black),
        ThemeColor::Red => ClapColor::Ansi(AnsiColor::Red),
        ThemeColor::Green => ClapColor::Ansi(AnsiColor::Green),
        ThemeColor::Yellow => ClapColor::Ansi(AnsiColor::Yellow),
        ThemeColor::Blue => ClapColor::Ansi(AnsiColor::Blue),
        ThemeColor::Magenta => ClapColor::Ansi(AnsiColor::Magenta),
        ThemeColor::Cyan => ClapColor::Ansi(AnsiColor::Cyan),
        ThemeColor::White => ClapColor::Ansi(AnsiColor::White),
        ThemeColor::BrightBlack => ClapColor::Ansi(AnsiColor::BrightBlack),
        ThemeColor::BrightRed => ClapColor::Ansi(AnsiColor::BrightRed),
        ThemeColor::BrightGreen => ClapColor::Ansi(AnsiColor::BrightGreen),
        ThemeColor::BrightYellow => ClapColor::Ansi(AnsiColor::BrightYellow),
        ThemeColor::BrightBlue => ClapColor::Ansi(AnsiColor::BrightBlue),
        ThemeColor::BrightMagenta => ClapColor::Ansi(AnsiColor::BrightMagenta),
        ThemeColor::BrightCyan => ClapColor::Ansi(AnsiColor::BrightCyan),
        ThemeColor::BrightWhite => ClapColor::Ansi(AnsiColor::BrightWhite),
        ThemeColor::TrueColor { r, g, b } => ClapColor::Rgb(RgbColor(r, g, b)),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "redis_sync=debug" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

// Keys are copied one at a time over one connection per store, so a
// single-threaded runtime is all the run needs.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_with_styles();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_PARTIAL),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}

/// Returns whether every key was copied.
async fn execute(cli: Cli) -> Result<bool> {
    let console = Console::new(cli.global_options());

    let file = cli.config.as_deref().map(ConfigFile::load).transpose()?;
    let config = SyncConfig::resolve(file, cli.overrides())?;
    let options = &config.options;

    console.heading("Redis Sync");
    console.field("Source", &config.source.to_string());
    console.field("Destination", &config.destination.to_string());
    console.field("Match", &options.pattern);
    console.detail(&format!(
        "ttl={:?} existing={:?} on_error={:?} scan_count={} write_chunk={}",
        options.ttl, options.existing, options.on_error, options.scan_count, options.write_chunk
    ));
    if let Some(marker) = &options.require_marker {
        console.say(Tone::Notice, &format!("Requires marker key {marker} in the source"));
    }
    if options.dry_run {
        console.say(Tone::Notice, "Dry run: nothing will be written to the destination");
    }

    let (mut source, mut destination) = console
        .step("Connecting to source and destination", redis_sync::connect(&config))
        .await?;
    console.say(Tone::Ready, "Connected to source and destination");

    let report = console
        .step("Copying keys", SyncRunner::new(&mut source, &mut destination, options).run())
        .await?;

    console.heading("Summary");
    console.render(&report).context("Failed to render summary")?;

    if !report.is_success() {
        if console.options.output_format == OutputFormat::Table && !console.options.quiet {
            println!("{}", failures_table(&report, &console.options));
        }
        console.say(Tone::Failed, &format!("{} key(s) failed to copy", report.failed_count()));
    } else if report.dry_run {
        console.say(Tone::Notice, &format!("Dry run: {} key(s) would be copied", report.copied));
    } else {
        console.say(
            Tone::Copied,
            &format!("{} key(s) copied in {}ms", report.copied, report.elapsed_ms),
        );
    }

    Ok(report.is_success())
}
