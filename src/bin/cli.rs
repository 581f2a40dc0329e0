use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser as ClapParser};
use tracing_subscriber::EnvFilter;

use httpspan::{
    EventLog, MessageCollector, MessageKind, ParseError, ParserConfig, format_debug,
    format_events, format_headers_only, format_json, parse_chunks,
};

/// httpspan CLI — incremental HTTP/1.x parser.
///
/// Reads raw HTTP messages from a file, --raw string, or stdin, feeds them
/// to the parser in --chunk-size slices and prints every parsed message in
/// the chosen format.
///
/// Escape sequences (\r, \n, \t, \\) in the --raw value are interpreted so
/// you can pass a full HTTP message as a single shell argument.
#[derive(ClapParser)]
#[command(name = "httpspan-cli", version, about, long_about = None)]
struct Cli {
    /// Path to a file containing raw HTTP messages.
    /// Reads from stdin when neither FILE nor --raw is given.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Raw HTTP input string (escape sequences \r \n \t \\ are expanded).
    #[arg(long)]
    raw: Option<String>,

    /// Which messages to expect.
    #[arg(short, long, default_value = "either", value_enum)]
    kind: KindArg,

    /// Feed the input in slices of this many bytes.
    #[arg(long, default_value = "4096")]
    chunk_size: usize,

    /// Output format.
    #[arg(short, long, default_value = "json", value_enum)]
    format: OutputFormat,

    /// Pretty-print JSON output (ignored for other formats).
    #[arg(short, long)]
    pretty: bool,

    /// Treat every message as bodiless (responses to HEAD).
    #[arg(long)]
    skip_body: bool,

    /// Maximum bytes of start line plus headers.
    #[arg(long, default_value = "81920")]
    max_header_size: usize,

    /// Maximum number of headers allowed.
    #[arg(long, default_value = "128")]
    max_headers: usize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Request,
    Response,
    Either,
}

impl From<KindArg> for MessageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Request => MessageKind::Request,
            KindArg::Response => MessageKind::Response,
            KindArg::Either => MessageKind::Either,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    /// JSON output, one message per line
    Json,
    /// Human-readable debug output
    Debug,
    /// Start line + headers only
    Headers,
    /// Raw parser events
    Events,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // When no input source is provided and stdin is a terminal (not piped),
    // show help instead of blocking.
    if cli.file.is_none() && cli.raw.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().ok();
        println!();
        process::exit(0);
    }

    let data = match read_input(&cli) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            process::exit(1);
        }
    };

    if data.is_empty() {
        eprintln!("Error: empty input");
        process::exit(1);
    }

    let config = ParserConfig {
        kind: cli.kind.into(),
        max_header_size: cli.max_header_size,
        max_headers_count: cli.max_headers,
    };
    let chunks = data.chunks(cli.chunk_size.max(1));

    let output = match cli.format {
        OutputFormat::Events => {
            parse_chunks(chunks, config, EventLog::default()).map(|log| format_events(log.records()))
        }
        ref format => parse_chunks(chunks, config, MessageCollector::with_skip_body(cli.skip_body))
            .map(|collector| {
                collector
                    .messages()
                    .iter()
                    .map(|message| match format {
                        OutputFormat::Debug => format_debug(message),
                        OutputFormat::Headers => format_headers_only(message),
                        _ => format_json(message, cli.pretty) + "\n",
                    })
                    .collect::<String>()
            }),
    };

    match output {
        Ok(text) => print!("{text}"),
        Err(e) => {
            report(&e);
            process::exit(2);
        }
    }
}

fn report(error: &ParseError) {
    match error {
        ParseError::Invalid { kind, .. } => eprintln!("Parse error [{}]: {error}", kind.name()),
        ParseError::Incomplete => eprintln!("Parse error: {error}"),
    }
}

/// Read raw HTTP bytes from --raw, a file, or stdin.
fn read_input(cli: &Cli) -> Result<Vec<u8>, std::io::Error> {
    if let Some(raw) = &cli.raw {
        return Ok(unescape(raw).into_bytes());
    }
    match &cli.file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Expand C-style escape sequences (`\r`, `\n`, `\t`, `\\`) in a string.
///
/// Any other `\X` sequence is kept as-is (both the backslash and `X`).
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('r') => out.push('\r'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}
