//! SafeFetch CLI - fetch public pages as bounded text, or serve the tool over MCP

mod mcp;

use clap::{Args, Parser, Subcommand, ValueEnum};
use safefetch::{
    DenyReason, FetchUrlInput, SafetyVerdict, Tool, ToolBuilder, ERROR_PREFIX, TOOL_LLMTXT,
};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for fetch subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Plain tool result string
    #[default]
    Text,
    /// Extracted document with metadata as JSON
    Json,
}

/// SafeFetch - SSRF-guarded web content fetching tool
#[derive(Parser, Debug)]
#[command(name = "safefetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,

    #[command(flatten)]
    limits: Limits,
}

/// Limits shared by `fetch` and `mcp`
#[derive(Args, Debug, Clone)]
struct Limits {
    /// Bound on the whole fetch, in seconds
    #[arg(long, global = true, env = "SAFEFETCH_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Maximum length of returned text, in characters
    #[arg(long, global = true, env = "SAFEFETCH_MAX_LENGTH", default_value_t = 30_000)]
    max_length: usize,

    /// Redirect hops to validate and follow (0 disables redirects)
    #[arg(long, global = true, default_value_t = 5)]
    max_redirects: usize,

    /// Custom User-Agent
    #[arg(long, global = true)]
    user_agent: Option<String>,
}

impl Limits {
    fn tool_builder(&self) -> ToolBuilder {
        let mut builder = Tool::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_length(self.max_length)
            .max_redirects(self.max_redirects);

        if let Some(ref ua) = self.user_agent {
            builder = builder.user_agent(ua.clone());
        }

        builder
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as MCP (Model Context Protocol) server over stdio
    Mcp,
    /// Fetch URL and print its text
    Fetch {
        /// URL to fetch
        url: String,

        /// Output format
        #[arg(long, short, default_value = "text")]
        output: OutputFormat,
    },
    /// Print the safety verdict for a URL without fetching it
    Check {
        /// URL to check
        url: String,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries tool output and JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle --llmtxt flag
    if cli.llmtxt {
        writeln_safe(TOOL_LLMTXT);
        std::process::exit(0);
    }

    let tool = cli.limits.tool_builder().build();

    match cli.command {
        Some(Commands::Mcp) => {
            mcp::run_server(tool).await;
        }
        Some(Commands::Fetch { url, output }) => {
            run_fetch(&tool, url, output).await;
        }
        Some(Commands::Check { url }) => {
            let verdict = tool.check(&url);
            writeln_safe(&format_verdict(&verdict));
            if !verdict.is_allowed() {
                std::process::exit(2);
            }
        }
        None => {
            eprintln!("Usage: safefetch fetch <URL>");
            eprintln!("   or: safefetch check <URL>");
            eprintln!("   or: safefetch mcp");
            eprintln!("   or: safefetch --help");
            std::process::exit(1);
        }
    }
}

async fn run_fetch(tool: &Tool, url: String, output: OutputFormat) {
    let input = FetchUrlInput::new(url);

    match output {
        OutputFormat::Text => {
            let result = tool.execute(input).await;
            let failed = result.starts_with(ERROR_PREFIX);
            writeln_safe(&result);
            if failed {
                std::process::exit(1);
            }
        }
        OutputFormat::Json => match tool.try_execute(input).await {
            Ok(document) => {
                let json = serde_json::to_string_pretty(&document).unwrap_or_else(|e| {
                    eprintln!("Error serializing response: {}", e);
                    std::process::exit(1);
                });
                writeln_safe(&json);
            }
            Err(e) => {
                eprintln!("{}{}", ERROR_PREFIX, e);
                std::process::exit(1);
            }
        },
    }
}

/// One-line description of a verdict
fn format_verdict(verdict: &SafetyVerdict) -> String {
    match verdict {
        SafetyVerdict::Allowed => "allowed".to_string(),
        SafetyVerdict::Denied(DenyReason::MalformedUrl(detail)) => {
            format!("denied: malformed URL ({})", detail)
        }
        SafetyVerdict::Denied(DenyReason::InsecureScheme(scheme)) => {
            format!("denied: insecure scheme ({})", scheme)
        }
        SafetyVerdict::Denied(DenyReason::BlockedTarget(host)) => {
            format!("denied: blocked target ({})", host)
        }
    }
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
