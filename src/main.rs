//! gmail-send-mcp: MCP server for Gmail email sending
//!
//! Exposes a single skill — sending email via Gmail with App Password
//! authentication — to AI hosts over stdio JSON-RPC.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use gmail_send_mcp::config;
use gmail_send_mcp::gmail::GmailSendSkill;
use gmail_send_mcp::mcp::server::McpServer;
use gmail_send_mcp::skill::SkillRegistry;

/// MCP server for Gmail email sending.
///
/// Provides the gmail_send tool: Markdown content conversion to HTML
/// and one SMTP submission per request, with App Password
/// authentication.
#[derive(Parser, Debug)]
#[command(name = "gmail-send-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,

    /// Print server info, tools, resources, and prompts, then exit
    #[arg(long)]
    self_test: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries protocol frames only.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the skill registry from configuration.
fn build_registry(cfg: &config::Config) -> Result<SkillRegistry, gmail_send_mcp::error::RegistryError> {
    let mut registry = SkillRegistry::new();
    registry.register(Box::new(GmailSendSkill::new(cfg.smtp.clone())))?;
    Ok(registry)
}

/// Prints server info, tools, resources, and prompts to stdout.
fn self_test(registry: &SkillRegistry) {
    println!(
        "gmail-send-mcp v{} — {} skill(s) registered",
        env!("CARGO_PKG_VERSION"),
        registry.len()
    );

    for skill in registry.iter() {
        let descriptor = skill.descriptor();
        println!("\ntool: {}", descriptor.name);
        println!("  {}", descriptor.description);
        for spec in descriptor.schema.params() {
            let requirement = if spec.required { "required" } else { "optional" };
            println!(
                "  - {} ({}, {})",
                spec.name,
                spec.param_type.json_name(),
                requirement
            );
        }
        for resource in &descriptor.resources {
            println!("  resource: {} ({})", resource.uri, resource.mime_type);
        }
        for prompt in &descriptor.prompts {
            println!("  prompt: {}", prompt.name);
        }
    }

    println!("\nSelf-test passed. Run without --self-test to serve.");
}

/// Entry point for the gmail-send-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration (defaults apply when no file exists)
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let registry = match build_registry(&cfg) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to build skill registry");
            return ExitCode::FAILURE;
        }
    };

    if args.self_test {
        self_test(&registry);
        return ExitCode::SUCCESS;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        relay = %cfg.smtp.server,
        port = cfg.smtp.port,
        "Starting gmail-send-mcp server"
    );

    // Create MCP server
    let mut server = McpServer::new(registry);

    info!("MCP server ready, waiting for client connection...");

    // Run the server
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(server.run());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
