//! rolegate command-line interface
//!
//! A thin adapter over the decision point, for checking rule files and
//! asking authorization questions from scripts.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rolegate::{
    access_control::{DecisionPoint, Invocation, OperationQuery, Subject},
    config::{LogFormat, load_config, load_domain},
};
use serde_json::json;
use std::collections::BTreeMap;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// rolegate - resolve the roles required to invoke protected operations
#[derive(Parser, Debug)]
#[command(name = "rolegate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "ROLEGATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "ROLEGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format; overrides the config file
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the roles required for an operation
    Roles(OperationArgs),
    /// Check whether a caller may perform an operation (exit code 1 if denied)
    Check {
        #[command(flatten)]
        target: TargetArgs,

        /// Operation as `method` or `method(type,...)`; omit for a resource-level check
        #[arg(short, long)]
        operation: Option<String>,

        #[command(flatten)]
        call: CallArgs,

        #[command(flatten)]
        caller: CallerArgs,
    },
    /// Evaluate a JSON map of resource -> ["method(sig)", ...] and print JSON rows
    Batch {
        /// Domain to evaluate against
        #[arg(short, long)]
        domain: String,

        /// JSON input file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        #[command(flatten)]
        caller: CallerArgs,
    },
    /// Report rule keys that can never match (exit code 1 if any)
    Lint {
        /// Domain whose rule file to check
        #[arg(short, long)]
        domain: String,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Domain to evaluate against
    #[arg(short, long)]
    domain: String,

    /// Resource identifier, e.g. `org.example:type=bundle,name=root`
    #[arg(short, long)]
    resource: String,
}

#[derive(Args, Debug)]
struct OperationArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Operation as `method` or `method(type,...)`
    #[arg(short, long)]
    operation: String,

    #[command(flatten)]
    call: CallArgs,
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Actual argument value (repeat for each argument, in order)
    #[arg(long = "arg")]
    args: Vec<String>,

    /// The call has no arguments (distinguishes "none" from "unknown")
    #[arg(long, conflicts_with = "args")]
    no_args: bool,
}

impl CallArgs {
    fn apply(&self, invocation: Invocation) -> Invocation {
        if self.no_args || !self.args.is_empty() {
            invocation.with_args(&self.args)
        } else {
            invocation
        }
    }

    fn is_known(&self) -> bool {
        self.no_args || !self.args.is_empty()
    }
}

#[derive(Args, Debug)]
struct CallerArgs {
    /// Role held by the caller (repeat or comma-separate)
    #[arg(long = "role", value_delimiter = ',', env = "ROLEGATE_ROLES")]
    roles: Vec<String>,
}

impl CallerArgs {
    fn subject(&self) -> Subject {
        Subject::new(self.roles.iter().map(|r| r.trim()).filter(|r| !r.is_empty()))
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn parse_invocation(operation: &str, call: &CallArgs) -> rolegate::Result<Invocation> {
    let query = OperationQuery::parse(operation)?;
    Ok(call.apply(query.to_invocation()))
}

fn run_roles(dp: &DecisionPoint, args: &OperationArgs) -> anyhow::Result<ExitCode> {
    let invocation = parse_invocation(&args.operation, &args.call)?;
    let found = dp.required_roles(&args.target.resource, &invocation)?;

    let output = json!({
        "domain": dp.domain(),
        "resource": args.target.resource,
        "operation": invocation.to_string(),
        "roles": found.as_ref().map(|m| &m.roles),
        "precedence": found.as_ref().map(|m| m.precedence),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn run_check(
    dp: &DecisionPoint,
    target: &TargetArgs,
    operation: Option<&str>,
    call: &CallArgs,
    caller: &CallerArgs,
) -> anyhow::Result<ExitCode> {
    let subject = caller.subject();

    let allowed = match operation {
        None => dp.can_invoke_resource(&subject, &target.resource),
        Some(operation) => {
            let query = OperationQuery::parse(operation)?;
            if query.signature.is_none() && !call.is_known() {
                dp.can_invoke_method(&subject, &target.resource, &query.method)
            } else {
                dp.can_invoke(&subject, &target.resource, &call.apply(query.to_invocation()))
            }
        }
    };

    println!("{}", if allowed { "allowed" } else { "denied" });
    Ok(if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_batch(dp: &DecisionPoint, input: &str, caller: &CallerArgs) -> anyhow::Result<ExitCode> {
    let raw = if input == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    let queries: BTreeMap<String, Vec<String>> =
        serde_json::from_str(&raw).context("Batch input must be a JSON object of string arrays")?;

    let rows = dp.can_invoke_batch(&caller.subject(), &queries);
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(ExitCode::SUCCESS)
}

fn run_lint(dp: &DecisionPoint) -> anyhow::Result<ExitCode> {
    let snapshot = dp.snapshot();
    let mut count = 0;

    for (name, table) in snapshot.tables() {
        for issue in table.issues() {
            println!("{}: {}: {}", name, issue.key, issue.reason);
            count += 1;
        }
    }

    if count == 0 {
        info!(domain = dp.domain(), "No rule issues found");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config.as_deref())
        .inspect_err(|e| eprintln!("Failed to load configuration: {}", e))?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, cli.log_format.unwrap_or(config.logging.format));

    let domain = match &cli.command {
        Command::Roles(args) => &args.target.domain,
        Command::Check { target, .. } => &target.domain,
        Command::Batch { domain, .. } | Command::Lint { domain } => domain,
    };
    let dp = load_domain(&config, domain)
        .inspect_err(|e| error!(error = %e, domain = %domain, "Failed to load domain"))?;

    match &cli.command {
        Command::Roles(args) => run_roles(&dp, args),
        Command::Check {
            target,
            operation,
            call,
            caller,
        } => run_check(&dp, target, operation.as_deref(), call, caller),
        Command::Batch { input, caller, .. } => run_batch(&dp, input, caller),
        Command::Lint { .. } => run_lint(&dp),
    }
}
