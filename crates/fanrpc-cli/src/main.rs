// Copyright 2025 fanrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # fanrpc CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run a dispatcher with two executors
//! fanrpc serve -b 0.0.0.0:8000 -e 10.0.0.1:9001 -e 10.0.0.2:9001
//!
//! # Same, with executors from the environment
//! EXECUTORS=10.0.0.1:9001,10.0.0.2:9001 fanrpc serve
//!
//! # Submit a batch file (or `-` for stdin) and print the answered batch
//! fanrpc submit http://127.0.0.1:8000 batch.json
//!
//! # Register an executor at runtime
//! fanrpc register http://127.0.0.1:8000 10.0.0.3:9001 --token s3cret
//!
//! # Print the status report
//! fanrpc status http://127.0.0.1:8000
//! ```

use anyhow::Result;
use argh::FromArgs;
use fanrpc_common::auth::AdmissionToken;
use fanrpc_common::ExecutorAddr;
use fanrpc_dispatcher::{
    BlockPolicy, Dispatcher, DispatcherConfig, DuplicateIdPolicy, HttpExecutorTransport,
    HttpServer, RetryConfig, SelectionConfig,
};
use std::net::SocketAddr;
use std::time::Duration;

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// fanrpc - batch RPC dispatcher
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Submit(SubmitArgs),
    Register(RegisterArgs),
    Status(StatusArgs),
}

/// Arguments for running a dispatcher.
///
/// Every bound (attempts, call timeout, batch deadline) is off unless given,
/// so by default a request is retried until it succeeds.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run a dispatcher
struct ServeArgs {
    /// address to bind the dispatcher's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:8000\".into()")]
    bind: String,

    /// initial executor as host:port, repeatable
    ///
    /// Falls back to the comma-separated EXECUTORS environment variable.
    /// Initial executors are not health-probed.
    #[argh(option, short = 'e', long = "executor")]
    executors: Vec<String>,

    /// admission token executors must present to register
    ///
    /// Falls back to FANRPC_TOKEN; if neither is set a random token is
    /// generated and logged.
    #[argh(option, long = "token")]
    token: Option<String>,

    /// minimum idle time before an executor is reused, in milliseconds
    #[argh(option, long = "cooldown-ms", default = "1000")]
    cooldown_ms: u64,

    /// latency samples collapsed into one average
    #[argh(option, long = "stats-window", default = "10")]
    stats_window: usize,

    /// error count at which an executor is considered broken
    #[argh(option, long = "error-threshold", default = "100")]
    error_threshold: u32,

    /// block executors that reach the error threshold
    #[argh(switch, long = "auto-block")]
    auto_block: bool,

    /// maximum remote calls per request
    #[argh(option, long = "max-attempts")]
    max_attempts: Option<u32>,

    /// timeout for a single remote call, in milliseconds
    #[argh(option, long = "call-timeout-ms")]
    call_timeout_ms: Option<u64>,

    /// upper bound on a whole batch, in milliseconds
    #[argh(option, long = "batch-deadline-ms")]
    batch_deadline_ms: Option<u64>,

    /// reject batches that repeat a request id
    #[argh(switch, long = "reject-duplicate-ids")]
    reject_duplicate_ids: bool,

    /// timeout for the admission health probe, in milliseconds
    #[argh(option, long = "probe-timeout-ms", default = "5000")]
    probe_timeout_ms: u64,
}

impl ServeArgs {
    fn config(&self) -> DispatcherConfig {
        DispatcherConfig {
            selection: SelectionConfig {
                cooldown: Duration::from_millis(self.cooldown_ms),
            },
            retry: RetryConfig {
                max_attempts: self.max_attempts,
                call_timeout: self.call_timeout_ms.map(Duration::from_millis),
                batch_deadline: self.batch_deadline_ms.map(Duration::from_millis),
                ..Default::default()
            },
            block: BlockPolicy {
                error_threshold: self.error_threshold,
                auto_block: self.auto_block,
            },
            duplicate_ids: if self.reject_duplicate_ids {
                DuplicateIdPolicy::Reject
            } else {
                DuplicateIdPolicy::LastWriteWins
            },
            stats_window: self.stats_window,
        }
    }
}

/// Submits a batch. Prints the answered batch as raw JSON on stdout.
#[derive(FromArgs)]
#[argh(subcommand, name = "submit")]
/// submit a batch of requests to a dispatcher
struct SubmitArgs {
    /// address of the dispatcher
    #[argh(positional)]
    dispatcher: String,

    /// path to a JSON batch file, or - for stdin
    #[argh(positional, default = "\"-\".into()")]
    batch: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "register")]
/// ask a dispatcher to admit an executor
struct RegisterArgs {
    /// address of the dispatcher
    #[argh(positional)]
    dispatcher: String,

    /// executor address as host:port
    #[argh(positional)]
    executor: String,

    /// admission token, falls back to FANRPC_TOKEN
    #[argh(option, short = 't', long = "token")]
    token: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "status")]
/// print a dispatcher's status report
struct StatusArgs {
    /// address of the dispatcher
    #[argh(positional)]
    dispatcher: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // submit and status print JSON on stdout, so they stay quiet
    if matches!(cli.command, Commands::Serve(_) | Commands::Register(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Submit(args) => run_submit(args).await,
        Commands::Register(args) => run_register(args).await,
        Commands::Status(args) => run_status(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    let env_executors = std::env::var(fanrpc_cli::EXECUTORS_ENV).ok();
    let executors = fanrpc_cli::resolve_executors(&args.executors, env_executors.as_deref())?;
    if executors.is_empty() {
        tracing::warn!("No executors configured; waiting for registrations");
    }

    let token = match args
        .token
        .clone()
        .or_else(|| std::env::var(fanrpc_cli::TOKEN_ENV).ok())
    {
        Some(token) => AdmissionToken::new(token),
        None => {
            let token = AdmissionToken::generate();
            tracing::info!("Generated admission token: {}", token.expose());
            token
        }
    };

    let transport = HttpExecutorTransport::with_probe_timeout(Duration::from_millis(args.probe_timeout_ms));
    let dispatcher = Dispatcher::new(transport, args.config(), executors);

    HttpServer::new(dispatcher, token).run(addr).await?;
    Ok(())
}

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let batch = fanrpc_cli::read_batch(&args.batch)?;
    let client = fanrpc_client::DispatcherClient::new(&args.dispatcher)?;
    let answered = client.submit(&batch).await?;

    println!("{}", serde_json::to_string(&answered)?);
    Ok(())
}

async fn run_register(args: RegisterArgs) -> Result<()> {
    let executor: ExecutorAddr = args.executor.parse()?;
    let token = args
        .token
        .or_else(|| std::env::var(fanrpc_cli::TOKEN_ENV).ok())
        .ok_or_else(|| anyhow::anyhow!("No token given; use --token or {}", fanrpc_cli::TOKEN_ENV))?;

    let client = fanrpc_client::DispatcherClient::new(&args.dispatcher)?;
    client.register(&token, &executor).await?;

    tracing::info!("Executor {} registered with {}", executor, client.base_url());
    Ok(())
}

async fn run_status(args: StatusArgs) -> Result<()> {
    let client = fanrpc_client::DispatcherClient::new(&args.dispatcher)?;
    let status = client.status().await?;

    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}
