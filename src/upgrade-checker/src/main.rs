// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Pre-upgrade safety checker for distributed database clusters.

use std::fs::File;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ob_upgrade_checker::{do_check, CpuArchHint, RunModuleSet, UpgradeParams};

static ENV_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[clap(name = "ob-upgrade-checker", next_line_help = true, version)]
struct Args {
    /// Connect to host.
    #[clap(long)]
    host: String,
    /// Port number to use for connection.
    #[clap(short = 'P', long)]
    port: u16,
    /// User for login.
    #[clap(short = 'u', long)]
    user: String,
    /// Password to use when connecting to the server.
    #[clap(short = 'p', long, default_value = "")]
    password: String,
    /// Query/inspection execution timeout in seconds. Zero keeps the
    /// server default.
    #[clap(short = 't', long, default_value_t = 0)]
    timeout: u64,
    /// Modules to run: a comma-separated subset of ddl, normal_dml,
    /// each_tenant_dml, system_variable_dml, special_action, all.
    #[clap(short = 'm', long, default_value = "all")]
    module: RunModuleSet,
    /// Log file path.
    #[clap(short = 'l', long, default_value = "upgrade_checker.log")]
    log_file: PathBuf,
    /// Whether machines in the cluster support the AVX2 instruction set.
    #[clap(long = "cpu-arch", value_enum, default_value = "unknown")]
    cpu_arch: CpuArchHint,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Log to stdout for the operator and to the log file for the record.
    // The log file is truncated on every run.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(ENV_FILTER));
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    match File::create(&args.log_file) {
        Ok(file) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .try_init();
            error!("cannot open log file {}: {}", args.log_file.display(), e);
        }
    }

    // The password never reaches the log output.
    info!(
        "parameters from cmd: host=\"{}\", port={}, user=\"{}\", password=\"******\", \
         timeout={}, module=\"{}\", log-file=\"{}\", cpu-arch=\"{:?}\"",
        args.host,
        args.port,
        args.user,
        args.timeout,
        args.module,
        args.log_file.display(),
        args.cpu_arch,
    );

    if let Err(err) = run(args).await {
        error!("upgrade checker failed: {err}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let config = ob_mysql_util::Config::new(args.host, args.port, args.user, args.password)
        .database("oceanbase")
        .init_stmts(vec!["set autocommit=1".to_string()]);
    do_check(
        &config,
        &UpgradeParams::default(),
        args.timeout,
        args.cpu_arch,
    )
    .await?;
    info!("all upgrade preconditions passed, cluster is safe to upgrade");
    Ok(())
}
