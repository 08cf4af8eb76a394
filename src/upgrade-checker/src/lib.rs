// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Pre-upgrade safety checker for distributed database clusters.
//!
//! Decides whether a cluster may be upgraded by running an ordered
//! catalog of read-only checks against its system views, accumulating
//! every violated precondition, and raising one aggregate error listing
//! all of them. A clean cluster additionally gets its permanent-offline
//! window widened so servers restarting during the upgrade keep their
//! replicas.

use ob_mysql_util::{ConnRunner, QueryRunner};
use tracing::{info, warn};

pub mod checks;
pub mod cpu;
pub mod error;
pub mod modules;
pub mod params;
pub mod report;
pub mod version;

#[cfg(test)]
mod testutil;

pub use cpu::CpuArchHint;
pub use error::CheckerError;
pub use modules::{RunModule, RunModuleSet};
pub use report::CheckReport;
pub use version::{ClusterVersion, InvalidVersionFormat};

/// Fixed parameters of an upgrade attempt.
#[derive(Debug, Clone)]
pub struct UpgradeParams {
    /// The release the cluster is expected to be running before this
    /// upgrade.
    pub old_version: ClusterVersion,
}

impl Default for UpgradeParams {
    fn default() -> Self {
        UpgradeParams {
            old_version: ClusterVersion::from_parts(4, 2, 5, 1),
        }
    }
}

/// Runs the full precondition check against an established connection.
///
/// Violated preconditions surface as one aggregate
/// [`CheckerError::PreconditionsFailed`] after every check has run;
/// query and connection errors abort immediately. The offline-window
/// adjustment only happens when every check passed.
pub async fn run_upgrade_check(
    runner: &mut dyn QueryRunner,
    upgrade_params: &UpgradeParams,
    timeout_secs: u64,
    cpu_arch: CpuArchHint,
) -> Result<(), CheckerError> {
    params::set_query_timeout(runner, timeout_secs).await?;
    let mut report = CheckReport::new();
    checks::run_all_checks(runner, &mut report, upgrade_params, cpu_arch).await?;
    report.into_result()?;
    params::modify_server_permanent_offline_time(runner).await?;
    Ok(())
}

/// Connects to the cluster and runs the check end to end.
pub async fn do_check(
    config: &ob_mysql_util::Config,
    upgrade_params: &UpgradeParams,
    timeout_secs: u64,
    cpu_arch: CpuArchHint,
) -> Result<(), CheckerError> {
    info!(
        "connecting to {}:{} as {}",
        config.host(),
        config.port(),
        config.user()
    );
    let conn = config.connect().await?;
    let mut runner = ConnRunner::new(conn);
    let result = run_upgrade_check(&mut runner, upgrade_params, timeout_secs, cpu_arch).await;
    if let Err(e) = runner.disconnect().await {
        warn!("error closing connection: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{clean_cluster, count};

    #[tokio::test]
    async fn test_clean_run_performs_exactly_one_mutation() {
        let mut runner = clean_cluster();
        run_upgrade_check(
            &mut runner,
            &UpgradeParams::default(),
            30,
            CpuArchHint::Avx2,
        )
        .await
        .unwrap();
        assert_eq!(
            runner.stmts(),
            &[
                "set @@session.ob_query_timeout = 30000000".to_string(),
                "alter system set server_permanent_offline_time = '72h'".to_string(),
            ]
        );
        assert!(runner.executed("__all_virtual_sys_parameter_stat"));
    }

    #[tokio::test]
    async fn test_violations_raise_one_aggregate_error_and_no_mutation() {
        let mut runner = clean_cluster()
            .on("start_service_time", count(1))
            .on("__all_virtual_load_data_stat", count(3));
        let err = run_upgrade_check(
            &mut runner,
            &UpgradeParams::default(),
            0,
            CpuArchHint::Avx2,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "upgrade checker failed with 2 reasons: \
             [1 observer not available, please check] , \
             [There are direct load task in progress] "
        );
        assert!(runner.stmts().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_skips_aggregation_and_mutation() {
        let mut runner = clean_cluster().fail_on("CDB_OB_RESTORE_PROGRESS");
        let err = run_upgrade_check(
            &mut runner,
            &UpgradeParams::default(),
            0,
            CpuArchHint::Avx2,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckerError::Sql(_)));
        assert!(runner.stmts().is_empty());
        assert!(!runner.executed("__all_virtual_load_data_stat"));
    }
}
