// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! System parameter plumbing: session timeouts and cluster-wide
//! `alter system set` with bounded convergence waits.

use std::time::Duration;

use ob_mysql_util::{MySqlError, QueryRunner};
use tracing::info;

use crate::error::CheckerError;

/// How many times to poll for a parameter change to reach every node.
const PARAMETER_SYNC_ATTEMPTS: u32 = 10;
/// Fixed interval between polls.
const PARAMETER_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Sets the per-session query timeout, in seconds. A zero timeout leaves
/// the server default in place.
pub async fn set_query_timeout(
    runner: &mut dyn QueryRunner,
    timeout_secs: u64,
) -> Result<(), CheckerError> {
    if timeout_secs != 0 {
        let sql = format!(
            "set @@session.ob_query_timeout = {}",
            timeout_secs * 1_000_000
        );
        runner.exec_stmt(&sql).await?;
    }
    Ok(())
}

/// Sets a cluster parameter and waits for it to propagate to every node.
pub async fn set_parameter(
    runner: &mut dyn QueryRunner,
    parameter: &str,
    value: &str,
) -> Result<(), CheckerError> {
    let sql = format!("alter system set {parameter} = '{value}'");
    info!("{sql}");
    runner.exec_stmt(&sql).await?;
    wait_parameter_sync(runner, parameter, value).await
}

/// Polls the parameter stat view until no node reports a stale value.
///
/// The wait is bounded: after [`PARAMETER_SYNC_ATTEMPTS`] polls at a fixed
/// [`PARAMETER_SYNC_INTERVAL`] the run fails fatally rather than hanging.
async fn wait_parameter_sync(
    runner: &mut dyn QueryRunner,
    key: &str,
    value: &str,
) -> Result<(), CheckerError> {
    let sql = format!(
        "select count(*) as cnt from oceanbase.__all_virtual_sys_parameter_stat \
         where name = '{key}' and value != '{value}'"
    );
    let mut attempts_left = PARAMETER_SYNC_ATTEMPTS;
    loop {
        let out = runner.exec_query(&sql).await?;
        let stale = out
            .single_i64()
            .ok_or_else(|| MySqlError::unexpected_shape(&sql))?;
        if stale == 0 {
            info!("{key} is sync, value is {value}");
            return Ok(());
        }
        info!("{key} is not sync, value should be {value}");
        attempts_left -= 1;
        if attempts_left == 0 {
            return Err(CheckerError::ParameterSyncTimeout {
                name: key.to_string(),
                value: value.to_string(),
            });
        }
        tokio::time::sleep(PARAMETER_SYNC_INTERVAL).await;
    }
}

/// Widens the permanent-offline window so that servers restarting during
/// the upgrade are not prematurely treated as gone and their replicas
/// rebuilt elsewhere.
pub async fn modify_server_permanent_offline_time(
    runner: &mut dyn QueryRunner,
) -> Result<(), CheckerError> {
    set_parameter(runner, "server_permanent_offline_time", "72h").await
}

#[cfg(test)]
mod tests {
    use ob_mysql_util::QueryOutput;

    use super::*;
    use crate::testutil::{count, MockRunner};

    #[tokio::test(start_paused = true)]
    async fn test_wait_parameter_sync_converges() {
        let mut runner = MockRunner::new()
            .on_seq(
                "__all_virtual_sys_parameter_stat",
                vec![count(3), count(1), count(0)],
            );
        set_parameter(&mut runner, "server_permanent_offline_time", "72h")
            .await
            .unwrap();
        assert_eq!(
            runner.stmts(),
            &["alter system set server_permanent_offline_time = '72h'".to_string()]
        );
        // Two stale polls, then convergence.
        assert_eq!(runner.queries().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_parameter_sync_times_out() {
        let mut runner = MockRunner::new().on("__all_virtual_sys_parameter_stat", count(1));
        let err = set_parameter(&mut runner, "server_permanent_offline_time", "72h")
            .await
            .unwrap_err();
        match err {
            CheckerError::ParameterSyncTimeout { name, value } => {
                assert_eq!(name, "server_permanent_offline_time");
                assert_eq!(value, "72h");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.queries().len(), PARAMETER_SYNC_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_wait_parameter_sync_rejects_malformed_result() {
        let mut runner =
            MockRunner::new().on("__all_virtual_sys_parameter_stat", QueryOutput::default());
        let err = set_parameter(&mut runner, "server_permanent_offline_time", "72h")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckerError::Sql(MySqlError::UnexpectedResultShape { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_timeout_is_session_scoped_microseconds() {
        let mut runner = MockRunner::new();
        set_query_timeout(&mut runner, 30).await.unwrap();
        assert_eq!(
            runner.stmts(),
            &["set @@session.ob_query_timeout = 30000000".to_string()]
        );

        let mut runner = MockRunner::new();
        set_query_timeout(&mut runner, 0).await.unwrap();
        assert!(runner.stmts().is_empty());
    }
}
