// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The upgrade precondition rule set.
//!
//! Every check has the same shape: run one or more read-only queries
//! against the cluster's system views, interpret a small fixed-shape
//! result, and record zero or more failures in the [`CheckReport`]. A
//! violated precondition never stops the run; only connection and
//! execution errors do. The report is inspected once, by the caller,
//! after every check has executed.

use ob_mysql_util::{MySqlError, QueryRunner, SqlValue};
use tracing::info;

use crate::cpu::CpuArchHint;
use crate::error::CheckerError;
use crate::report::CheckReport;
use crate::version::ClusterVersion;
use crate::UpgradeParams;

const MIN_OBSERVER_VERSION_SQL: &str =
    "select distinct value from GV$OB_PARAMETERS where name='min_observer_version'";
const TENANT_COMPATIBLE_SQL: &str =
    "select distinct value from oceanbase.__all_virtual_tenant_parameter_info where name='compatible'";

const V4_1_0_0: ClusterVersion = ClusterVersion::from_parts(4, 1, 0, 0);
const V4_2_2_0: ClusterVersion = ClusterVersion::from_parts(4, 2, 2, 0);
const V4_3_0_0: ClusterVersion = ClusterVersion::from_parts(4, 3, 0, 0);
const V4_3_1_0: ClusterVersion = ClusterVersion::from_parts(4, 3, 1, 0);
const V4_3_2_0: ClusterVersion = ClusterVersion::from_parts(4, 3, 2, 0);
const V4_3_3_0: ClusterVersion = ClusterVersion::from_parts(4, 3, 3, 0);
const V4_3_5_1: ClusterVersion = ClusterVersion::from_parts(4, 3, 5, 1);

/// Runs the full rule catalog in its fixed order.
///
/// The direct-load check must stay last: every check must have executed
/// before the caller inspects the report.
pub async fn run_all_checks(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
    upgrade_params: &UpgradeParams,
    cpu_arch: CpuArchHint,
) -> Result<(), CheckerError> {
    check_observer_version(runner, report, upgrade_params).await?;
    check_data_version(runner, report).await?;
    check_paxos_replica(runner, report).await?;
    check_rebalance_task(runner, report).await?;
    check_cluster_status(runner, report).await?;
    check_tenant_status(runner, report).await?;
    check_restore_job(runner, report).await?;
    check_tenant_primary_zone(runner, report).await?;
    check_ddl_task(runner, report).await?;
    check_backup_job(runner, report).await?;
    check_archive_job(runner, report).await?;
    check_archive_dest(runner, report).await?;
    check_backup_dest(runner, report).await?;
    check_observer_status(runner, report).await?;
    check_schema_status(runner, report).await?;
    check_server_version(runner, report).await?;
    check_reserved_tenant_name(runner, report).await?;
    check_tenant_clone_job(runner, report).await?;
    check_tenant_snapshot(runner, report).await?;
    check_log_transport_compress_func(runner, report).await?;
    check_table_compress_func(runner, report).await?;
    check_table_api_transport_compress_func(runner, report).await?;
    check_binlog_row_image(runner, report).await?;
    check_oracle_standby_replication(runner, report).await?;
    check_disk_space_for_storage_format(runner, report).await?;
    check_cs_encoding_compatibility(runner, report, cpu_arch).await?;
    // Keep this one last; nothing may run between it and the report.
    check_direct_load_job(runner, report).await?;
    Ok(())
}

/// Runs a count-style query whose result must be exactly one scalar.
async fn query_count(runner: &mut dyn QueryRunner, sql: &str) -> Result<i64, CheckerError> {
    let out = runner.exec_query(sql).await?;
    Ok(out
        .single_i64()
        .ok_or_else(|| MySqlError::unexpected_shape(sql))?)
}

fn cell_text<'a>(row: &'a [SqlValue], idx: usize, sql: &str) -> Result<&'a str, CheckerError> {
    Ok(row
        .get(idx)
        .and_then(SqlValue::as_str)
        .ok_or_else(|| MySqlError::unexpected_shape(sql))?)
}

fn cell_i64(row: &[SqlValue], idx: usize, sql: &str) -> Result<i64, CheckerError> {
    Ok(row
        .get(idx)
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| MySqlError::unexpected_shape(sql))?)
}

/// Fetches a cluster-wide distinct version value. A row count other than
/// one means the value has not converged across nodes yet; that is
/// recorded as a failure and `None` is returned so the caller can skip
/// its version-gated work. A value that does not parse as a version is
/// fatal.
async fn fetch_distinct_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
    sql: &str,
    not_sync_message: &str,
) -> Result<Option<ClusterVersion>, CheckerError> {
    let out = runner.exec_query(sql).await?;
    if out.rows.len() != 1 {
        report.fail(not_sync_message);
        return Ok(None);
    }
    if out.rows[0].len() != 1 {
        report.fail("column cnt not match");
        return Ok(None);
    }
    let value = cell_text(&out.rows[0], 0, sql)?;
    Ok(Some(value.parse()?))
}

async fn fetch_min_cluster_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<Option<ClusterVersion>, CheckerError> {
    fetch_distinct_version(
        runner,
        report,
        MIN_OBSERVER_VERSION_SQL,
        "min_observer_version is not sync",
    )
    .await
}

async fn fetch_data_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<Option<ClusterVersion>, CheckerError> {
    fetch_distinct_version(runner, report, TENANT_COMPATIBLE_SQL, "compatible is not sync").await
}

/// The cluster must already run at least the expected previous release.
async fn check_observer_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
    upgrade_params: &UpgradeParams,
) -> Result<(), CheckerError> {
    let out = runner.exec_query(MIN_OBSERVER_VERSION_SQL).await?;
    if out.rows.len() != 1 {
        report.fail("min_observer_version is not sync");
        return Ok(());
    }
    let actual = cell_text(&out.rows[0], 0, MIN_OBSERVER_VERSION_SQL)?;
    if actual.parse::<ClusterVersion>()? < upgrade_params.old_version {
        report.fail(format!(
            "old observer version is expected equal or higher than: {}, actual version:{}",
            upgrade_params.old_version, actual
        ));
    } else {
        info!("check observer version success, version = {actual}");
    }
    Ok(())
}

/// Every tenant's data version markers must agree with the converged
/// `compatible` value, and neither the cluster nor the data version may
/// predate the 4.1.0.0 upgrade barrier.
async fn check_data_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version < V4_1_0_0 {
        report.fail(
            "last barrier cluster version is 4.1.0.0. \
             prohibit cluster upgrade from cluster version less than 4.1.0.0",
        );
        return Ok(());
    }
    let Some(data_version) = fetch_data_version(runner, report).await? else {
        return Ok(());
    };
    if data_version < V4_1_0_0 {
        report.fail(
            "last barrier data version is 4.1.0.0. \
             prohibit cluster upgrade from data version less than 4.1.0.0",
        );
        return Ok(());
    }

    let sql = "select count(*) from oceanbase.__all_tenant";
    let Some(tenant_count) = runner.exec_query(sql).await?.single_i64() else {
        report.fail("result cnt not match");
        return Ok(());
    };

    // Both the target and the current data version marker must be present
    // for every tenant.
    let sql = format!(
        "select count(*) from __all_virtual_core_table \
         where column_name in ('target_data_version', 'current_data_version') \
         and column_value = {}",
        data_version.packed()
    );
    match runner.exec_query(&sql).await?.single_i64() {
        None => report.fail("result cnt not match"),
        Some(marker_count) if marker_count != 2 * tenant_count => report.fail(format!(
            "target_data_version/current_data_version not match with {data_version}, \
             tenant_cnt:{tenant_count}, result_cnt:{marker_count}"
        )),
        Some(_) => info!(
            "check data version success, all tenant's \
             compatible/target_data_version/current_data_version is {data_version}"
        ),
    }

    if data_version >= V4_3_5_1 {
        let sql = format!(
            "select count(*) from __all_virtual_core_table \
             where column_name in ('upgrade_begin_data_version') \
             and column_value = {}",
            data_version.packed()
        );
        match runner.exec_query(&sql).await?.single_i64() {
            None => report.fail("result cnt not match"),
            Some(marker_count) if marker_count != tenant_count => report.fail(format!(
                "upgrade_begin_data_version not match with {data_version}, \
                 tenant_cnt:{tenant_count}, result_cnt:{marker_count}"
            )),
            Some(_) => info!(
                "check data version success, all tenant's \
                 upgrade_begin_data_version is {data_version}"
            ),
        }
    }
    Ok(())
}

async fn check_paxos_replica(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let unsync = query_count(
        runner,
        "select count(1) as unsync_cnt from GV$OB_LOG_STAT where in_sync = 'NO'",
    )
    .await?;
    if unsync > 0 {
        report.fail(format!("{unsync} replicas unsync, please check"));
    } else {
        info!("check paxos replica success");
    }
    Ok(())
}

async fn check_rebalance_task(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let locality = query_count(
        runner,
        "select count(1) as cnt from DBA_OB_TENANT_JOBS \
         where job_status='INPROGRESS' and result_code is null",
    )
    .await?;
    if locality > 0 {
        report.fail(format!("{locality} locality tasks is doing, please check"));
    }
    let rebalance = query_count(
        runner,
        "select count(1) as rebalance_task_cnt from CDB_OB_LS_REPLICA_TASKS",
    )
    .await?;
    if rebalance > 0 {
        report.fail(format!("{rebalance} rebalance tasks is doing, please check"));
    }
    if locality == 0 && rebalance == 0 {
        info!("check rebalance task success");
    }
    Ok(())
}

/// No tenant may be mid-compaction, and no tablet may hold unflushed
/// compaction data beyond its received SCN.
async fn check_cluster_status(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let merging_tenants = query_count(
        runner,
        "select count(1) from CDB_OB_MAJOR_COMPACTION \
         where (GLOBAL_BROADCAST_SCN > LAST_SCN or STATUS != 'IDLE')",
    )
    .await?;
    if merging_tenants > 0 {
        report.fail(format!("{merging_tenants} tenant is merging, please check"));
    }
    let merging_tablets = query_count(
        runner,
        "select /*+ query_timeout(1000000000) */ count(1) \
         from __all_virtual_tablet_compaction_info \
         where max_received_scn > finished_scn and max_received_scn > 0",
    )
    .await?;
    if merging_tablets > 0 {
        report.fail(format!("{merging_tablets} tablet is merging, please check"));
    }
    Ok(())
}

/// Tenants must be NORMAL, PRIMARY or STANDBY, unlocked, and fully
/// garbage-collected when deleted.
async fn check_tenant_status(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let sql = "select count(*) as count from DBA_OB_TENANTS where status != 'NORMAL'";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("results len not match"),
        Some(0) => info!("check tenant status success"),
        Some(_) => report.fail("has abnormal tenant, should stop"),
    }

    // Restoring tenants cannot be upgraded.
    let sql = "select count(*) as count from oceanbase.__all_virtual_tenant_info \
               where tenant_role != 'PRIMARY' and tenant_role != 'STANDBY'";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("results len not match"),
        Some(0) => info!("check tenant info success"),
        Some(_) => report.fail("has abnormal tenant info, should stop"),
    }

    let sql = "select count(*) from DBA_OB_TENANTS where LOCKED = 'YES'";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("results len not match"),
        Some(0) => info!("check tenant lock status success"),
        Some(_) => report.fail("has locked tenant, should unlock"),
    }

    let sql = "select count(*) from oceanbase.gv$ob_units a, oceanbase.__all_tenant_history b \
               where b.is_deleted = 1 and a.tenant_id = b.tenant_id";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("results len not match"),
        Some(0) => info!("check deleted tenant unit gc success"),
        Some(_) => report.fail("has deleted tenant with unit not freed"),
    }
    Ok(())
}

async fn check_restore_job(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let sql = "select count(1) from CDB_OB_RESTORE_PROGRESS";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to restore job cnt"),
        Some(0) => info!("check restore job success"),
        Some(_) => report.fail("still has restore job, upgrade is not allowed temporarily"),
    }
    Ok(())
}

/// A primary zone spec is "distributed" when it names leaders in more
/// than one zone at the same priority, i.e. a comma appears before any
/// semicolon.
fn is_primary_zone_distributed(primary_zone: &str) -> bool {
    let semicolon = primary_zone.find(';').unwrap_or(primary_zone.len());
    let comma = primary_zone.find(',').unwrap_or(primary_zone.len());
    comma < semicolon
}

/// Before 4.1.0.0 every non-bootstrap tenant must have a single primary
/// zone.
async fn check_tenant_primary_zone(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_1_0_0 {
        return Ok(());
    }
    let sql = "select tenant_name,primary_zone from DBA_OB_TENANTS where tenant_id != 1";
    let out = runner.exec_query(sql).await?;
    for row in &out.rows {
        let tenant = cell_text(row, 0, sql)?;
        let primary_zone = cell_text(row, 1, sql)?;
        if primary_zone == "RANDOM" {
            report.fail(format!(
                "{tenant} tenant primary zone random before update not allowed"
            ));
        } else if is_primary_zone_distributed(primary_zone) {
            report.fail(format!(
                "{tenant} tenant primary zone distributed before update not allowed"
            ));
        }
    }
    info!("check tenant primary zone success");
    Ok(())
}

async fn check_ddl_task(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let in_progress =
        query_count(runner, "select count(1) from __all_virtual_ddl_task_status").await?;
    if in_progress != 0 {
        report.fail("There are DDL task in progress");
    } else {
        info!("check ddl task execute status success");
    }
    Ok(())
}

async fn check_backup_job(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    // Backup jobs cannot be in-progress during upgrade.
    let sql = "select count(1) from CDB_OB_BACKUP_JOBS";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to backup job cnt"),
        Some(0) => info!("check backup job success"),
        Some(_) => report.fail("still has backup job, upgrade is not allowed temporarily"),
    }
    Ok(())
}

/// Archive jobs cannot be in-progress before upgrade from 4.0.
async fn check_archive_job(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_1_0_0 {
        return Ok(());
    }
    let sql = "select count(1) from CDB_OB_ARCHIVELOG where status!='STOP'";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to archive job cnt"),
        Some(0) => info!("check archive job success"),
        Some(_) => report.fail("still has archive job, upgrade is not allowed temporarily"),
    }
    Ok(())
}

/// The archive destination must be cleared before upgrade from 4.0.
async fn check_archive_dest(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_1_0_0 {
        return Ok(());
    }
    let sql = "select count(1) from CDB_OB_ARCHIVE_DEST";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to archive dest cnt"),
        Some(0) => info!("check archive destination success"),
        Some(_) => report.fail("still has archive destination, upgrade is not allowed temporarily"),
    }
    Ok(())
}

/// The backup destination must be cleared before upgrade from 4.0.
async fn check_backup_dest(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_1_0_0 {
        return Ok(());
    }
    let sql = "select count(1) from CDB_OB_BACKUP_PARAMETER \
               where name='data_backup_dest' and (value!=NULL or value!='')";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to data backup dest cnt"),
        Some(0) => info!("check backup destination success"),
        Some(_) => report.fail("still has backup destination, upgrade is not allowed temporarily"),
    }
    Ok(())
}

async fn check_observer_status(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let unavailable = query_count(
        runner,
        "select count(*) from oceanbase.__all_server \
         where (start_service_time <= 0 or status != \"active\")",
    )
    .await?;
    if unavailable > 0 {
        report.fail(format!("{unavailable} observer not available, please check"));
    } else {
        info!("check observer status success");
    }
    Ok(())
}

/// Every server must have refreshed a full schema for every tenant.
async fn check_schema_status(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let passed = query_count(
        runner,
        "select if (a.cnt = b.cnt, 1, 0) as passed from \
         (select count(*) as cnt from oceanbase.__all_virtual_server_schema_info \
          where refreshed_schema_version > 1 and refreshed_schema_version % 8 = 0) as a \
         join (select count(*) as cnt from oceanbase.__all_server \
          join oceanbase.__all_tenant) as b",
    )
    .await?;
    if passed != 1 {
        report.fail(format!("{passed} schema not available, please check"));
    } else {
        info!("check schema status success");
    }
    Ok(())
}

/// All servers must run the same build.
async fn check_server_version(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let sql = "select distinct(substring_index(build_version, '_', 1)) from __all_server";
    let out = runner.exec_query(sql).await?;
    if out.rows.len() != 1 {
        report.fail("servers build_version not match");
    } else {
        info!("check server version success");
    }
    Ok(())
}

/// `all`, `all_user` and `all_meta` become reserved tenant names.
async fn check_reserved_tenant_name(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    const RESERVED: [&str; 3] = ["all", "all_user", "all_meta"];
    let sql = "select tenant_name from oceanbase.DBA_OB_TENANTS";
    let out = runner.exec_query(sql).await?;
    for row in &out.rows {
        let tenant = cell_text(row, 0, sql)?;
        if RESERVED.contains(&tenant.to_lowercase().as_str()) {
            report.fail(
                "a tenant named all/all_user/all_meta (case insensitive) cannot exist \
                 in the cluster, please rename the tenant",
            );
            break;
        }
    }
    info!("check special tenant name success");
    Ok(())
}

async fn check_tenant_clone_job(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version < V4_3_0_0 {
        return Ok(());
    }
    let sql = "select count(1) from __all_virtual_clone_job";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to tenant clone job cnt"),
        Some(0) => info!("check tenant clone job success"),
        Some(_) => report.fail("still has tenant clone job, upgrade is not allowed temporarily"),
    }
    Ok(())
}

async fn check_tenant_snapshot(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version < V4_3_0_0 {
        return Ok(());
    }
    let sql = "select count(1) from __all_virtual_tenant_snapshot where status!='NORMAL'";
    match runner.exec_query(sql).await?.single_i64() {
        None => report.fail("failed to tenant snapshot task"),
        Some(0) => info!("check tenant snapshot task success"),
        Some(_) => report.fail("still has tenant snapshot task, upgrade is not allowed temporarily"),
    }
    Ok(())
}

async fn check_log_transport_compress_func(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let zlib_tenants = query_count(
        runner,
        "select count(1) as cnt from oceanbase.__all_virtual_tenant_parameter_info \
         where (name like \"log_transport_compress_func\" and value like \"zlib_1.0\")",
    )
    .await?;
    if zlib_tenants > 0 {
        report.fail(
            "The zlib compression algorithm is no longer supported with \
             log_transport_compress_func, please replace it with other compression algorithms",
        );
    } else {
        info!("check log_transport_compress_func success");
    }
    Ok(())
}

async fn check_table_compress_func(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let zlib_tables = query_count(
        runner,
        "select /*+ query_timeout(1000000000) */ count(1) from __all_virtual_table \
         where (compress_func_name like '%zlib%')",
    )
    .await?;
    if zlib_tables > 0 {
        report.fail(
            "There are tables use zlib compression, please replace it with other \
             compression algorithms or do not use compression during the upgrade",
        );
    } else {
        info!("check table compression method success");
    }
    Ok(())
}

async fn check_table_api_transport_compress_func(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let zlib_connections = query_count(
        runner,
        "select count(1) as cnt from GV$OB_PARAMETERS \
         where (name like \"tableapi_transport_compress_func\" and value like \"zlib%\")",
    )
    .await?;
    if zlib_connections > 0 {
        report.fail(
            "Table api connection is not allowed to use zlib as compression algorithm \
             during the upgrade, please use other compression algorithms by setting \
             tableapi_transport_compress_func",
        );
    } else {
        info!("check tableapi_transport_compress_func success");
    }
    Ok(())
}

/// Before 4.3.0.0, CDC cannot consume the DELETE logs produced in MINIMAL
/// mode; the variable may only be turned on after the upgrade.
async fn check_binlog_row_image(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_3_0_0 {
        return Ok(());
    }
    let minimal = query_count(
        runner,
        "select count(*) from CDB_OB_SYS_VARIABLES \
         where NAME='binlog_row_image' and VALUE = '0'",
    )
    .await?;
    if minimal > 0 {
        report.fail("Sys Variable binlog_row_image is set to MINIMAL, please check");
    } else {
        info!("check variable binlog_row_image success");
    }
    Ok(())
}

/// Oracle-mode tenants must match the expected STANDBY_REPLICATION user
/// state for their version bracket: releases before 4.2.2.0, and the
/// [4.3.0.0, 4.3.1.0) window, predate the built-in user and must not have
/// it; everything else must.
async fn check_oracle_standby_replication(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    let sql = "select tenant_id from oceanbase.__all_tenant where compatibility_mode = 1";
    let out = runner.exec_query(sql).await?;
    if out.rows.is_empty() {
        info!("check oracle standby_replication privs success");
        return Ok(());
    }
    let predates_builtin_user = min_cluster_version < V4_2_2_0
        || (V4_3_0_0 <= min_cluster_version && min_cluster_version < V4_3_1_0);
    for row in &out.rows {
        let tenant_id = cell_i64(row, 0, sql)?;
        if predates_builtin_user {
            let exists = query_count(
                runner,
                &format!(
                    "select count(1)=1 from oceanbase.__all_virtual_user \
                     where user_name='STANDBY_REPLICATION' and tenant_id={tenant_id}"
                ),
            )
            .await?;
            if exists == 1 {
                report.fail(format!(
                    "{tenant_id} tenant standby_replication already exists, please check"
                ));
            }
        } else {
            let missing = query_count(
                runner,
                &format!(
                    "select count(1)=0 from oceanbase.__all_virtual_user \
                     where user_name='STANDBY_REPLICATION' and tenant_id={tenant_id}"
                ),
            )
            .await?;
            if missing == 1 {
                report.fail(format!(
                    "{tenant_id} tenant standby_replication not exist, please check"
                ));
            }
        }
    }
    Ok(())
}

/// Upgrading across 4.3.2 rewrites multi-source data into sstables; every
/// server needs `tablet_count * 4096 * 2` bytes of free disk for the
/// conversion.
async fn check_disk_space_for_storage_format(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_3_2_0 {
        info!("no need to check disk space, min observer version: {min_cluster_version}");
        return Ok(());
    }
    info!("need check disk space, min observer version: {min_cluster_version}");

    let sql = "select svr_ip, svr_port from __all_server";
    let servers = runner.exec_query(sql).await?;
    let mut success = true;
    for row in &servers.rows {
        let svr_ip = cell_text(row, 0, sql)?.to_string();
        let svr_port = cell_i64(row, 1, sql)?;
        let tablet_count = query_count(
            runner,
            &format!(
                "select /*+ query_timeout(1000000000) */ count(*) \
                 from __all_virtual_tablet_pointer_status \
                 where svr_ip = '{svr_ip}' and svr_port = {svr_port}"
            ),
        )
        .await?;
        let free_size = query_count(
            runner,
            &format!(
                "select free_size from __all_virtual_disk_stat \
                 where svr_ip = '{svr_ip}' and svr_port = {svr_port}"
            ),
        )
        .await?;
        let needed_size = tablet_count * 4096 * 2;
        if needed_size > free_size {
            report.fail(format!(
                "svr_ip: {svr_ip}, svr_port: {svr_port}, disk_free_size {free_size} is not \
                 enough for storage format conversion, needed_size is {needed_size}, \
                 cannot upgrade"
            ));
            success = false;
        } else {
            info!(
                "svr_ip: {svr_ip}, svr_port: {svr_port}, disk_free_size: {free_size}, \
                 needed_size: {needed_size}, can upgrade"
            );
        }
    }
    if success {
        info!("check disk space for storage format conversion success");
    }
    Ok(())
}

/// Clusters on CPUs without AVX2 cannot read the vectorized columnar
/// encoding before 4.3.3; the schema must not contain it when such a
/// cluster upgrades from a 4.3.x data version.
///
/// DDL changing row formats on a mixed cluster while this check runs
/// cannot be fully defended against here.
async fn check_cs_encoding_compatibility(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
    cpu_arch: CpuArchHint,
) -> Result<(), CheckerError> {
    let supports_avx2 = cpu_arch.supports_avx2();
    let Some(min_cluster_version) = fetch_min_cluster_version(runner, report).await? else {
        return Ok(());
    };
    if min_cluster_version >= V4_3_3_0 {
        info!("no need to check cs encoding arch compatibility for cluster version 4.3.3 and above");
        return Ok(());
    }
    if supports_avx2 {
        info!("current cpu supports avx2, no need to check cs_encoding format");
        return Ok(());
    }
    let Some(data_version) = fetch_data_version(runner, report).await? else {
        return Ok(());
    };
    if data_version < V4_3_0_0 {
        info!("no need to check cs encoding arch compatibility for data version before 4.3.0");
        return Ok(());
    }
    info!("cpu does not support avx2 instruction set, check cs_encoding format in schema");

    let sql = "select count(1) from __all_virtual_table \
               where row_store_type = 'cs_encoding_row_store'";
    let out = runner.exec_query(sql).await?;
    let mut can_upgrade = true;
    if out.rows.len() != 1 {
        report.fail("all table query row count not match");
    } else if out.rows[0].len() != 1 {
        report.fail("all table query column count not match");
    } else {
        let table_count = cell_i64(&out.rows[0], 0, sql)?;
        if table_count != 0 {
            can_upgrade = false;
            report.fail(format!(
                "exist table with row_format cs_encoding_row_store for observer not support \
                 avx2 instruction set, table count = {table_count}"
            ));
        }
    }

    if can_upgrade {
        let sql = "select count(distinct table_id) from __all_virtual_column_group \
                   where row_store_type = 3";
        let out = runner.exec_query(sql).await?;
        if out.rows.len() != 1 {
            report.fail("all column group query row count not match");
        } else if out.rows[0].len() != 1 {
            report.fail("all column group query column count not match");
        } else {
            let table_count = cell_i64(&out.rows[0], 0, sql)?;
            if table_count != 0 {
                can_upgrade = false;
                report.fail(format!(
                    "exist column group with row_format cs_encoding_row_store for observer not \
                     support avx2 instruction set, table count = {table_count}"
                ));
            }
        }
    }

    if can_upgrade {
        info!("check upgrade for arch-dependent cs_encoding format success");
    } else {
        info!("check upgrade for arch-dependent cs_encoding format failed");
    }
    Ok(())
}

/// No bulk loads may be in flight when the upgrade starts.
async fn check_direct_load_job(
    runner: &mut dyn QueryRunner,
    report: &mut CheckReport,
) -> Result<(), CheckerError> {
    let in_progress =
        query_count(runner, "select count(1) from __all_virtual_load_data_stat").await?;
    if in_progress != 0 {
        report.fail("There are direct load task in progress");
    } else {
        info!("check direct load task execute status success");
    }
    Ok(())
}
