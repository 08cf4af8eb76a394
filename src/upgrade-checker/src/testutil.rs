// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A scripted [`QueryRunner`] for exercising checks without a live
//! cluster.

use std::collections::VecDeque;

use async_trait::async_trait;
use ob_mysql_util::{MySqlError, QueryOutput, QueryRunner, SqlValue};

/// A 1x1 result holding a count.
pub(crate) fn count(n: i64) -> QueryOutput {
    QueryOutput::new(vec!["count".into()], vec![vec![SqlValue::Int(n)]])
}

/// A single-column result with one textual row per value.
pub(crate) fn text_rows(values: &[&str]) -> QueryOutput {
    QueryOutput::new(
        vec!["value".into()],
        values
            .iter()
            .map(|v| vec![SqlValue::Text((*v).to_string())])
            .collect(),
    )
}

/// A result with the given rows and anonymous columns.
pub(crate) fn rows(rows: Vec<Vec<SqlValue>>) -> QueryOutput {
    let width = rows.first().map_or(0, Vec::len);
    QueryOutput::new(vec![String::new(); width], rows)
}

/// A runner scripted as a healthy two-tenant cluster on 4.3.5.2: versions
/// converged, markers in place, no jobs of any kind in flight, and the
/// post-check parameter change already synced.
pub(crate) fn clean_cluster() -> MockRunner {
    MockRunner::new()
        .on("name='min_observer_version'", text_rows(&["4.3.5.2"]))
        .on("name='compatible'", text_rows(&["4.3.5.2"]))
        .on("count(*) from oceanbase.__all_tenant", count(2))
        .on("'target_data_version', 'current_data_version'", count(4))
        .on("'upgrade_begin_data_version'", count(2))
        .on("substring_index(build_version", text_rows(&["4.3.5.2_20250807"]))
        .on("__all_virtual_server_schema_info", count(1))
        .on(
            "select tenant_name from oceanbase.DBA_OB_TENANTS",
            text_rows(&["sys", "tenant_blue"]),
        )
        .on("compatibility_mode = 1", rows(vec![]))
        .on("__all_virtual_sys_parameter_stat", count(0))
}

struct Script {
    pattern: &'static str,
    responses: VecDeque<QueryOutput>,
}

/// Maps SQL substrings to canned responses and records everything that was
/// executed, so tests can assert both outcomes and call counts.
///
/// Queries matching no script return a 1x1 count of zero, which is what a
/// quiescent cluster answers to most of the checker's probes.
pub(crate) struct MockRunner {
    scripts: Vec<Script>,
    fail_on: Option<&'static str>,
    queries: Vec<String>,
    stmts: Vec<String>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner {
            scripts: Vec::new(),
            fail_on: None,
            queries: Vec::new(),
            stmts: Vec::new(),
        }
    }

    /// Answers every query containing `pattern` with `response`.
    pub fn on(self, pattern: &'static str, response: QueryOutput) -> Self {
        self.on_seq(pattern, vec![response])
    }

    /// Answers successive queries containing `pattern` with successive
    /// responses; the last response repeats once the rest are exhausted.
    pub fn on_seq(mut self, pattern: &'static str, responses: Vec<QueryOutput>) -> Self {
        self.scripts.push(Script {
            pattern,
            responses: responses.into(),
        });
        self
    }

    /// Fails any query containing `pattern` with an execution error.
    pub fn fail_on(mut self, pattern: &'static str) -> Self {
        self.fail_on = Some(pattern);
        self
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn stmts(&self) -> &[String] {
        &self.stmts
    }

    pub fn executed(&self, pattern: &str) -> bool {
        self.queries.iter().any(|sql| sql.contains(pattern))
    }
}

#[async_trait]
impl QueryRunner for MockRunner {
    async fn exec_query(&mut self, sql: &str) -> Result<QueryOutput, MySqlError> {
        self.queries.push(sql.to_string());
        if let Some(pattern) = self.fail_on {
            if sql.contains(pattern) {
                return Err(MySqlError::InvalidClientConfig(format!(
                    "injected failure for {pattern}"
                )));
            }
        }
        // The most recently added matching script wins, so tests can
        // override individual fixture answers.
        for script in self.scripts.iter_mut().rev() {
            if sql.contains(script.pattern) {
                let response = if script.responses.len() > 1 {
                    script.responses.pop_front()
                } else {
                    script.responses.front().cloned()
                };
                return Ok(response.unwrap_or_default());
            }
        }
        Ok(count(0))
    }

    async fn exec_stmt(&mut self, sql: &str) -> Result<u64, MySqlError> {
        self.stmts.push(sql.to_string());
        if let Some(pattern) = self.fail_on {
            if sql.contains(pattern) {
                return Err(MySqlError::InvalidClientConfig(format!(
                    "injected failure for {pattern}"
                )));
            }
        }
        Ok(0)
    }
}
