// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use ob_mysql_util::MySqlError;

use crate::version::InvalidVersionFormat;

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    /// A connection- or execution-level failure. Aborts the run
    /// immediately; no partial report is produced.
    #[error(transparent)]
    Sql(#[from] MySqlError),
    /// The cluster reported a version string the version oracle cannot
    /// parse. Also fatal: no meaningful check can run against it.
    #[error(transparent)]
    InvalidVersion(#[from] InvalidVersionFormat),
    /// An `alter system set` did not propagate to every node within the
    /// retry budget.
    #[error("check {name}:{value} sync timeout")]
    ParameterSyncTimeout { name: String, value: String },
    /// The aggregate verdict: one or more preconditions were violated.
    /// Raised exactly once, after every check has executed.
    #[error("upgrade checker failed with {} reasons: {}", .0.len(), format_failures(.0))]
    PreconditionsFailed(Vec<String>),
}

fn format_failures(failures: &[String]) -> String {
    failures
        .iter()
        .map(|f| format!("[{f}] "))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preconditions_failed_message_lists_every_reason() {
        let err = CheckerError::PreconditionsFailed(vec![
            "first reason".to_string(),
            "second reason".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "upgrade checker failed with 2 reasons: [first reason] , [second reason] "
        );
    }
}
