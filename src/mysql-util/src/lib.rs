// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! MySQL utility library.

mod config;
pub use config::{Config, DEFAULT_TCP_KEEPALIVE};

mod query;
pub use query::{ConnRunner, QueryOutput, QueryRunner, SqlValue};

#[derive(Debug, thiserror::Error)]
pub enum MySqlError {
    #[error("error creating mysql connection with config: {0}")]
    InvalidClientConfig(String),
    /// A query returned a result whose shape the caller cannot reconcile,
    /// e.g. zero rows where exactly one scalar is mandatory.
    #[error("unexpected result shape for query: {sql}")]
    UnexpectedResultShape { sql: String },
    /// A mysql_async error.
    #[error(transparent)]
    MySql(#[from] mysql_async::Error),
}

impl MySqlError {
    /// Shorthand for [`MySqlError::UnexpectedResultShape`].
    pub fn unexpected_shape(sql: &str) -> Self {
        MySqlError::UnexpectedResultShape {
            sql: sql.to_string(),
        }
    }
}
