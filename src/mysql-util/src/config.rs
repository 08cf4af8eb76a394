// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use mysql_async::{Conn, OptsBuilder};

use crate::MySqlError;

pub const DEFAULT_TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// Configuration for MySQL connections.
///
/// This wraps [`mysql_async::OptsBuilder`] with the handful of knobs the
/// tools in this workspace actually use: a direct TCP connection to a
/// single host, authenticated with a username and password.
#[derive(Clone, Debug)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: Option<String>,
    init_stmts: Vec<String>,
    tcp_keepalive: Option<Duration>,
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Config {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: None,
            init_stmts: Vec::new(),
            tcp_keepalive: Some(DEFAULT_TCP_KEEPALIVE),
        }
    }

    /// Sets the default database for the connection.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Statements to run when the connection is established, e.g. session
    /// variable assignments.
    pub fn init_stmts(mut self, stmts: Vec<String>) -> Self {
        self.init_stmts = stmts;
        self
    }

    /// Overrides the TCP keepalive interval. `None` disables keepalives.
    pub fn tcp_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn opts(&self) -> Result<OptsBuilder, MySqlError> {
        let mut opts = OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .db_name(self.database.clone())
            .init(self.init_stmts.clone());
        if let Some(keepalive) = self.tcp_keepalive {
            opts = opts.tcp_keepalive(Some(u32::try_from(keepalive.as_millis()).map_err(
                |e| MySqlError::InvalidClientConfig(format!("invalid tcp_keepalive duration: {}", e)),
            )?));
        }
        Ok(opts)
    }

    /// Establishes a connection to the configured server.
    pub async fn connect(&self) -> Result<Conn, MySqlError> {
        let conn = Conn::new(self.opts()?).await?;
        Ok(conn)
    }
}
