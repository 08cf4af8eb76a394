// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Row, Value};
use tracing::{error, info};

use crate::MySqlError;

/// A single result cell, decoded from the textual MySQL protocol.
///
/// The system views queried by the tools in this workspace only ever
/// produce integers and strings; anything else is carried as its SQL
/// literal rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
}

impl SqlValue {
    /// Returns the cell as a signed integer, if it is one or parses as one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::UInt(u) => i64::try_from(*u).ok(),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::NULL => SqlValue::Null,
            Value::Int(i) => SqlValue::Int(*i),
            Value::UInt(u) => SqlValue::UInt(*u),
            Value::Float(f) => SqlValue::Double(f64::from(*f)),
            Value::Double(d) => SqlValue::Double(*d),
            Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(b).into_owned()),
            other => SqlValue::Text(other.as_sql(true)),
        }
    }
}

/// The result of a query: column names plus loosely-typed rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        QueryOutput { columns, rows }
    }

    /// The single row of the result, if the result has exactly one.
    pub fn single_row(&self) -> Option<&[SqlValue]> {
        match &*self.rows {
            [row] => Some(row),
            _ => None,
        }
    }

    /// The single cell of the result, if the result is exactly 1x1.
    pub fn single_cell(&self) -> Option<&SqlValue> {
        match self.single_row() {
            Some([cell]) => Some(cell),
            _ => None,
        }
    }

    /// The single cell of the result as an integer, if the result is
    /// exactly 1x1 and integral.
    pub fn single_i64(&self) -> Option<i64> {
        self.single_cell().and_then(SqlValue::as_i64)
    }

    /// The single cell of the result as a string, if the result is exactly
    /// 1x1 and textual.
    pub fn single_text(&self) -> Option<&str> {
        self.single_cell().and_then(SqlValue::as_str)
    }
}

/// Executes SQL against a live server.
///
/// This is the seam between the checking logic and the wire: production
/// code runs against [`ConnRunner`], tests script a fake.
///
/// Errors surfaced by either method are connection- or execution-level
/// failures, distinct from queries that merely return no rows.
#[async_trait]
pub trait QueryRunner: Send {
    /// Runs a query and collects its full result set.
    async fn exec_query(&mut self, sql: &str) -> Result<QueryOutput, MySqlError>;

    /// Runs a statement and returns the number of affected rows.
    async fn exec_stmt(&mut self, sql: &str) -> Result<u64, MySqlError>;
}

/// A [`QueryRunner`] backed by a live [`mysql_async::Conn`].
#[derive(Debug)]
pub struct ConnRunner {
    conn: Conn,
}

impl ConnRunner {
    pub fn new(conn: Conn) -> Self {
        ConnRunner { conn }
    }

    pub async fn disconnect(self) -> Result<(), MySqlError> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl QueryRunner for ConnRunner {
    async fn exec_query(&mut self, sql: &str) -> Result<QueryOutput, MySqlError> {
        let rows: Vec<Row> = match self.conn.query(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("fail to execute query: {}: {}", sql, e);
                return Err(e.into());
            }
        };
        info!("succeed to execute query: {}, rowcount = {}", sql, rows.len());
        let columns = rows
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|c| c.name_str().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.as_ref(i).map_or(SqlValue::Null, SqlValue::from))
                    .collect()
            })
            .collect();
        Ok(QueryOutput::new(columns, rows))
    }

    async fn exec_stmt(&mut self, sql: &str) -> Result<u64, MySqlError> {
        let result = match self.conn.query_iter(sql).await {
            Ok(result) => result,
            Err(e) => {
                error!("fail to execute sql: {}: {}", sql, e);
                return Err(e.into());
            }
        };
        let rowcount = result.affected_rows();
        drop(result);
        info!("succeed to execute sql: {}, rowcount = {}", sql, rowcount);
        Ok(rowcount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_decoding() {
        assert_eq!(SqlValue::from(&Value::Int(-3)).as_i64(), Some(-3));
        assert_eq!(SqlValue::from(&Value::UInt(7)).as_i64(), Some(7));
        assert_eq!(
            SqlValue::from(&Value::Bytes(b"42".to_vec())).as_i64(),
            Some(42)
        );
        assert_eq!(
            SqlValue::from(&Value::Bytes(b"active".to_vec())).as_str(),
            Some("active")
        );
        assert_eq!(SqlValue::from(&Value::NULL), SqlValue::Null);
    }

    #[test]
    fn test_query_output_shapes() {
        let out = QueryOutput::new(
            vec!["cnt".into()],
            vec![vec![SqlValue::Int(4)]],
        );
        assert_eq!(out.single_i64(), Some(4));

        let empty = QueryOutput::default();
        assert_eq!(empty.single_row(), None);
        assert_eq!(empty.single_i64(), None);

        let wide = QueryOutput::new(
            vec!["a".into(), "b".into()],
            vec![vec![SqlValue::Int(1), SqlValue::Int(2)]],
        );
        assert_eq!(wide.single_cell(), None);
        assert_eq!(wide.single_row().map(<[SqlValue]>::len), Some(2));

        let tall = QueryOutput::new(
            vec!["v".into()],
            vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
        );
        assert_eq!(tall.single_row(), None);
    }
}
