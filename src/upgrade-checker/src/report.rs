// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The failure report accumulated across a checker run.

use crate::error::CheckerError;

/// An append-only list of violated preconditions.
///
/// One report is created per run and threaded through every check; it is
/// never read back until [`CheckReport::into_result`] at the very end, so
/// an early violation cannot influence later checks.
#[derive(Debug, Default)]
pub struct CheckReport {
    failures: Vec<String>,
}

impl CheckReport {
    pub fn new() -> Self {
        CheckReport::default()
    }

    /// Records a violated precondition.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// The aggregate verdict: `Ok` if no check failed, otherwise a single
    /// error carrying every recorded failure in append order.
    pub fn into_result(self) -> Result<(), CheckerError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(CheckerError::PreconditionsFailed(self.failures))
        }
    }
}
