// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Run-module selection, shared across the upgrade tool family.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A phase of the upgrade procedure an operator may select with `-m`.
///
/// The precondition checker itself always runs its full rule set; the
/// selection is validated here and forwarded to the phase drivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunModule {
    Ddl,
    NormalDml,
    EachTenantDml,
    SystemVariableDml,
    SpecialAction,
    All,
}

impl RunModule {
    pub fn name(self) -> &'static str {
        match self {
            RunModule::Ddl => "ddl",
            RunModule::NormalDml => "normal_dml",
            RunModule::EachTenantDml => "each_tenant_dml",
            RunModule::SystemVariableDml => "system_variable_dml",
            RunModule::SpecialAction => "special_action",
            RunModule::All => "all",
        }
    }
}

impl FromStr for RunModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ddl" => Ok(RunModule::Ddl),
            "normal_dml" => Ok(RunModule::NormalDml),
            "each_tenant_dml" => Ok(RunModule::EachTenantDml),
            "system_variable_dml" => Ok(RunModule::SystemVariableDml),
            "special_action" => Ok(RunModule::SpecialAction),
            "all" => Ok(RunModule::All),
            other => Err(format!("unknown module: {other}")),
        }
    }
}

/// A comma-separated set of [`RunModule`]s, e.g. `ddl,special_action`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunModuleSet(BTreeSet<RunModule>);

impl RunModuleSet {
    pub fn contains(&self, module: RunModule) -> bool {
        self.0.contains(&RunModule::All) || self.0.contains(&module)
    }
}

impl Default for RunModuleSet {
    fn default() -> Self {
        RunModuleSet(BTreeSet::from([RunModule::All]))
    }
}

impl FromStr for RunModuleSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let modules = s
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(RunModule::from_str)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if modules.is_empty() {
            return Err("no modules specified".to_string());
        }
        Ok(RunModuleSet(modules))
    }
}

impl fmt::Display for RunModuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, module) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ",")?;
            }
            f.write_str(module.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_sets() {
        let set: RunModuleSet = "ddl,special_action".parse().unwrap();
        assert!(set.contains(RunModule::Ddl));
        assert!(set.contains(RunModule::SpecialAction));
        assert!(!set.contains(RunModule::NormalDml));
        assert_eq!(set.to_string(), "ddl,special_action");
    }

    #[test]
    fn test_all_contains_everything() {
        let set: RunModuleSet = "all".parse().unwrap();
        assert!(set.contains(RunModule::Ddl));
        assert!(set.contains(RunModule::SystemVariableDml));
        assert_eq!(set, RunModuleSet::default());
    }

    #[test]
    fn test_parse_rejects_unknown_modules() {
        assert!("ddl,bogus".parse::<RunModuleSet>().is_err());
        assert!("".parse::<RunModuleSet>().is_err());
    }
}
