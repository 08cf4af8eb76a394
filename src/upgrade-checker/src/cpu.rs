// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! CPU architecture hints for the storage-format compatibility check.

use clap::ValueEnum;

/// Whether the machines in the cluster support the AVX2 instruction set.
///
/// Supplied by the operator; `unknown` probes the local machine instead,
/// which is only sound when the checker runs on hardware matching the
/// cluster's.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CpuArchHint {
    #[default]
    #[value(name = "unknown")]
    Unknown,
    #[value(name = "avx2")]
    Avx2,
    #[value(name = "avx2_not_support")]
    Avx2NotSupport,
}

impl CpuArchHint {
    /// Resolves the hint to a concrete answer, probing the local CPU when
    /// the operator did not say.
    pub fn supports_avx2(self) -> bool {
        match self {
            CpuArchHint::Unknown => arch_supports_avx2(),
            CpuArchHint::Avx2 => true,
            CpuArchHint::Avx2NotSupport => false,
        }
    }
}

/// Probes the local CPU for AVX2 support. Non-x86 architectures do not
/// have the instruction set at all.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn arch_supports_avx2() -> bool {
    std::is_x86_feature_detected!("avx2")
}

/// Probes the local CPU for AVX2 support. Non-x86 architectures do not
/// have the instruction set at all.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn arch_supports_avx2() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_hints_bypass_probing() {
        assert!(CpuArchHint::Avx2.supports_avx2());
        assert!(!CpuArchHint::Avx2NotSupport.supports_avx2());
    }

    #[test]
    fn test_cli_value_names() {
        assert_eq!(
            CpuArchHint::from_str("avx2_not_support", false),
            Ok(CpuArchHint::Avx2NotSupport)
        );
        assert_eq!(CpuArchHint::from_str("avx2", false), Ok(CpuArchHint::Avx2));
        assert_eq!(
            CpuArchHint::from_str("unknown", false),
            Ok(CpuArchHint::Unknown)
        );
        assert!(CpuArchHint::from_str("sse4", false).is_err());
    }
}
