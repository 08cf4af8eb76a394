// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Cluster version parsing and comparison.

use std::fmt;
use std::str::FromStr;

/// A version string that does not have exactly four numeric segments, or
/// whose segments exceed their packing bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("version: {0} is invalid")]
pub struct InvalidVersionFormat(pub String);

/// A cluster version, packed into a single `u64` as
/// `(major << 32) | (minor << 16) | (major_patch << 8) | minor_patch`.
///
/// Comparing the packed integers gives the correct ordering across version
/// epochs ("4.10.0.0" sorts after "4.2.0.0"), which byte-wise string
/// comparison does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterVersion(u64);

impl ClusterVersion {
    /// Packs the four version components. Callers are responsible for
    /// staying within the per-component bounds; [`ClusterVersion::parse`]
    /// enforces them for untrusted input.
    pub const fn from_parts(major: u64, minor: u64, major_patch: u64, minor_patch: u64) -> Self {
        ClusterVersion((major << 32) | (minor << 16) | (major_patch << 8) | minor_patch)
    }

    /// Parses a dotted version string of exactly four numeric segments.
    pub fn parse(s: &str) -> Result<Self, InvalidVersionFormat> {
        let invalid = || InvalidVersionFormat(s.to_string());
        let segments = s
            .split('.')
            .map(|segment| segment.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        let [major, minor, major_patch, minor_patch] = segments[..] else {
            return Err(invalid());
        };
        if major > 0xffff_ffff || minor > 0xffff || major_patch > 0xff || minor_patch > 0xff {
            return Err(invalid());
        }
        Ok(ClusterVersion::from_parts(
            major,
            minor,
            major_patch,
            minor_patch,
        ))
    }

    /// The packed integer representation, as persisted in the cluster's
    /// core table version markers.
    pub const fn packed(self) -> u64 {
        self.0
    }
}

impl FromStr for ClusterVersion {
    type Err = InvalidVersionFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClusterVersion::parse(s)
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.0 >> 32,
            (self.0 >> 16) & 0xffff,
            (self.0 >> 8) & 0xff,
            self.0 & 0xff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_packs_components() {
        assert_eq!(
            ClusterVersion::parse("4.1.0.0").unwrap().packed(),
            0x0000_0004_0001_0000
        );
        assert_eq!(
            ClusterVersion::parse("4.3.5.1").unwrap(),
            ClusterVersion::from_parts(4, 3, 5, 1)
        );
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for bad in [
            "a.b.c",
            "1.2.3",
            "1.2.3.4.5",
            "",
            "4.1.0.x",
            "4294967296.0.0.0",
            "0.65536.0.0",
            "0.0.256.0",
            "0.0.0.256",
            "4.1.0.-1",
        ] {
            assert_eq!(
                ClusterVersion::parse(bad),
                Err(InvalidVersionFormat(bad.to_string())),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_ordering_is_numeric_not_lexicographic() {
        let parse = |s: &str| ClusterVersion::parse(s).unwrap();
        assert!(parse("4.10.0.0") > parse("4.2.0.0"));
        assert!(parse("4.2.5.1") > parse("4.2.5.0"));
        assert!(parse("4.3.0.0") > parse("4.2.255.255"));
        assert!(parse("10.0.0.0") > parse("9.65535.255.255"));
        assert_eq!(parse("4.2.1.0"), parse("4.2.1.0"));
    }

    #[test]
    fn test_display_round_trips() {
        for s in ["4.2.5.1", "0.0.0.0", "4.10.0.3"] {
            assert_eq!(ClusterVersion::parse(s).unwrap().to_string(), s);
        }
    }
}
