//! Server version parsing and ordering for collector gating.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::QueryError;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)").expect("version pattern is valid"));

/// MariaDB 10+ on the legacy replication handshake reports `5.5.5-<real version>`.
const MARIADB_COMPAT_PREFIX: &str = "5.5.5-";

/// A server's `major.minor` version.
///
/// Ordered field by field, so `5.10` sorts after `5.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the output of `SELECT VERSION()`.
    ///
    /// Accepts suffixes such as `-log` or `-MariaDB-1:10.6.12+maria~ubu2004`.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        let version = match trimmed.strip_prefix(MARIADB_COMPAT_PREFIX) {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
            _ => trimmed,
        };

        let caps = VERSION_RE
            .captures(version)
            .ok_or_else(|| QueryError::new(format!("unrecognised server version {raw:?}")))?;

        let part = |idx: usize| {
            caps[idx]
                .parse::<u32>()
                .map_err(|e| QueryError::new(format!("server version {raw:?}: {e}")))
        };

        Ok(Self::new(part(1)?, part(2)?))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
