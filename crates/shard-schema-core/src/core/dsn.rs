// crates/shard-schema-core/src/core/dsn.rs
// ============================================================================
// Module: Shard DSN Parsing
// Description: Parser for `[user[:password]@][net[(addr)]]/[dbname][?params]`.
// Purpose: Extract credentials and addresses from a shard's connection string.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Shard connection strings follow the MySQL driver DSN layout. The last `/`
//! separates the database name; the last `@` before it separates credentials
//! from the network part; the first `:` in the credentials separates the
//! user from the password, so passwords may contain `:` and `@`.
//!
//! [`ShardDsn`] implements `Display` with the password masked so it can be
//! logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// DSN parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsnError {
    /// No `/` separating the database name.
    #[error("invalid DSN: missing the slash separating the database name")]
    MissingSlash,
    /// `net(addr` without the closing parenthesis.
    #[error("invalid DSN: network address not terminated (missing closing brace)")]
    UnterminatedAddress,
    /// A query parameter without `=`.
    #[error("invalid DSN: invalid parameter '{0}'")]
    InvalidParam(String),
}

// ============================================================================
// SECTION: DSN
// ============================================================================

/// Parsed shard DSN.
#[derive(Clone, PartialEq, Eq)]
pub struct ShardDsn {
    /// User name (may be empty).
    pub user: String,
    /// Password (may be empty).
    pub password: String,
    /// Network type such as `tcp`, `unix`, or `file`.
    pub net: Option<String>,
    /// Address inside the parentheses.
    pub addr: Option<String>,
    /// Database name after the slash (may be empty).
    pub db_name: String,
    /// Query parameters in declaration order.
    pub params: Vec<(String, String)>,
}

impl ShardDsn {
    /// Parses a DSN string.
    ///
    /// # Errors
    ///
    /// Returns [`DsnError`] when the DSN is structurally invalid.
    pub fn parse(dsn: &str) -> Result<Self, DsnError> {
        let slash = dsn.rfind('/').ok_or(DsnError::MissingSlash)?;
        let (head, tail) = (&dsn[.. slash], &dsn[slash + 1 ..]);

        let (credentials, network) = match head.rfind('@') {
            Some(at) => (Some(&head[.. at]), &head[at + 1 ..]),
            None => (None, head),
        };
        let (user, password) = match credentials {
            Some(credentials) => match credentials.split_once(':') {
                Some((user, password)) => (user.to_string(), password.to_string()),
                None => (credentials.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        let (net, addr) = match network.find('(') {
            Some(open) => {
                let inner = network[open + 1 ..]
                    .strip_suffix(')')
                    .ok_or(DsnError::UnterminatedAddress)?;
                (Some(network[.. open].to_string()), Some(inner.to_string()))
            }
            None if network.is_empty() => (None, None),
            None => (Some(network.to_string()), None),
        };

        let (db_name, query) = match tail.split_once('?') {
            Some((db_name, query)) => (db_name, Some(query)),
            None => (tail, None),
        };
        let mut params = Vec::new();
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) =
                    pair.split_once('=').ok_or_else(|| DsnError::InvalidParam(pair.to_string()))?;
                params.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            user,
            password,
            net,
            addr,
            db_name: db_name.to_string(),
            params,
        })
    }

    /// Returns the value of a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for ShardDsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() || !self.password.is_empty() {
            f.write_str(&self.user)?;
            if !self.password.is_empty() {
                f.write_str(":***")?;
            }
            f.write_str("@")?;
        }
        if let Some(net) = &self.net {
            f.write_str(net)?;
        }
        if let Some(addr) = &self.addr {
            write!(f, "({addr})")?;
        }
        write!(f, "/{}", self.db_name)?;
        for (index, (key, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{key}={value}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ShardDsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardDsn({self})")
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
