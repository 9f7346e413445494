use std::str::FromStr;

use super::error::{BeanwatchError, Result};
use super::objectname::{Constraints, Objectname};

const QUERY_PREFIX: &str = "query=";
const ALL_QUERY: &str = "query=*:*";

/// Longest accepted domain in a query string.
pub const MAX_DOMAIN_LEN: usize = 128;
/// Longest accepted constraint list in a query string.
pub const MAX_CONSTRAINTS_LEN: usize = 1024;

/// A client selection over all published beans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches every bean of every provider.
    All,
    /// Matches beans whose objectname satisfies this one.
    Name(Objectname),
}

impl Query {
    /// Parses the raw request argument string.
    ///
    /// `None`, an empty string and `query=*:*` all yield [`Query::All`].
    pub fn parse(args: Option<&str>) -> Result<Self> {
        match args {
            None => Ok(Query::All),
            Some(s) => s.parse(),
        }
    }

    /// Decides whether `candidate` is selected by this query.
    ///
    /// Domains compare exactly. A query without constraints selects the whole
    /// domain; otherwise each query constraint must be present in the
    /// candidate with an identical value. Extra candidate keys are ignored.
    pub fn matches(&self, candidate: &Objectname) -> bool {
        match self {
            Query::All => true,
            Query::Name(query) => matches(query, candidate),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Query::All)
    }
}

/// Objectname-against-objectname form of [`Query::matches`].
pub fn matches(query: &Objectname, candidate: &Objectname) -> bool {
    if query.domain() != candidate.domain() {
        return false;
    }

    let Some(wanted) = query.constraints() else {
        return true;
    };

    wanted.iter().all(|(key, value)| candidate.get(key) == Some(value.as_str()))
}

impl FromStr for Query {
    type Err = BeanwatchError;

    fn from_str(args: &str) -> Result<Self> {
        if args.is_empty() || args == ALL_QUERY {
            return Ok(Query::All);
        }

        let rest = args
            .strip_prefix(QUERY_PREFIX)
            .ok_or_else(|| BeanwatchError::BadQuery(format!("expected '{}DOMAIN:CONSTRAINTS'", QUERY_PREFIX)))?;

        let (domain, constraints) = rest
            .split_once(':')
            .ok_or_else(|| BeanwatchError::BadQuery(format!("missing ':' in '{}'", args)))?;

        if domain.is_empty() {
            return Err(BeanwatchError::BadQuery(format!("missing domain in '{}'", args)));
        }
        if domain.len() > MAX_DOMAIN_LEN {
            return Err(BeanwatchError::BadQuery(format!(
                "domain longer than {} bytes",
                MAX_DOMAIN_LEN
            )));
        }

        // Leading whitespace is skipped; constraints end at the next whitespace.
        let constraints = constraints
            .trim_start()
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default();

        if constraints.is_empty() {
            return Err(BeanwatchError::BadQuery(format!("missing constraints in '{}'", args)));
        }
        if constraints.len() > MAX_CONSTRAINTS_LEN {
            return Err(BeanwatchError::BadQuery(format!(
                "constraints longer than {} bytes",
                MAX_CONSTRAINTS_LEN
            )));
        }

        if constraints == "*" || constraints.starts_with("*&") {
            return Ok(Query::Name(Objectname::new(domain)));
        }

        Ok(Query::Name(Objectname::with_constraints(
            domain,
            parse_constraints(constraints),
        )))
    }
}

/// Splits `k=v,k2=v2` into a map. Tokens without `=` get an empty value and
/// later duplicates overwrite earlier ones.
fn parse_constraints(list: &str) -> Constraints {
    list.split(',')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}
