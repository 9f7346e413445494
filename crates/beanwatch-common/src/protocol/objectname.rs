use std::collections::BTreeMap;
use std::fmt;

/// Key/value constraints attached to an [`Objectname`].
pub type Constraints = BTreeMap<String, String>;

/// Identity of a bean, and the shape of a query.
///
/// `constraints == None` means the name covers its whole domain. An empty but
/// present map also matches everything, yet is kept distinct so that callers
/// can tell "no constraints given" from "constraints given, none listed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objectname {
    domain: String,
    constraints: Option<Constraints>,
}

impl Objectname {
    /// Creates an unconstrained name covering `domain`.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            constraints: None,
        }
    }

    pub fn with_constraints(domain: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            domain: domain.into(),
            constraints: Some(constraints),
        }
    }

    /// Adds (or replaces) one constraint, turning an unconstrained name into
    /// a constrained one.
    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints
            .get_or_insert_with(Constraints::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn constraints(&self) -> Option<&Constraints> {
        self.constraints.as_ref()
    }

    /// Looks up a single constraint value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.constraints
            .as_ref()
            .and_then(|c| c.get(key))
            .map(String::as_str)
    }
}

impl fmt::Display for Objectname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        match &self.constraints {
            Some(constraints) if !constraints.is_empty() => {
                for (i, (key, value)) in constraints.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                Ok(())
            }
            _ => f.write_str("*"),
        }
    }
}
