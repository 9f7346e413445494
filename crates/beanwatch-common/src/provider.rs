//! Bean providers and query dispatch
//!
//! Providers are independent components that own a handful of objectnames
//! and answer queries against them. The [`ProviderRegistry`] is created by the
//! host at startup, filled in registration order, and handed to whatever
//! serves queries. Dispatch buffers every provider's output, so a fatal error
//! from a later provider discards earlier beans before anything reaches the
//! client.

use std::sync::Arc;

use crate::protocol::{Bean, Query, Result};

/// What a provider has to say about one query.
#[derive(Debug)]
pub enum QueryReply {
    /// At least one bean matched.
    Beans(Vec<Bean>),
    /// Nothing owned by this provider matched; dispatch moves on.
    NoMatch,
}

impl QueryReply {
    /// Wraps collected beans, mapping an empty list to [`QueryReply::NoMatch`].
    pub fn from_beans(beans: Vec<Bean>) -> Self {
        if beans.is_empty() {
            QueryReply::NoMatch
        } else {
            QueryReply::Beans(beans)
        }
    }
}

/// A source of beans.
///
/// Returning `Err` is fatal for the whole query; use [`QueryReply::NoMatch`]
/// for "nothing here".
pub trait BeanProvider: Send + Sync {
    /// Short name used in logs and error reports.
    fn name(&self) -> &str;

    /// Produces the beans selected by `query`.
    fn query(&self, query: &Query) -> Result<QueryReply>;
}

/// Outcome of running a query across all providers.
#[derive(Debug)]
pub enum Dispatch {
    /// Beans from every provider that matched, in registration order.
    Beans(Vec<Bean>),
    /// No provider had matching data. Not an error.
    Empty,
}

impl Dispatch {
    pub fn beans(&self) -> &[Bean] {
        match self {
            Dispatch::Beans(beans) => beans,
            Dispatch::Empty => &[],
        }
    }

    pub fn into_beans(self) -> Vec<Bean> {
        match self {
            Dispatch::Beans(beans) => beans,
            Dispatch::Empty => Vec::new(),
        }
    }
}

/// Ordered list of providers consulted for every query.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn BeanProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider; it will be consulted after all earlier ones.
    pub fn register(&mut self, provider: Arc<dyn BeanProvider>) {
        tracing::debug!(provider = provider.name(), "registered bean provider");
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    /// Runs `query` against every provider in registration order.
    ///
    /// The first provider error aborts dispatch and is returned unchanged;
    /// beans gathered so far are dropped.
    pub fn dispatch(&self, query: &Query) -> Result<Dispatch> {
        let mut beans = Vec::new();

        for provider in &self.providers {
            match provider.query(query) {
                Ok(QueryReply::Beans(found)) => {
                    tracing::trace!(provider = provider.name(), count = found.len(), "provider matched");
                    beans.extend(found);
                }
                Ok(QueryReply::NoMatch) => {}
                Err(e) => {
                    tracing::error!(provider = provider.name(), error = %e, "provider failed, aborting query");
                    return Err(e);
                }
            }
        }

        if beans.is_empty() {
            Ok(Dispatch::Empty)
        } else {
            Ok(Dispatch::Beans(beans))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BeanwatchError, Objectname, Property};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        name: &'static str,
        objectname: Objectname,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(name: &'static str, objectname: Objectname) -> Self {
            Self {
                name,
                objectname,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BeanProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn query(&self, query: &Query) -> Result<QueryReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !query.matches(&self.objectname) {
                return Ok(QueryReply::NoMatch);
            }
            let bean = Bean::new(self.objectname.clone()).with(Property::string("Provider", self.name));
            Ok(QueryReply::Beans(vec![bean]))
        }
    }

    struct FailingProvider;

    impl BeanProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn query(&self, _query: &Query) -> Result<QueryReply> {
            Err(BeanwatchError::provider("failing", "backend gone"))
        }
    }

    fn registry() -> (ProviderRegistry, Arc<FixedProvider>, Arc<FixedProvider>) {
        let a = Arc::new(FixedProvider::new("a", Objectname::new("alpha").with_constraint("Type", "x")));
        let b = Arc::new(FixedProvider::new("b", Objectname::new("beta").with_constraint("Type", "y")));
        let mut registry = ProviderRegistry::new();
        registry.register(a.clone());
        registry.register(b.clone());
        (registry, a, b)
    }

    #[test]
    fn test_dispatch_all_collects_in_registration_order() {
        let (registry, _, _) = registry();
        let result = registry.dispatch(&Query::All).unwrap();
        let domains: Vec<_> = result.beans().iter().map(|b| b.objectname().domain().to_string()).collect();
        assert_eq!(domains, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_dispatch_consults_every_provider() {
        let (registry, a, b) = registry();
        let query: Query = "query=beta:*".parse().unwrap();
        let result = registry.dispatch(&query).unwrap();
        assert_eq!(result.beans().len(), 1);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_no_match_is_empty_not_error() {
        let (registry, _, _) = registry();
        let query: Query = "query=gamma:*".parse().unwrap();
        assert!(matches!(registry.dispatch(&query).unwrap(), Dispatch::Empty));
    }

    #[test]
    fn test_dispatch_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.dispatch(&Query::All).unwrap(), Dispatch::Empty));
    }

    #[test]
    fn test_dispatch_fatal_discards_earlier_output() {
        let (mut registry, _, b) = registry();
        let mut failing_first = ProviderRegistry::new();
        failing_first.register(Arc::new(FailingProvider));
        failing_first.register(b.clone());

        registry.register(Arc::new(FailingProvider));
        let err = registry.dispatch(&Query::All).unwrap_err();
        assert!(matches!(err, BeanwatchError::ProviderFatal { .. }));
        assert!(!err.is_client_error());

        // Short-circuits: providers after the failing one are not consulted.
        let before = b.calls.load(Ordering::SeqCst);
        assert!(failing_first.dispatch(&Query::All).is_err());
        assert_eq!(b.calls.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_query_reply_from_empty_beans() {
        assert!(matches!(QueryReply::from_beans(Vec::new()), QueryReply::NoMatch));
    }

    #[test]
    fn test_registry_names() {
        let (registry, _, _) = registry();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
    }
}
