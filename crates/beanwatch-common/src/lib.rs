//! Beanwatch Common Types and Dispatch
//!
//! This crate provides the naming, query and dispatch layer shared by every
//! beanwatch component.
//!
//! # Overview
//!
//! Monitoring providers publish *beans*: ordered lists of typed properties
//! identified by an [`Objectname`]. An objectname is a domain string plus an
//! optional set of `key=value` constraints, and the same shape doubles as a
//! query. Clients select beans with a single query string:
//!
//! - `query=*:*` (or nothing at all) selects every bean
//! - `query=DOMAIN:*` selects every bean of one domain
//! - `query=DOMAIN:k1=v1,k2=v2` selects beans carrying at least those pairs
//!
//! # Components
//!
//! - [`protocol`] - Property, Bean, Objectname, Query and the error taxonomy
//! - [`provider`] - The [`BeanProvider`] trait and [`ProviderRegistry`] dispatch
//!
//! # Example
//!
//! ```
//! use beanwatch_common::{Objectname, Query};
//!
//! let bean_name = Objectname::new("mydomain")
//!     .with_constraint("Type", "forever")
//!     .with_constraint("Host", "x");
//!
//! let query: Query = "query=mydomain:Type=forever".parse().unwrap();
//! assert!(query.matches(&bean_name));
//!
//! let query: Query = "query=mydomain:Type=forever,Host=y".parse().unwrap();
//! assert!(!query.matches(&bean_name));
//! ```

pub mod protocol;
pub mod provider;

pub use protocol::*;
pub use provider::{BeanProvider, Dispatch, ProviderRegistry, QueryReply};
