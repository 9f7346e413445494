pub mod bean;
pub mod error;
pub mod objectname;
pub mod property;
pub mod query;


pub use bean::Bean;
pub use error::{BeanwatchError, Result};
pub use objectname::{Constraints, Objectname};
pub use property::{OpaqueValue, Property, PropertyValue};
pub use query::{matches, Query};
