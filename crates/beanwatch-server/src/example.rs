//! Demonstration provider publishing one property of every kind.

use std::time::Duration;

use beanwatch_common::{Bean, BeanProvider, Objectname, Property, Query, QueryReply, Result};

pub const EXAMPLE_DOMAIN: &str = "beanwatch_example";

/// Provider with a single fixed bean, useful for checking a deployment and
/// for exercising renderers.
pub struct ExampleProvider {
    objectname: Objectname,
}

impl ExampleProvider {
    pub fn new() -> Self {
        Self {
            objectname: Objectname::new(EXAMPLE_DOMAIN)
                .with_constraint("Type", "ExampleModule")
                .with_constraint("Something", "Else"),
        }
    }

    pub fn objectname(&self) -> &Objectname {
        &self.objectname
    }

    fn bean(&self) -> Bean {
        Bean::new(self.objectname.clone())
            .with(Property::bool("SomeBool", true))
            .with(Property::u8("SomeByte", 32))
            .with(Property::i16("SomeINT16", -42))
            .with(Property::u16("SomeUINT16", 42))
            .with(Property::i32("SomeINT32", -123456))
            .with(Property::u32("SomeUINT32", 123456))
            .with(Property::i64("SomeINT64", -1231231231231232037))
            .with(Property::u64("SomeUINT64", 1231231231231232037))
            .with(Property::f32("SomeFloat", 3.1415))
            .with(Property::f64("SomeDouble", 2.71828183))
            .with(Property::string("SomeString", "This is a string"))
            .with(Property::opaque("SomeOpaque", Duration::from_millis(1500), render_duration))
    }
}

impl Default for ExampleProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn render_duration(d: &Duration) -> String {
    format!("{}.{:03}s", d.as_secs(), d.subsec_millis())
}

impl BeanProvider for ExampleProvider {
    fn name(&self) -> &str {
        "example"
    }

    fn query(&self, query: &Query) -> Result<QueryReply> {
        if !query.matches(&self.objectname) {
            return Ok(QueryReply::NoMatch);
        }
        Ok(QueryReply::Beans(vec![self.bean()]))
    }
}
