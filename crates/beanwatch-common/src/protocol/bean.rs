use super::objectname::Objectname;
use super::property::Property;

/// An ordered set of properties published under one objectname.
///
/// Beans are built fresh for each query response; property order is the
/// order of insertion and is what the renderer emits.
#[derive(Debug, Clone)]
pub struct Bean {
    objectname: Objectname,
    properties: Vec<Property>,
}

impl Bean {
    pub fn new(objectname: Objectname) -> Self {
        Self {
            objectname,
            properties: Vec::new(),
        }
    }

    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Builder form of [`Bean::push`].
    pub fn with(mut self, property: Property) -> Self {
        self.push(property);
        self
    }

    pub fn objectname(&self) -> &Objectname {
        &self.objectname
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Finds the first property with the given key.
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key() == key)
    }
}

impl Extend<Property> for Bean {
    fn extend<I: IntoIterator<Item = Property>>(&mut self, iter: I) {
        self.properties.extend(iter);
    }
}
