use std::fmt;
use std::sync::Arc;

/// Renders an opaque value captured at construction time.
type Renderer = Arc<dyn Fn() -> String + Send + Sync>;

/// A value whose type is private to the provider that produced it.
///
/// The provider supplies the renderer alongside the value, so the core never
/// needs to know the concrete type.
#[derive(Clone)]
pub struct OpaqueValue {
    render: Renderer,
}

impl OpaqueValue {
    pub fn new<T>(value: T, render: fn(&T) -> String) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            render: Arc::new(move || render(&value)),
        }
    }

    pub fn render(&self) -> String {
        (self.render)()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueValue").field(&self.render()).finish()
    }
}

/// Typed scalar carried by a [`Property`].
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Opaque(OpaqueValue),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::I8(v) => write!(f, "{}", v),
            PropertyValue::U8(v) => write!(f, "{}", v),
            PropertyValue::I16(v) => write!(f, "{}", v),
            PropertyValue::U16(v) => write!(f, "{}", v),
            PropertyValue::I32(v) => write!(f, "{}", v),
            PropertyValue::U32(v) => write!(f, "{}", v),
            PropertyValue::I64(v) => write!(f, "{}", v),
            PropertyValue::U64(v) => write!(f, "{}", v),
            PropertyValue::F32(v) => write!(f, "{:.6}", v),
            PropertyValue::F64(v) => write!(f, "{:.6}", v),
            PropertyValue::Str(v) => f.write_str(v),
            PropertyValue::Opaque(v) => f.write_str(&v.render()),
        }
    }
}

/// A named, typed scalar. Immutable once built.
#[derive(Debug, Clone)]
pub struct Property {
    key: String,
    value: PropertyValue,
}

impl Property {
    pub fn new(key: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, PropertyValue::Bool(value))
    }

    pub fn i8(key: impl Into<String>, value: i8) -> Self {
        Self::new(key, PropertyValue::I8(value))
    }

    pub fn u8(key: impl Into<String>, value: u8) -> Self {
        Self::new(key, PropertyValue::U8(value))
    }

    pub fn i16(key: impl Into<String>, value: i16) -> Self {
        Self::new(key, PropertyValue::I16(value))
    }

    pub fn u16(key: impl Into<String>, value: u16) -> Self {
        Self::new(key, PropertyValue::U16(value))
    }

    pub fn i32(key: impl Into<String>, value: i32) -> Self {
        Self::new(key, PropertyValue::I32(value))
    }

    pub fn u32(key: impl Into<String>, value: u32) -> Self {
        Self::new(key, PropertyValue::U32(value))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, PropertyValue::I64(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Self::new(key, PropertyValue::U64(value))
    }

    pub fn f32(key: impl Into<String>, value: f32) -> Self {
        Self::new(key, PropertyValue::F32(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, PropertyValue::F64(value))
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, PropertyValue::Str(value.into()))
    }

    /// Wraps a provider-private value together with the function that renders it.
    pub fn opaque<T>(key: impl Into<String>, value: T, render: fn(&T) -> String) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(key, PropertyValue::Opaque(OpaqueValue::new(value, render)))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }
}
