//! Key codec registry.
//!
//! A query arrives with a *stringified* key ("25") and optionally the name
//! of the codec that produced the store's binary keys ("LongSerde"). Before
//! the key can be routed, it has to become the exact bytes the runtime
//! partitioned it by, which means: resolve the codec, convert the text to
//! the codec's key type, serialize.
//!
//! The registry holds immutable entries behind `Arc<dyn KeySerde>`, keyed by
//! name. Lookups are forgiving about the caller's spelling: short name
//! ("long"), class-style name ("LongSerde"), or a fully-qualified name whose
//! last segment matches — all case-insensitive.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{QueryError, Result};

/// The concrete types a key codec can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Utf8,
    I64,
    I32,
    F64,
}

/// A typed key, after conversion from its textual form.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedKey {
    Utf8(String),
    I64(i64),
    I32(i32),
    F64(f64),
}

impl fmt::Display for TypedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedKey::Utf8(v) => f.write_str(v),
            TypedKey::I64(v) => write!(f, "{}", v),
            TypedKey::I32(v) => write!(f, "{}", v),
            TypedKey::F64(v) => write!(f, "{}", v),
        }
    }
}

/// Convert a stringified key into the given key type.
///
/// The parser's own message is preserved: it is the observable contract of
/// the query endpoint's error envelope.
pub fn convert_key(text: &str, key_type: KeyType) -> Result<TypedKey> {
    match key_type {
        KeyType::Utf8 => Ok(TypedKey::Utf8(text.to_string())),
        KeyType::I64 => text
            .parse::<i64>()
            .map(TypedKey::I64)
            .map_err(|e| QueryError::KeyConversion(format!("'{}': {}", text, e))),
        KeyType::I32 => text
            .parse::<i32>()
            .map(TypedKey::I32)
            .map_err(|e| QueryError::KeyConversion(format!("'{}': {}", text, e))),
        KeyType::F64 => text
            .parse::<f64>()
            .map(TypedKey::F64)
            .map_err(|e| QueryError::KeyConversion(format!("'{}': {}", text, e))),
    }
}

/// A named key codec: serializer, deserializer, and the key type it
/// produces. Entries are immutable once registered.
pub trait KeySerde: Send + Sync {
    fn name(&self) -> &'static str;

    /// Alternate names this codec answers to (class-style spellings).
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn key_type(&self) -> KeyType;

    fn serialize(&self, key: &TypedKey) -> Result<Bytes>;

    fn deserialize(&self, bytes: &[u8]) -> Result<TypedKey>;
}

impl std::fmt::Debug for dyn KeySerde {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeySerde").field(&self.name()).finish()
    }
}

fn type_mismatch(serde: &dyn KeySerde, key: &TypedKey) -> QueryError {
    QueryError::KeyConversion(format!(
        "serde '{}' cannot serialize key {:?}",
        serde.name(),
        key
    ))
}

/// UTF-8 string keys.
pub struct StringSerde;

impl KeySerde for StringSerde {
    fn name(&self) -> &'static str {
        "string"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["StringSerde"]
    }

    fn key_type(&self) -> KeyType {
        KeyType::Utf8
    }

    fn serialize(&self, key: &TypedKey) -> Result<Bytes> {
        match key {
            TypedKey::Utf8(v) => Ok(Bytes::copy_from_slice(v.as_bytes())),
            other => Err(type_mismatch(self, other)),
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<TypedKey> {
        String::from_utf8(bytes.to_vec())
            .map(TypedKey::Utf8)
            .map_err(|e| QueryError::Deserialization(e.to_string()))
    }
}

/// Big-endian i64 keys.
pub struct LongSerde;

impl KeySerde for LongSerde {
    fn name(&self) -> &'static str {
        "long"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["LongSerde"]
    }

    fn key_type(&self) -> KeyType {
        KeyType::I64
    }

    fn serialize(&self, key: &TypedKey) -> Result<Bytes> {
        match key {
            TypedKey::I64(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            other => Err(type_mismatch(self, other)),
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<TypedKey> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| QueryError::Deserialization(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(TypedKey::I64(i64::from_be_bytes(raw)))
    }
}

/// Big-endian i32 keys.
pub struct IntegerSerde;

impl KeySerde for IntegerSerde {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["IntegerSerde", "IntSerde"]
    }

    fn key_type(&self) -> KeyType {
        KeyType::I32
    }

    fn serialize(&self, key: &TypedKey) -> Result<Bytes> {
        match key {
            TypedKey::I32(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            other => Err(type_mismatch(self, other)),
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<TypedKey> {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| QueryError::Deserialization(format!("expected 4 bytes, got {}", bytes.len())))?;
        Ok(TypedKey::I32(i32::from_be_bytes(raw)))
    }
}

/// Big-endian f64 keys.
pub struct DoubleSerde;

impl KeySerde for DoubleSerde {
    fn name(&self) -> &'static str {
        "double"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["DoubleSerde"]
    }

    fn key_type(&self) -> KeyType {
        KeyType::F64
    }

    fn serialize(&self, key: &TypedKey) -> Result<Bytes> {
        match key {
            TypedKey::F64(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            other => Err(type_mismatch(self, other)),
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<TypedKey> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| QueryError::Deserialization(format!("expected 8 bytes, got {}", bytes.len())))?;
        Ok(TypedKey::F64(f64::from_be_bytes(raw)))
    }
}

/// Registry of key codecs with a designated default.
pub struct SerdeRegistry {
    entries: Vec<Arc<dyn KeySerde>>,
    by_name: HashMap<String, usize>,
    default_index: usize,
}

impl SerdeRegistry {
    /// A registry with the built-in codecs, defaulting to string keys.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            default_index: 0,
        };
        // Registration of the built-ins cannot collide.
        registry.register(Arc::new(StringSerde)).expect("builtin serde");
        registry.register(Arc::new(LongSerde)).expect("builtin serde");
        registry.register(Arc::new(IntegerSerde)).expect("builtin serde");
        registry.register(Arc::new(DoubleSerde)).expect("builtin serde");
        registry
    }

    /// Register a codec. Names are unique: a second registration under an
    /// already-known name or alias is an error, not a replacement.
    pub fn register(&mut self, serde: Arc<dyn KeySerde>) -> Result<()> {
        let mut names = vec![serde.name().to_lowercase()];
        names.extend(serde.aliases().iter().map(|a| a.to_lowercase()));

        for name in &names {
            if self.by_name.contains_key(name) {
                return Err(QueryError::SerdeAlreadyRegistered(name.clone()));
            }
        }

        let index = self.entries.len();
        self.entries.push(serde);
        for name in names {
            self.by_name.insert(name, index);
        }
        Ok(())
    }

    /// Make a previously registered codec the default for keys.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        self.default_index = self.index_of(name)?;
        Ok(())
    }

    /// The configured default key codec.
    pub fn default_serde(&self) -> Arc<dyn KeySerde> {
        Arc::clone(&self.entries[self.default_index])
    }

    /// Look up a codec by name, alias, or the last segment of a
    /// fully-qualified class name. Case-insensitive.
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn KeySerde>> {
        self.index_of(name).map(|i| Arc::clone(&self.entries[i]))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        let simple = name.rsplit('.').next().unwrap_or(name).to_lowercase();
        self.by_name
            .get(&simple)
            .copied()
            .ok_or_else(|| QueryError::UnknownSerde(name.to_string()))
    }
}
