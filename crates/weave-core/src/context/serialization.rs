//! Array-based serialization of class contexts.
//!
//! A context is flattened into nested arrays of text and numbers:
//!
//! ```text
//! [class_type, [mixin, ...], [composed_interface, ...]]
//! mixin = [mixin_type, kind, visibility, [dependency, ...], [origin_kind, origin_module, origin_location]]
//! ```
//!
//! Types are written by name and resolved against a [`TypeUniverse`] when
//! reading. The array itself can be encoded with bincode for storage; the
//! encoding is a flat token stream, so decoding never recurses and rejects
//! nesting deeper than [`MAX_NESTING`].

use bincode::Options;
use serde::{Deserialize, Serialize};

use super::{ClassContext, MemberVisibility, MixinContext, MixinContextOrigin, MixinKind};
use crate::error::ConfigurationError;
use crate::types::{TypeRef, TypeUniverse};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Malformed context array at {path}: expected {expected}")]
    Malformed { path: String, expected: &'static str },

    #[error("Unknown type '{name}' in serialized context")]
    UnknownType { name: String },

    #[error("Invalid {what} value {value}")]
    InvalidValue { what: &'static str, value: u32 },

    #[error("Serialized context is invalid: {0}")]
    InvalidContext(#[from] ConfigurationError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Encoded context nests deeper than {limit} arrays")]
    TooDeep { limit: usize },
}

type Result<T> = std::result::Result<T, SerializationError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextValue {
    Text(String),
    Number(u32),
    Array(Vec<ContextValue>),
}

/// Deepest array nesting accepted when decoding bytes
pub const MAX_NESTING: usize = 32;

/// Largest encoded context accepted when decoding bytes
pub const MAX_ENCODED_LEN: u64 = 16 * 1024 * 1024;

/// Wire form of a [`ContextValue`]: `Array(n)` is followed by its `n` items
#[derive(Debug, Serialize, Deserialize)]
enum Token {
    Text(String),
    Number(u32),
    Array(u32),
}

fn encoding() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ENCODED_LEN)
}

fn encoding_error(e: impl std::fmt::Display) -> SerializationError {
    SerializationError::Encoding(e.to_string())
}

impl ContextValue {
    fn flatten(&self, tokens: &mut Vec<Token>) -> Result<()> {
        match self {
            Self::Text(text) => tokens.push(Token::Text(text.clone())),
            Self::Number(n) => tokens.push(Token::Number(*n)),
            Self::Array(items) => {
                let len = u32::try_from(items.len()).map_err(encoding_error)?;
                tokens.push(Token::Array(len));
                for item in items {
                    item.flatten(tokens)?;
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut tokens = Vec::new();
        self.flatten(&mut tokens)?;
        encoding().serialize(&tokens).map_err(encoding_error)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let tokens: Vec<Token> = encoding().deserialize(bytes).map_err(encoding_error)?;
        Self::unflatten(tokens)
    }

    /// Rebuilds the tree with an explicit stack of open arrays
    fn unflatten(tokens: Vec<Token>) -> Result<Self> {
        let mut open: Vec<(u32, Vec<ContextValue>)> = Vec::new();
        let mut tokens = tokens.into_iter();
        loop {
            let mut value = match tokens.next() {
                Some(Token::Text(text)) => Self::Text(text),
                Some(Token::Number(n)) => Self::Number(n),
                Some(Token::Array(0)) => Self::Array(Vec::new()),
                Some(Token::Array(len)) => {
                    if open.len() >= MAX_NESTING {
                        return Err(SerializationError::TooDeep { limit: MAX_NESTING });
                    }
                    open.push((len, Vec::new()));
                    continue;
                }
                None => return Err(encoding_error("truncated context array")),
            };

            loop {
                let Some((remaining, items)) = open.last_mut() else {
                    if tokens.next().is_some() {
                        return Err(encoding_error("trailing data after context array"));
                    }
                    return Ok(value);
                };
                items.push(value);
                *remaining -= 1;
                if *remaining > 0 {
                    break;
                }
                value = Self::Array(open.pop().map(|(_, items)| items).unwrap_or_default());
            }
        }
    }
}

fn kind_code(kind: MixinKind) -> u32 {
    match kind {
        MixinKind::Extending => 0,
        MixinKind::Used => 1,
    }
}

fn visibility_code(visibility: MemberVisibility) -> u32 {
    match visibility {
        MemberVisibility::Private => 0,
        MemberVisibility::Public => 1,
    }
}

/// Writes class contexts as [`ContextValue`] arrays
pub struct ArrayClassContextSerializer<'u> {
    universe: &'u TypeUniverse,
}

impl<'u> ArrayClassContextSerializer<'u> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self { universe }
    }

    fn type_value(&self, ty: TypeRef) -> ContextValue {
        ContextValue::Text(self.universe.name(ty).to_string())
    }

    fn types_value(&self, types: &[TypeRef]) -> ContextValue {
        ContextValue::Array(types.iter().map(|t| self.type_value(*t)).collect())
    }

    pub fn serialize_mixin(&self, mixin: &MixinContext) -> ContextValue {
        let origin = mixin.origin();
        ContextValue::Array(vec![
            self.type_value(mixin.mixin_type()),
            ContextValue::Number(kind_code(mixin.kind())),
            ContextValue::Number(visibility_code(mixin.introduced_member_visibility())),
            self.types_value(mixin.explicit_dependencies()),
            ContextValue::Array(vec![
                ContextValue::Text(origin.kind.clone()),
                ContextValue::Text(origin.module.clone()),
                ContextValue::Text(origin.location.clone()),
            ]),
        ])
    }

    pub fn serialize(&self, context: &ClassContext) -> ContextValue {
        ContextValue::Array(vec![
            self.type_value(context.class_type()),
            ContextValue::Array(context.mixins().map(|m| self.serialize_mixin(m)).collect()),
            self.types_value(context.composed_interfaces()),
        ])
    }
}

/// Reads class contexts written by [`ArrayClassContextSerializer`]
pub struct ArrayClassContextDeserializer<'u> {
    universe: &'u TypeUniverse,
}

impl<'u> ArrayClassContextDeserializer<'u> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self { universe }
    }

    fn array<'v>(value: &'v ContextValue, path: &str, len: Option<usize>) -> Result<&'v [ContextValue]> {
        match value {
            ContextValue::Array(items) if len.map_or(true, |n| items.len() == n) => Ok(items),
            _ => Err(SerializationError::Malformed {
                path: path.to_string(),
                expected: if len.is_some() {
                    "an array of fixed length"
                } else {
                    "an array"
                },
            }),
        }
    }

    fn text<'v>(value: &'v ContextValue, path: &str) -> Result<&'v str> {
        match value {
            ContextValue::Text(text) => Ok(text),
            _ => Err(SerializationError::Malformed {
                path: path.to_string(),
                expected: "text",
            }),
        }
    }

    fn number(value: &ContextValue, path: &str) -> Result<u32> {
        match value {
            ContextValue::Number(n) => Ok(*n),
            _ => Err(SerializationError::Malformed {
                path: path.to_string(),
                expected: "a number",
            }),
        }
    }

    fn type_ref(&self, value: &ContextValue, path: &str) -> Result<TypeRef> {
        let name = Self::text(value, path)?;
        self.universe
            .find(name)
            .ok_or_else(|| SerializationError::UnknownType {
                name: name.to_string(),
            })
    }

    fn type_refs(&self, value: &ContextValue, path: &str) -> Result<Vec<TypeRef>> {
        Self::array(value, path, None)?
            .iter()
            .enumerate()
            .map(|(idx, item)| self.type_ref(item, &format!("{path}[{idx}]")))
            .collect()
    }

    pub fn deserialize_mixin(&self, value: &ContextValue, path: &str) -> Result<MixinContext> {
        let fields = Self::array(value, path, Some(5))?;
        let mixin_type = self.type_ref(&fields[0], &format!("{path}[0]"))?;
        let kind = match Self::number(&fields[1], &format!("{path}[1]"))? {
            0 => MixinKind::Extending,
            1 => MixinKind::Used,
            value => return Err(SerializationError::InvalidValue { what: "mixin kind", value }),
        };
        let visibility = match Self::number(&fields[2], &format!("{path}[2]"))? {
            0 => MemberVisibility::Private,
            1 => MemberVisibility::Public,
            value => {
                return Err(SerializationError::InvalidValue {
                    what: "member visibility",
                    value,
                })
            }
        };
        let dependencies = self.type_refs(&fields[3], &format!("{path}[3]"))?;
        let origin_path = format!("{path}[4]");
        let origin = Self::array(&fields[4], &origin_path, Some(3))?;
        let origin = MixinContextOrigin::new(
            Self::text(&origin[0], &origin_path)?,
            Self::text(&origin[1], &origin_path)?,
            Self::text(&origin[2], &origin_path)?,
        );

        Ok(MixinContext::new(mixin_type, origin)
            .with_kind(kind)
            .with_visibility(visibility)
            .with_dependencies(dependencies))
    }

    pub fn deserialize(&self, value: &ContextValue) -> Result<ClassContext> {
        let fields = Self::array(value, "context", Some(3))?;
        let class_type = self.type_ref(&fields[0], "context[0]")?;
        let mixins = Self::array(&fields[1], "context[1]", None)?
            .iter()
            .enumerate()
            .map(|(idx, m)| self.deserialize_mixin(m, &format!("context[1][{idx}]")))
            .collect::<Result<Vec<_>>>()?;
        let composed = self.type_refs(&fields[2], "context[2]")?;
        Ok(ClassContext::new(self.universe, class_type, mixins, composed)?)
    }
}
