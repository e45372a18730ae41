//! Entity and attribute descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared value type of an expression or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Integer,
    Long,
    Double,
    Decimal,
    String,
    Character,
    Date,
    Time,
    Timestamp,
    Object,
    /// A managed entity or embeddable, by name.
    Entity(String),
    /// A collection of elements.
    Collection(Box<ValueType>),
}

impl ValueType {
    pub fn entity(name: impl Into<String>) -> Self {
        ValueType::Entity(name.into())
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, ValueType::Boolean)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Integer | ValueType::Long | ValueType::Double | ValueType::Decimal
        )
    }

    /// Entity name, if this is an entity type.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            ValueType::Entity(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::Integer => write!(f, "Integer"),
            ValueType::Long => write!(f, "Long"),
            ValueType::Double => write!(f, "Double"),
            ValueType::Decimal => write!(f, "BigDecimal"),
            ValueType::String => write!(f, "String"),
            ValueType::Character => write!(f, "Character"),
            ValueType::Date => write!(f, "Date"),
            ValueType::Time => write!(f, "Time"),
            ValueType::Timestamp => write!(f, "Timestamp"),
            ValueType::Object => write!(f, "Object"),
            ValueType::Entity(name) => write!(f, "{}", name),
            ValueType::Collection(element) => write!(f, "Collection<{}>", element),
        }
    }
}

/// Kind of a plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Collection,
    List,
    Set,
    Map,
}

/// Singular vs. plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Plurality {
    Singular,
    Plural(CollectionKind),
}

/// What an attribute holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    /// A basic (non-relational) value.
    Basic {
        #[serde(rename = "type")]
        value_type: ValueType,
    },
    /// An embedded value object.
    Embedded { target: String },
    /// A single-valued association (many-to-one, one-to-one).
    Association { target: String },
    /// A collection-valued association.
    Plural {
        collection: CollectionKind,
        target: String,
    },
}

/// An attribute of a managed type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Associations and collections.
    pub fn is_relational(&self) -> bool {
        matches!(
            self.kind,
            AttributeKind::Association { .. } | AttributeKind::Plural { .. }
        )
    }

    /// Whether a join may be created through this attribute.
    pub fn is_joinable(&self) -> bool {
        !matches!(self.kind, AttributeKind::Basic { .. })
    }

    pub fn plurality(&self) -> Plurality {
        match self.kind {
            AttributeKind::Plural { collection, .. } => Plurality::Plural(collection),
            _ => Plurality::Singular,
        }
    }

    /// Name of the managed type this attribute points at.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Basic { .. } => None,
            AttributeKind::Embedded { target }
            | AttributeKind::Association { target }
            | AttributeKind::Plural { target, .. } => Some(target),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match &self.kind {
            AttributeKind::Basic { value_type } => value_type.clone(),
            AttributeKind::Embedded { target } | AttributeKind::Association { target } => {
                ValueType::Entity(target.clone())
            }
            AttributeKind::Plural { target, .. } => {
                ValueType::Collection(Box::new(ValueType::Entity(target.clone())))
            }
        }
    }
}

/// A managed type (entity or embeddable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<Attribute>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn basic(self, name: &str, value_type: ValueType) -> Self {
        self.with_attribute(Attribute::new(name, AttributeKind::Basic { value_type }))
    }

    pub fn embedded(self, name: &str, target: &str) -> Self {
        self.with_attribute(Attribute::new(
            name,
            AttributeKind::Embedded {
                target: target.into(),
            },
        ))
    }

    pub fn association(self, name: &str, target: &str) -> Self {
        self.with_attribute(Attribute::new(
            name,
            AttributeKind::Association {
                target: target.into(),
            },
        ))
    }

    pub fn plural(self, name: &str, collection: CollectionKind, target: &str) -> Self {
        self.with_attribute(Attribute::new(
            name,
            AttributeKind::Plural {
                collection,
                target: target.into(),
            },
        ))
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
