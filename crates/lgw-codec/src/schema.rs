use std::fmt;

/// Largest scale a ledger numeric may declare.
pub const MAX_NUMERIC_SCALE: u32 = 37;

/// Total digits a ledger numeric may hold.
pub const NUMERIC_PRECISION: u32 = 38;

/// Declared shape of a template payload, choice argument, or choice result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Unit,
    Bool,
    Int64,
    Numeric { scale: u32 },
    Text,
    Party,
    ContractId,
    Timestamp,
    Date,
    Optional(Box<Type>),
    List(Box<Type>),
    TextMap(Box<Type>),
    Record(Vec<Field>),
    Variant(Vec<Field>),
    Enum(Vec<String>),
}

/// A named record field or variant constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Type {
    pub fn optional(inner: Type) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(inner: Type) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn text_map(inner: Type) -> Self {
        Self::TextMap(Box::new(inner))
    }

    /// The ledger's default `Decimal`, a numeric with scale 10.
    pub fn decimal() -> Self {
        Self::Numeric { scale: 10 }
    }

    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(name, ty)| Field::new(name, ty))
                .collect(),
        )
    }

    pub fn variant<I, S>(constructors: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Self::Variant(
            constructors
                .into_iter()
                .map(|(name, ty)| Field::new(name, ty))
                .collect(),
        )
    }

    pub fn enumeration<I, S>(constructors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(constructors.into_iter().map(Into::into).collect())
    }

    /// `RelTime` as declared by the ledger standard library.
    pub fn rel_time() -> Self {
        Self::record([("microseconds", Type::Int64)])
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "Unit",
            Self::Bool => "Bool",
            Self::Int64 => "Int64",
            Self::Numeric { .. } => "Numeric",
            Self::Text => "Text",
            Self::Party => "Party",
            Self::ContractId => "ContractId",
            Self::Timestamp => "Timestamp",
            Self::Date => "Date",
            Self::Optional(_) => "Optional",
            Self::List(_) => "List",
            Self::TextMap(_) => "TextMap",
            Self::Record(_) => "Record",
            Self::Variant(_) => "Variant",
            Self::Enum(_) => "Enum",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric { scale } => write!(f, "Numeric {scale}"),
            Self::Optional(inner) => write!(f, "Optional ({inner})"),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::TextMap(inner) => write!(f, "TextMap ({inner})"),
            other => f.write_str(other.kind()),
        }
    }
}
