use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque contract handle scoped to template type `T`.
///
/// The type parameter only prevents handing a `ContractId<License>` to an
/// operation expecting another template; it carries no ownership semantics.
pub struct ContractId<T> {
    id: String,
    _template: PhantomData<fn() -> T>,
}

impl<T> ContractId<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            _template: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn into_string(self) -> String {
        self.id
    }

    /// View the same contract through another type, e.g. an interface.
    pub fn cast<U>(self) -> ContractId<U> {
        ContractId::new(self.id)
    }
}

impl<T> Clone for ContractId<T> {
    fn clone(&self) -> Self {
        Self::new(self.id.clone())
    }
}

impl<T> PartialEq for ContractId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ContractId<T> {}

impl<T> Hash for ContractId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for ContractId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractId({})", self.id)
    }
}

impl<T> fmt::Display for ContractId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl<T> Serialize for ContractId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de, T> Deserialize<'de> for ContractId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A read-only snapshot of a ledger contract.
///
/// Contracts are never mutated: an "update" archives the contract and
/// creates a new one with a new id.
#[derive(Clone, Debug, PartialEq)]
pub struct Contract<T> {
    pub contract_id: ContractId<T>,
    pub payload: T,
}

impl<T> Contract<T> {
    pub fn new(contract_id: ContractId<T>, payload: T) -> Self {
        Self {
            contract_id,
            payload,
        }
    }
}
