use serde::{Deserialize, Deserializer};

/// One field of a sparse update payload.
///
/// `Unset` leaves the target untouched, `Set` overwrites it. Nullable targets
/// are patched through `Patch<Option<T>>`: an explicit JSON `null` becomes
/// `Set(None)` and clears the value, while an absent key stays `Unset`.
///
/// Payload fields must carry `#[serde(default)]` so that a missing key
/// deserializes to `Unset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unset => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Set(value) => Patch::Set(f(value)),
            Patch::Unset => Patch::Unset,
        }
    }
}

/// `Some` sets, `None` leaves the field alone. Use `Patch::Set(None)` to
/// clear a nullable field.
impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Patch::Unset, Patch::Set)
    }
}

impl<T: Clone> Patch<T> {
    /// Overwrites `target` when the field is present.
    pub fn apply_to(&self, target: &mut T) {
        if let Patch::Set(value) = self {
            *target = value.clone();
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Patch::Set)
    }
}
