//! Field paths: positional addresses into a class's nested fields.

use std::cmp::Ordering;
use std::fmt;

/// Maximum nesting depth of a field path.
pub const MAX_PATH_DEPTH: usize = 7;

/// A sequence of up to [`MAX_PATH_DEPTH`] indices addressing one property.
///
/// The first index selects a field of the class serializer. Further indices
/// select an array element or a field of a nested serializer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    components: [u32; MAX_PATH_DEPTH],
    len: u8,
}

impl FieldPath {
    /// Creates a path from its components, or `None` if it is empty or too deep.
    #[must_use]
    pub fn new(components: &[u32]) -> Option<Self> {
        if components.is_empty() || components.len() > MAX_PATH_DEPTH {
            return None;
        }
        let mut path = Self::default();
        path.components[..components.len()].copy_from_slice(components);
        path.len = components.len() as u8;
        Some(path)
    }

    /// Returns the path components.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.components[..usize::from(self.len)]
    }

    /// Returns the number of components.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` for the empty path.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a component, returning `false` when the path is full.
    pub fn push(&mut self, component: u32) -> bool {
        let len = usize::from(self.len);
        if len == MAX_PATH_DEPTH {
            return false;
        }
        self.components[len] = component;
        self.len += 1;
        true
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.as_slice().starts_with(self.as_slice())
    }
}

impl Ord for FieldPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl PartialOrd for FieldPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath{:?}", self.as_slice())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_slice())
    }
}
