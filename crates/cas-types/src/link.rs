use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::hash::ObjectHash;

/// The four kinds of object that make up the content DAG.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Leaf content.
    Blob,
    /// Ordered aggregation whose bytes are the concatenation of its children.
    List,
    /// Named aggregation, in insertion order.
    Tree,
    /// Versioned snapshot with an optional parent.
    Commit,
}

impl ObjectType {
    /// Lowercase name, also used as the on-disk type directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::List => "list",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, named reference to a content-addressed object.
///
/// Two links are equal when their type and primary hash match; `name` is
/// cosmetic and ignored by `PartialEq` and `Hash`. A link never carries the
/// secondary hash, which lives in the metadata entry for `primary_hash`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Link {
    pub object_type: ObjectType,
    pub primary_hash: ObjectHash,
    pub name: String,
}

impl Link {
    pub fn new(object_type: ObjectType, primary_hash: ObjectHash, name: impl Into<String>) -> Self {
        Self {
            object_type,
            primary_hash,
            name: name.into(),
        }
    }

    /// The "no object" link, used for the parent of a root commit.
    pub fn null() -> Self {
        Self::new(ObjectType::Commit, ObjectHash::null(), "")
    }

    /// Returns `true` if this link points at nothing.
    pub fn is_null(&self) -> bool {
        self.primary_hash.is_null()
    }

    /// Same target, different display name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.object_type, self.primary_hash, name)
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.object_type == other.object_type && self.primary_hash == other.primary_hash
    }
}

impl Eq for Link {}

impl Hash for Link {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_type.hash(state);
        self.primary_hash.hash(state);
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Link({} {} {:?})",
            self.object_type,
            self.primary_hash.short_hex(),
            self.name
        )
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.primary_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_ignores_name() {
        let hash = ObjectHash::from_hash([3; 32]);
        let a = Link::new(ObjectType::Blob, hash, "a.txt");
        let b = Link::new(ObjectType::Blob, hash, "b.txt");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn equality_respects_type() {
        let hash = ObjectHash::from_hash([3; 32]);
        let blob = Link::new(ObjectType::Blob, hash, "");
        let list = Link::new(ObjectType::List, hash, "");
        assert_ne!(blob, list);
    }

    #[test]
    fn null_link() {
        assert!(Link::null().is_null());
        assert!(!Link::new(ObjectType::Blob, ObjectHash::from_hash([1; 32]), "").is_null());
    }

    #[test]
    fn renamed_keeps_target() {
        let link = Link::new(ObjectType::Tree, ObjectHash::from_hash([9; 32]), "old");
        let renamed = link.renamed("new");
        assert_eq!(renamed, link);
        assert_eq!(renamed.name, "new");
    }

    #[test]
    fn object_type_display() {
        assert_eq!(ObjectType::Blob.to_string(), "blob");
        assert_eq!(ObjectType::List.to_string(), "list");
        assert_eq!(ObjectType::Tree.to_string(), "tree");
        assert_eq!(ObjectType::Commit.to_string(), "commit");
    }

    #[test]
    fn object_type_serde_is_lowercase() {
        let json = serde_json::to_string(&ObjectType::Commit).unwrap();
        assert_eq!(json, "\"commit\"");
    }
}
