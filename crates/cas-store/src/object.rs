//! The object model: Blob, List, Tree and Commit.
//!
//! Objects are serialized with `bincode` into a canonical byte form: the
//! variant tag first, then fields in declaration order, with fixed-width
//! little-endian integers and length-prefixed sequences. Two equal objects
//! always encode to the same bytes, which is what makes them addressable by
//! hash. Changing field order or types here changes every hash in the store.
//!
//! Link names are part of the encoding, so object equality compares them
//! even though [`Link`] equality alone does not.

use cas_types::{Link, ObjectHash, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Leaf content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Horizontal aggregation: the bytes of a list are the concatenation of its
/// children's bytes, in order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct List {
    pub links: Vec<Link>,
}

impl List {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Named aggregation, directory-like.
///
/// Entries keep insertion order; they are not sorted, so the same links in a
/// different order form a different tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tree {
    pub links: Vec<Link>,
}

impl Tree {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A versioned snapshot.
///
/// A root commit stores [`Link::null`] as its parent; use
/// [`Commit::parent`] to read it as an `Option`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    pub unix_timestamp: i64,
    pub message: String,
    pub parent_link: Link,
    pub committed_object_link: Link,
    pub author_link: Link,
}

impl Commit {
    pub fn new(
        unix_timestamp: i64,
        message: impl Into<String>,
        parent: Option<Link>,
        committed_object_link: Link,
        author_link: Link,
    ) -> Self {
        Self {
            unix_timestamp,
            message: message.into(),
            parent_link: parent.unwrap_or_else(Link::null),
            committed_object_link,
            author_link,
        }
    }

    /// The parent commit, or `None` at the root of history.
    pub fn parent(&self) -> Option<&Link> {
        if self.parent_link.is_null() {
            None
        } else {
            Some(&self.parent_link)
        }
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

fn same_link(a: &Link, b: &Link) -> bool {
    a == b && a.name == b.name
}

fn same_links(a: &[Link], b: &[Link]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_link(a, b))
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        same_links(&self.links, &other.links)
    }
}

impl Eq for List {}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        same_links(&self.links, &other.links)
    }
}

impl Eq for Tree {}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.unix_timestamp == other.unix_timestamp
            && self.message == other.message
            && same_link(&self.parent_link, &other.parent_link)
            && same_link(&self.committed_object_link, &other.committed_object_link)
            && same_link(&self.author_link, &other.author_link)
    }
}

impl Eq for Commit {}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

/// Any storable object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    Blob(Blob),
    List(List),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Blob(_) => ObjectType::Blob,
            Self::List(_) => ObjectType::List,
            Self::Tree(_) => ObjectType::Tree,
            Self::Commit(_) => ObjectType::Commit,
        }
    }

    /// Canonical bytes: the input to both hashes and what the blob store
    /// holds.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode canonical bytes. `hash` only labels the error.
    pub fn decode(bytes: &[u8], hash: &ObjectHash) -> StoreResult<Self> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt {
            hash: *hash,
            reason: e.to_string(),
        })
    }

    /// Decode bytes stored under `link` and check the type matches.
    pub fn decode_for(link: &Link, bytes: &[u8]) -> StoreResult<Self> {
        let object = Self::decode(bytes, &link.primary_hash)?;
        if object.object_type() != link.object_type {
            return Err(StoreError::Corrupt {
                hash: link.primary_hash,
                reason: format!("expected {}, got {}", link.object_type, object.object_type()),
            });
        }
        Ok(object)
    }

    /// Outgoing links, in stored order. Empty for blobs; for commits the
    /// order is parent (when present), author, content.
    pub fn links(&self) -> Vec<&Link> {
        match self {
            Self::Blob(_) => Vec::new(),
            Self::List(list) => list.links.iter().collect(),
            Self::Tree(tree) => tree.links.iter().collect(),
            Self::Commit(commit) => commit
                .parent()
                .into_iter()
                .chain([&commit.author_link, &commit.committed_object_link])
                .collect(),
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<List> for Object {
    fn from(list: List) -> Self {
        Self::List(list)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Self::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Self::Commit(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(t: ObjectType, byte: u8, name: &str) -> Link {
        Link::new(t, ObjectHash::from_hash([byte; 32]), name)
    }

    #[test]
    fn blob_roundtrip() {
        let object = Object::from(Blob::new(b"hello world".to_vec()));
        let bytes = object.encode().unwrap();
        assert_eq!(Object::decode(&bytes, &ObjectHash::null()).unwrap(), object);
    }

    #[test]
    fn commit_roundtrip_keeps_null_parent() {
        let commit = Commit::new(
            1_700_000_000,
            "initial",
            None,
            link(ObjectType::Tree, 1, "root"),
            link(ObjectType::Blob, 2, "author"),
        );
        assert!(commit.parent().is_none());
        let object = Object::from(commit);
        let decoded = Object::decode(&object.encode().unwrap(), &ObjectHash::null()).unwrap();
        let Object::Commit(decoded) = decoded else {
            panic!("expected commit");
        };
        assert!(decoded.parent().is_none());
        assert_eq!(decoded.message, "initial");
    }

    #[test]
    fn encoding_is_canonical() {
        let a = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "a")]));
        let b = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "a")]));
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn equality_follows_encoding_for_entry_names() {
        let a = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "a.txt")]));
        let b = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "b.txt")]));
        assert_ne!(a.encode().unwrap(), b.encode().unwrap());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let commit = |author: &str| {
            Object::from(Commit::new(
                1,
                "m",
                None,
                link(ObjectType::Tree, 1, "root"),
                link(ObjectType::Blob, 2, author),
            ))
        };
        assert_ne!(commit("alice"), commit("bob"));
        assert_eq!(commit("alice"), commit("alice"));
    }

    #[test]
    fn encoding_distinguishes_types() {
        let links = vec![link(ObjectType::Blob, 1, "a")];
        let list = Object::from(List::new(links.clone())).encode().unwrap();
        let tree = Object::from(Tree::new(links)).encode().unwrap();
        assert_ne!(list, tree);
    }

    #[test]
    fn tree_keeps_insertion_order() {
        let forward = Tree::new(vec![link(ObjectType::Blob, 1, "z"), link(ObjectType::Blob, 2, "a")]);
        let reversed = Tree::new(vec![link(ObjectType::Blob, 2, "a"), link(ObjectType::Blob, 1, "z")]);
        assert_eq!(forward.links[0].name, "z");
        assert_ne!(
            Object::from(forward).encode().unwrap(),
            Object::from(reversed).encode().unwrap()
        );
    }

    #[test]
    fn names_are_part_of_the_encoding() {
        let a = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "a.txt")]));
        let b = Object::from(Tree::new(vec![link(ObjectType::Blob, 1, "b.txt")]));
        assert_ne!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn decode_for_rejects_type_mismatch() {
        let bytes = Object::from(Blob::new(b"x".to_vec())).encode().unwrap();
        let err = Object::decode_for(&link(ObjectType::List, 9, ""), &bytes).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn decode_garbage_is_corrupt() {
        let err = Object::decode(&[0xff; 3], &ObjectHash::null()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn tree_get_entry() {
        let tree = Tree::new(vec![link(ObjectType::Blob, 1, "a.txt"), link(ObjectType::List, 2, "b.bin")]);
        assert_eq!(tree.get("b.bin").unwrap().object_type, ObjectType::List);
        assert!(tree.get("missing").is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn commit_links_order() {
        let parent = link(ObjectType::Commit, 3, "");
        let commit = Commit::new(
            0,
            "second",
            Some(parent.clone()),
            link(ObjectType::Tree, 1, ""),
            link(ObjectType::Blob, 2, ""),
        );
        let object = Object::from(commit);
        let links = object.links();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0], &parent);
        assert_eq!(links[1].object_type, ObjectType::Blob);
        assert_eq!(links[2].object_type, ObjectType::Tree);
    }
}
