//! Expansion of a root link into every link reachable from it.
//!
//! Order is depth-first with the parent before its children:
//!
//! - a Blob resolves to itself;
//! - a List or Tree resolves to itself followed by each child's resolution,
//!   in stored order (Blob children are appended without loading them);
//! - a Commit resolves to itself, then its author, then its content, and,
//!   with history requested, the same for each ancestor commit in turn.
//!
//! Links are not de-duplicated: content referenced twice appears twice.

use std::sync::Arc;

use cas_store::{load_object, BlobStore, Object};
use cas_types::{Link, ObjectType};
use tracing::debug;

use crate::error::{DagError, DagResult};

/// Default bound on List/Tree nesting.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Resolves links against a blob store.
#[derive(Clone)]
pub struct GraphResolver {
    blobs: Arc<dyn BlobStore>,
    max_depth: usize,
}

impl GraphResolver {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit how deeply Lists and Trees may nest below the root.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every link reachable from `link`, `link` first.
    ///
    /// With `include_history`, commit parents are followed all the way to the
    /// root of history. Any object that fails to load aborts the whole call
    /// with [`DagError::Resolution`].
    pub fn resolve(&self, link: &Link, include_history: bool) -> DagResult<Vec<Link>> {
        let mut out = Vec::new();
        self.expand(link, link, include_history, 0, &mut out)?;
        debug!(
            root = %link.primary_hash.short_hex(),
            object_type = %link.object_type,
            include_history,
            links = out.len(),
            "resolved graph"
        );
        Ok(out)
    }

    fn expand(
        &self,
        root: &Link,
        link: &Link,
        include_history: bool,
        depth: usize,
        out: &mut Vec<Link>,
    ) -> DagResult<()> {
        if depth > self.max_depth {
            return Err(DagError::DepthExceeded {
                root: root.clone(),
                limit: self.max_depth,
            });
        }
        match link.object_type {
            ObjectType::Blob => out.push(link.clone()),
            ObjectType::List | ObjectType::Tree => {
                let children = match self.load(link)? {
                    Object::List(list) => list.links,
                    Object::Tree(tree) => tree.links,
                    _ => Vec::new(),
                };
                out.push(link.clone());
                for child in &children {
                    if child.object_type == ObjectType::Blob {
                        out.push(child.clone());
                    } else {
                        self.expand(root, child, include_history, depth + 1, out)?;
                    }
                }
            }
            ObjectType::Commit => self.expand_commits(root, link, include_history, depth, out)?,
        }
        Ok(())
    }

    /// Walk a commit and, with history, its ancestors without recursing on
    /// the parent chain.
    fn expand_commits(
        &self,
        root: &Link,
        link: &Link,
        include_history: bool,
        depth: usize,
        out: &mut Vec<Link>,
    ) -> DagResult<()> {
        let mut next = Some(link.clone());
        while let Some(current) = next.take() {
            let Object::Commit(commit) = self.load(&current)? else {
                break;
            };
            out.push(current);
            self.expand(root, &commit.author_link, include_history, depth + 1, out)?;
            self.expand(root, &commit.committed_object_link, include_history, depth + 1, out)?;
            if include_history {
                next = commit.parent().cloned();
            }
        }
        Ok(())
    }

    fn load(&self, link: &Link) -> DagResult<Object> {
        load_object(self.blobs.as_ref(), link).map_err(|source| DagError::Resolution {
            link: link.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for GraphResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphResolver")
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_crypto::HashEngine;
    use cas_store::{Blob, Commit, InMemoryBlobStore, List, StoreError, Tree};
    use cas_types::ObjectHash;
    use proptest::prelude::*;

    struct Graph {
        store: Arc<InMemoryBlobStore>,
        engine: HashEngine,
    }

    impl Graph {
        fn new() -> Self {
            Self {
                store: Arc::new(InMemoryBlobStore::new()),
                engine: HashEngine::default(),
            }
        }

        fn put(&self, name: &str, object: Object) -> Link {
            let bytes = object.encode().unwrap();
            let link = Link::new(object.object_type(), self.engine.primary_hash(&bytes), name);
            self.store.write(&link, &bytes).unwrap();
            link
        }

        fn blob(&self, data: &[u8]) -> Link {
            self.put("", Blob::new(data.to_vec()).into())
        }

        fn list(&self, links: Vec<Link>) -> Link {
            self.put("", List::new(links).into())
        }

        fn commit(&self, message: &str, parent: Option<Link>) -> (Link, Link, Link) {
            let author = self.blob(format!("author of {message}").as_bytes());
            let content = self.put("", Tree::new(vec![self.blob(message.as_bytes()).renamed("file")]).into());
            let commit = self.put(
                "",
                Commit::new(0, message, parent, content.clone(), author.clone()).into(),
            );
            (commit, author, content)
        }

        fn resolver(&self) -> GraphResolver {
            GraphResolver::new(self.store.clone())
        }
    }

    #[test]
    fn blob_resolves_to_itself() {
        let g = Graph::new();
        let b = g.blob(b"leaf");
        assert_eq!(g.resolver().resolve(&b, false).unwrap(), vec![b]);
    }

    #[test]
    fn blob_is_not_loaded() {
        let g = Graph::new();
        let ghost = Link::new(ObjectType::Blob, ObjectHash::from_hash([4; 32]), "");
        assert_eq!(g.resolver().resolve(&ghost, false).unwrap(), vec![ghost]);
    }

    #[test]
    fn tree_lists_children_in_order() {
        let g = Graph::new();
        let a = g.blob(b"a").renamed("a.txt");
        let b = g.blob(b"b").renamed("b.txt");
        let sub = g.put("", Tree::new(vec![a.clone()]).into()).renamed("sub");
        let root = g.put("root", Tree::new(vec![b.clone(), sub.clone()]).into());

        let links = g.resolver().resolve(&root, false).unwrap();
        assert_eq!(links, vec![root, b, sub, a]);
    }

    #[test]
    fn commit_without_history() {
        let g = Graph::new();
        let (c1, _, _) = g.commit("first", None);
        let (c2, author2, content2) = g.commit("second", Some(c1));

        let links = g.resolver().resolve(&c2, false).unwrap();
        // Commit, author, then the content tree and its file.
        assert_eq!(links[0], c2);
        assert_eq!(links[1], author2);
        assert_eq!(links[2], content2);
        let direct: Vec<_> = links
            .iter()
            .filter(|l| l.object_type != ObjectType::Blob || **l == author2)
            .collect();
        assert_eq!(direct.len(), 3);
    }

    #[test]
    fn commit_edges_with_and_without_history() {
        let g = Graph::new();
        let author = g.blob(b"author");
        let content1 = g.blob(b"v1");
        let content2 = g.blob(b"v2");
        let c1 = g.put("", Commit::new(1, "one", None, content1.clone(), author.clone()).into());
        let c2 = g.put(
            "",
            Commit::new(2, "two", Some(c1.clone()), content2.clone(), author.clone()).into(),
        );

        let resolver = g.resolver();
        let shallow = resolver.resolve(&c2, false).unwrap();
        assert_eq!(shallow, vec![c2.clone(), author.clone(), content2.clone()]);

        let deep = resolver.resolve(&c2, true).unwrap();
        assert_eq!(deep, vec![c2, author.clone(), content2, c1, author, content1]);
    }

    #[test]
    fn long_history_is_walked_iteratively() {
        let g = Graph::new();
        let author = g.blob(b"author");
        let mut head = None;
        for i in 0..2000 {
            let content = g.blob(format!("rev {i}").as_bytes());
            head = Some(g.put("", Commit::new(i, "rev", head, content, author.clone()).into()));
        }
        let head = head.unwrap();
        let links = g.resolver().with_max_depth(8).resolve(&head, true).unwrap();
        assert_eq!(links.len(), 2000 * 3);
    }

    #[test]
    fn nested_lists_count_every_object() {
        let g = Graph::new();
        let chunks: Vec<Link> = (0..5u8).map(|i| g.blob(&[i])).collect();
        let inner1 = g.list(chunks[..3].to_vec());
        let inner2 = g.list(chunks[3..].to_vec());
        let root = g.list(vec![inner1.clone(), inner2.clone()]);

        let links = g.resolver().resolve(&root, false).unwrap();
        assert_eq!(links.len(), 5 + 3);
        assert_eq!(links[0], root);
        assert_eq!(links[1], inner1);
        assert_eq!(links[5], inner2);
    }

    #[test]
    fn missing_child_fails_whole_call() {
        let g = Graph::new();
        let ghost = Link::new(ObjectType::List, ObjectHash::from_hash([8; 32]), "");
        let root = g.list(vec![g.blob(b"ok"), ghost.clone()]);

        let err = g.resolver().resolve(&root, false).unwrap_err();
        assert!(matches!(
            err,
            DagError::Resolution { link, source: StoreError::NotFound(_) } if link == ghost
        ));
    }

    #[test]
    fn missing_parent_fails_with_history_only() {
        let g = Graph::new();
        let author = g.blob(b"a");
        let content = g.blob(b"c");
        let ghost = Link::new(ObjectType::Commit, ObjectHash::from_hash([6; 32]), "");
        let c = g.put("", Commit::new(0, "orphan", Some(ghost), content, author).into());

        assert_eq!(g.resolver().resolve(&c, false).unwrap().len(), 3);
        assert!(matches!(
            g.resolver().resolve(&c, true),
            Err(DagError::Resolution { .. })
        ));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let g = Graph::new();
        let mut link = g.list(vec![g.blob(b"bottom")]);
        for _ in 0..4 {
            link = g.list(vec![link]);
        }
        assert!(g.resolver().with_max_depth(10).resolve(&link, false).is_ok());
        assert!(matches!(
            g.resolver().with_max_depth(2).resolve(&link, false),
            Err(DagError::DepthExceeded { limit: 2, .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn flat_list_resolves_to_root_plus_children(n in 0usize..40) {
            let g = Graph::new();
            let chunks: Vec<Link> = (0..n).map(|i| g.blob(&(i as u32).to_le_bytes())).collect();
            let root = g.list(chunks.clone());
            let links = g.resolver().resolve(&root, false).unwrap();
            prop_assert_eq!(links.len(), n + 1);
            prop_assert_eq!(&links[1..], &chunks[..]);
        }
    }
}
