//! Nested document collections.
//!
//! A [`DocumentArray`] is an arena: every document, root or nested chunk,
//! lives in one `Vec` and is addressed by a [`DocId`]. Chunks and matches are
//! stored as id lists, so matches may point anywhere in the collection
//! without creating ownership cycles.

pub mod matching;
pub mod traversal;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a document inside its [`DocumentArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(usize);

/// A scored reference to another document in the same array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocMatch {
    pub doc: DocId,
    pub score: f32,
}

/// A single document record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    chunks: Vec<DocId>,
    matches: Vec<DocMatch>,
}

impl Document {
    /// An empty document with a fresh UUID v7 identifier.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::now_v7().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: None,
            embedding: None,
            chunks: Vec::new(),
            matches: Vec::new(),
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new().text(text)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// True when the document carries text worth encoding.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn chunks(&self) -> &[DocId] {
        &self.chunks
    }

    pub fn matches(&self) -> &[DocMatch] {
        &self.matches
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered collection of root documents plus everything nested below them.
#[derive(Debug, Clone, Default)]
pub struct DocumentArray {
    docs: Vec<Document>,
    roots: Vec<DocId>,
    by_id: HashMap<String, DocId>,
}

impl DocumentArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of root documents.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of documents at any depth.
    pub fn total_len(&self) -> usize {
        self.docs.len()
    }

    pub fn roots(&self) -> &[DocId] {
        &self.roots
    }

    /// Append a root document.
    pub fn push(&mut self, doc: Document) -> DocId {
        let id = self.insert(doc);
        self.roots.push(id);
        id
    }

    /// Append `doc` to the chunks of `parent`.
    pub fn add_chunk(&mut self, parent: DocId, doc: Document) -> DocId {
        let id = self.insert(doc);
        self.docs[parent.0].chunks.push(id);
        id
    }

    /// Replace the matches of `doc`.
    pub fn set_matches(&mut self, doc: DocId, matches: Vec<DocMatch>) {
        self.docs[doc.0].matches = matches;
    }

    fn insert(&mut self, mut doc: Document) -> DocId {
        let id = DocId(self.docs.len());
        doc.chunks.clear();
        doc.matches.clear();
        // First document wins on duplicate identifiers.
        self.by_id.entry(doc.id.clone()).or_insert(id);
        self.docs.push(doc);
        id
    }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.docs.get(id.0)
    }

    pub fn get_mut(&mut self, id: DocId) -> Option<&mut Document> {
        self.docs.get_mut(id.0)
    }

    /// Look a document up by its string identifier.
    pub fn find(&self, id: &str) -> Option<DocId> {
        self.by_id.get(id).copied()
    }

    /// Embeddings of `ids`, in order. `None` where a document has none.
    pub fn embeddings(&self, ids: &[DocId]) -> Vec<Option<&[f32]>> {
        ids.iter()
            .map(|id| self.get(*id).and_then(|d| d.embedding.as_deref()))
            .collect()
    }

    /// Identifiers of `ids`, in order.
    pub fn ids_of(&self, ids: &[DocId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|id| self.get(*id).map(|d| d.id.as_str()))
            .collect()
    }

    /// Build an array from serialized trees. Match references are resolved
    /// by identifier once every document is in place; unknown targets are
    /// dropped with a warning.
    pub fn from_trees(trees: Vec<DocumentTree>) -> Self {
        let mut array = Self::new();
        let mut pending = Vec::new();
        for tree in trees {
            let root = array.push(tree.to_document());
            array.insert_children(root, tree, &mut pending);
        }
        for (doc, refs) in pending {
            let matches = refs
                .into_iter()
                .filter_map(|r| match array.find(&r.id) {
                    Some(target) => Some(DocMatch {
                        doc: target,
                        score: r.score,
                    }),
                    None => {
                        tracing::warn!(target_id = %r.id, "dropping match to unknown document");
                        None
                    }
                })
                .collect();
            array.set_matches(doc, matches);
        }
        array
    }

    fn insert_children(
        &mut self,
        id: DocId,
        tree: DocumentTree,
        pending: &mut Vec<(DocId, Vec<MatchRef>)>,
    ) {
        if !tree.matches.is_empty() {
            pending.push((id, tree.matches));
        }
        for chunk in tree.chunks {
            let child = self.add_chunk(id, chunk.to_document());
            self.insert_children(child, chunk, pending);
        }
    }

    /// Serialize back into nested trees, roots in order.
    pub fn to_trees(&self) -> Vec<DocumentTree> {
        self.roots.iter().map(|id| self.tree_of(*id)).collect()
    }

    fn tree_of(&self, id: DocId) -> DocumentTree {
        let doc = &self.docs[id.0];
        DocumentTree {
            id: Some(doc.id.clone()),
            text: doc.text.clone(),
            embedding: doc.embedding.clone(),
            chunks: doc.chunks.iter().map(|c| self.tree_of(*c)).collect(),
            matches: doc
                .matches
                .iter()
                .map(|m| MatchRef {
                    id: self.docs[m.doc.0].id.clone(),
                    score: m.score,
                })
                .collect(),
        }
    }
}

impl std::ops::Index<DocId> for DocumentArray {
    type Output = Document;

    fn index(&self, id: DocId) -> &Document {
        &self.docs[id.0]
    }
}

/// JSON shape of a document and its nested chunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<DocumentTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MatchRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRef {
    pub id: String,
    pub score: f32,
}

impl DocumentTree {
    fn to_document(&self) -> Document {
        let mut doc = match &self.id {
            Some(id) => Document::with_id(id.clone()),
            None => Document::new(),
        };
        doc.text = self.text.clone();
        doc.embedding = self.embedding.clone();
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_nest() {
        let mut docs = DocumentArray::new();
        let root = docs.push(Document::with_id("root").text("hello"));
        let chunk = docs.add_chunk(root, Document::with_id("chunk"));

        assert_eq!(docs.len(), 1);
        assert_eq!(docs.total_len(), 2);
        assert_eq!(docs[root].chunks(), &[chunk]);
        assert!(docs[chunk].chunks().is_empty());
        assert_eq!(docs.find("chunk"), Some(chunk));
    }

    #[test]
    fn has_text_ignores_whitespace() {
        assert!(Document::with_text("hi").has_text());
        assert!(!Document::with_text("  \n").has_text());
        assert!(!Document::new().has_text());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = Document::new();
        let b = Document::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let json = r#"[
            {"id": "r1", "text": "root", "chunks": [
                {"id": "c1", "text": "child", "chunks": [{"id": "g1"}]}
            ], "matches": [{"id": "c1", "score": 0.5}, {"id": "missing", "score": 0.1}]},
            {"text": "anonymous"}
        ]"#;
        let trees: Vec<DocumentTree> = serde_json::from_str(json).unwrap();
        let docs = DocumentArray::from_trees(trees);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs.total_len(), 4);
        let r1 = docs.find("r1").unwrap();
        assert_eq!(docs[r1].matches().len(), 1);
        assert_eq!(docs[r1].matches()[0].doc, docs.find("c1").unwrap());

        let out = docs.to_trees();
        assert_eq!(out[0].id.as_deref(), Some("r1"));
        assert_eq!(out[0].chunks[0].chunks[0].id.as_deref(), Some("g1"));
        assert!(out[1].id.is_some());
        assert_eq!(out[1].text.as_deref(), Some("anonymous"));
    }
}
