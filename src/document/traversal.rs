//! Traversal paths: selecting documents inside a nested collection.
//!
//! Syntax: an optional leading `@`, then comma-separated branches. Each
//! branch walks from the roots: `r` selects the roots themselves, every `c`
//! steps into chunks and every `m` into matches. A `*` after `c` or `m`
//! makes that step recursive. `@r` is the roots, `@c` their chunks, `@cc`
//! the chunks of those, `@cc,r` the union of grandchildren and roots, `@c*`
//! every nested chunk.

use std::collections::HashSet;

use thiserror::Error;

use super::{DocId, DocumentArray};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error("traversal path is empty")]
    Empty,
    #[error("empty branch in traversal path {0:?}")]
    EmptyBranch(String),
    #[error("unknown selector {token:?} in traversal branch {branch:?}")]
    UnknownToken { token: char, branch: String },
    #[error("'r' must start traversal branch {0:?}")]
    MisplacedRoot(String),
    #[error("'*' must follow 'c' or 'm' in traversal branch {0:?}")]
    MisplacedWildcard(String),
}

/// Selects the documents an operation should act on. The default
/// implementation is [`PathSelector`]; hosts with their own path language
/// can inject theirs.
pub trait DocumentSelector: Send + Sync {
    /// Flattened, ordered ids of the documents selected by `paths`.
    fn select(&self, docs: &DocumentArray, paths: &str) -> Result<Vec<DocId>, TraversalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Chunks,
    Matches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    relation: Relation,
    recursive: bool,
}

/// A parsed traversal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalPaths {
    branches: Vec<Vec<Step>>,
}

impl TraversalPaths {
    pub fn parse(paths: &str) -> Result<Self, TraversalError> {
        let body = paths.trim();
        let body = body.strip_prefix('@').unwrap_or(body);
        if body.trim().is_empty() {
            return Err(TraversalError::Empty);
        }

        let branches = body
            .split(',')
            .map(|raw| parse_branch(raw.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { branches })
    }

    /// Apply the path to `docs`. Documents reached by several branches are
    /// returned once, at their first position.
    pub fn apply(&self, docs: &DocumentArray) -> Vec<DocId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for branch in &self.branches {
            let mut level = docs.roots().to_vec();
            for step in branch {
                level = level
                    .iter()
                    .flat_map(|id| expand(docs, *id, *step))
                    .collect();
            }
            out.extend(level.into_iter().filter(|id| seen.insert(*id)));
        }
        out
    }
}

impl std::str::FromStr for TraversalPaths {
    type Err = TraversalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_branch(branch: &str) -> Result<Vec<Step>, TraversalError> {
    if branch.is_empty() {
        return Err(TraversalError::EmptyBranch(branch.to_string()));
    }

    let mut steps: Vec<Step> = Vec::new();
    for (pos, token) in branch.chars().enumerate() {
        match token {
            'r' if pos == 0 => {}
            'r' => return Err(TraversalError::MisplacedRoot(branch.to_string())),
            'c' | 'm' => steps.push(Step {
                relation: if token == 'c' {
                    Relation::Chunks
                } else {
                    Relation::Matches
                },
                recursive: false,
            }),
            '*' => match steps.last_mut() {
                Some(step) if !step.recursive => step.recursive = true,
                _ => return Err(TraversalError::MisplacedWildcard(branch.to_string())),
            },
            other => {
                return Err(TraversalError::UnknownToken {
                    token: other,
                    branch: branch.to_string(),
                })
            }
        }
    }
    Ok(steps)
}

fn related(docs: &DocumentArray, id: DocId, relation: Relation) -> Vec<DocId> {
    let Some(doc) = docs.get(id) else {
        return Vec::new();
    };
    match relation {
        Relation::Chunks => doc.chunks().to_vec(),
        Relation::Matches => doc.matches().iter().map(|m| m.doc).collect(),
    }
}

/// Documents one step away from `id`, or with `recursive` every document
/// reachable along the relation, in pre-order. Matches can form cycles, so
/// recursive walks track what they have visited.
fn expand(docs: &DocumentArray, id: DocId, step: Step) -> Vec<DocId> {
    if !step.recursive {
        return related(docs, id, step.relation);
    }

    let mut visited = HashSet::from([id]);
    let mut out = Vec::new();
    let mut stack: Vec<DocId> = related(docs, id, step.relation).into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        if !visited.insert(next) {
            continue;
        }
        out.push(next);
        stack.extend(related(docs, next, step.relation).into_iter().rev());
    }
    out
}

/// The stock [`DocumentSelector`]: parses the per-call path with
/// [`TraversalPaths::parse`] and applies it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSelector;

impl DocumentSelector for PathSelector {
    fn select(&self, docs: &DocumentArray, paths: &str) -> Result<Vec<DocId>, TraversalError> {
        Ok(TraversalPaths::parse(paths)?.apply(docs))
    }
}
