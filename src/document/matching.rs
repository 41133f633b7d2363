//! Nearest-neighbour matching over document embeddings.

use anyhow::Result;
use ndarray::{Array1, Array2};

use super::{DocId, DocMatch, DocumentArray};

/// Rows scaled to unit length; all-zero rows stay zero and score 0 against
/// everything.
fn unit_rows(rows: &[&[f32]], dim: usize) -> Result<Array2<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for row in rows {
        let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
        let scale = if norm > 0.0 { 1.0 / norm } else { 0.0 };
        flat.extend(row.iter().map(|x| x * scale));
    }
    Ok(Array2::from_shape_vec((rows.len(), dim), flat)?)
}

/// Rank `index` documents against each `query` document by cosine
/// similarity and store the best `limit` as the query's matches.
///
/// Documents without an embedding are skipped on both sides. On equal
/// scores a query that is also in `index` ranks itself first; other ties
/// keep `index` order.
/// Returns the number of queries that received matches.
pub fn match_documents(
    docs: &mut DocumentArray,
    queries: &[DocId],
    index: &[DocId],
    limit: usize,
) -> Result<usize> {
    let candidates: Vec<(DocId, &[f32])> = index
        .iter()
        .filter_map(|id| Some((*id, docs.get(*id)?.embedding.as_deref()?)))
        .collect();
    let Some((_, first)) = candidates.first() else {
        return Ok(0);
    };
    let dim = first.len();
    if let Some((bad, emb)) = candidates.iter().find(|(_, e)| e.len() != dim) {
        anyhow::bail!(
            "document {} has a {}-dim embedding, expected {dim}",
            docs[*bad].id,
            emb.len()
        );
    }

    let rows: Vec<&[f32]> = candidates.iter().map(|(_, e)| *e).collect();
    let matrix = unit_rows(&rows, dim)?;
    let ids: Vec<DocId> = candidates.iter().map(|(id, _)| *id).collect();

    let mut assignments = Vec::new();
    for query in queries {
        let Some(emb) = docs.get(*query).and_then(|d| d.embedding.as_deref()) else {
            continue;
        };
        anyhow::ensure!(
            emb.len() == dim,
            "query document {} has a {}-dim embedding, expected {dim}",
            docs[*query].id,
            emb.len()
        );
        let q = unit_rows(&[emb], dim)?;
        let scores: Array1<f32> = matrix.dot(&q.row(0));

        let mut ranked: Vec<usize> = (0..ids.len()).collect();
        ranked.sort_by(|a, b| {
            scores[*b]
                .total_cmp(&scores[*a])
                .then_with(|| (ids[*b] == *query).cmp(&(ids[*a] == *query)))
        });
        let matches = ranked
            .into_iter()
            .take(limit)
            .map(|i| DocMatch {
                doc: ids[i],
                score: scores[i],
            })
            .collect();
        assignments.push((*query, matches));
    }

    let matched = assignments.len();
    for (query, matches) in assignments {
        docs.set_matches(query, matches);
    }
    tracing::debug!(matched, candidates = ids.len(), "documents matched");
    Ok(matched)
}
