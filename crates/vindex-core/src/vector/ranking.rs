//! Top-k selection over `(id, distance)` candidates.
//!
//! Keeps a max-heap of at most `k` candidates ordered by `(distance, id)`, so
//! the worst kept candidate is always on top and can be evicted in
//! `O(log k)`. Ties on distance are broken by document id, which makes the
//! output independent of iteration order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use vindex_types::document::DocumentId;
use vindex_types::embedding::SearchHit;

struct Candidate<'a> {
    distance: f32,
    id: &'a DocumentId,
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(other.id))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

/// Return the `k` closest candidates, ascending by distance then id.
pub fn top_k<'a>(
    candidates: impl IntoIterator<Item = (&'a DocumentId, f32)>,
    k: usize,
) -> Vec<SearchHit> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Candidate<'a>> = BinaryHeap::with_capacity(k + 1);
    for (id, distance) in candidates {
        let candidate = Candidate { distance, id };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|c| SearchHit {
            document_id: c.id.clone(),
            distance: c.distance,
        })
        .collect()
}
