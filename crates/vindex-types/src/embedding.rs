//! Embedding space, modality, distance metric and search hit types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;

/// Identity of a vector space: a name shared by every model trained into it
/// plus the vector dimensionality.
///
/// Two models whose outputs are directly comparable (e.g. the image and text
/// towers of one CLIP checkpoint) report the same space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub name: String,
    pub dimension: usize,
}

impl EmbeddingSpace {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.dimension)
    }
}

/// Kind of input an embedding source consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Text,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Image => write!(f, "image"),
            Modality::Text => write!(f, "text"),
        }
    }
}

/// Distance function used by a vector store. Fixed at store creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Euclidean distance.
    L2,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            other => Err(format!("invalid distance metric: '{other}'")),
        }
    }
}

/// One ranked search result. Lower distance is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_metric_roundtrip() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let parsed: DistanceMetric = metric.to_string().parse().unwrap();
            assert_eq!(parsed, metric);
        }
        assert_eq!("Euclidean".parse::<DistanceMetric>().unwrap(), DistanceMetric::L2);
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_distance_metric_default_is_cosine() {
        assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    }

    #[test]
    fn test_space_display() {
        let space = EmbeddingSpace::new("clip-vit-b-32", 512);
        assert_eq!(space.to_string(), "clip-vit-b-32[512]");
    }

    #[test]
    fn test_modality_serde() {
        let json = serde_json::to_string(&Modality::Image).unwrap();
        assert_eq!(json, "\"image\"");
    }
}
