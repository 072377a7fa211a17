use serde::{Deserialize, Serialize};

/// One accepted search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// Database key of the matched entry
    pub target_key: u32,

    /// Internal index of the matched entry in the searched catalog
    pub target_index: usize,

    pub target_name: String,

    /// Normalized structural similarity in [0, 1]
    pub score: f64,

    /// Distance over the aligned span (RMSD after superposition), when available
    pub distance_metric: Option<f64>,

    /// Number of aligned residue pairs
    pub aligned_length: usize,

    /// `aligned_length / query_length`
    pub query_coverage: f64,

    /// `aligned_length / target_length`
    pub target_coverage: f64,

    /// Alignment footprint, 0-based inclusive
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,

    /// Run-length encoded alignment (e.g. `12M2I30M`)
    pub alignment_trace: String,
}

impl Hit {
    /// Confidence band for this hit's score
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        Confidence::from_score(self.score)
    }
}

/// One group of a catalog partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub representative_key: u32,
    pub representative_index: usize,
    pub representative_name: String,

    /// Keys of the members, excluding the representative, ascending by internal index
    pub member_keys: Vec<u32>,
    pub member_indices: Vec<usize>,
    pub member_names: Vec<String>,
}

impl Cluster {
    /// Number of entries in the cluster, representative included
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.member_keys.len()
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.member_keys.is_empty()
    }

    /// All keys in the cluster, representative first
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.representative_key).chain(self.member_keys.iter().copied())
    }
}

/// Confidence band for a TM-score style similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Likely unrelated structures
    Low,
    /// Same fold is plausible (TM-score >= 0.5)
    Medium,
    High,
    /// Structurally identical
    Exact,
}

impl Confidence {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.99 {
            Self::Exact
        } else if score >= 0.80 {
            Self::High
        } else if score >= 0.50 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Exact => write!(f, "EXACT"),
        }
    }
}
