use nalgebra::Point3;
use serde::Serialize;

/// A single C-alpha position, in Angstroms
pub type Coordinate = Point3<f32>;

/// One catalog record with all of its fields materialized
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// External database key
    pub key: u32,

    /// Header line, or the decimal key when the catalog has no name store
    pub name: String,

    /// Amino-acid sequence
    pub sequence: String,

    /// Structural-alphabet sequence; empty when the catalog has no such store
    pub symbolic_sequence: String,

    /// C-alpha coordinates; empty when the catalog has no coordinate store
    #[serde(skip)]
    pub coordinates: Vec<Coordinate>,

    /// Dense position of this record in the primary index
    pub internal_index: usize,
}

impl Entry {
    /// Number of residues
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// True when coordinates were decoded for every residue
    #[must_use]
    pub fn has_coordinates(&self) -> bool {
        !self.coordinates.is_empty() && self.coordinates.len() == self.sequence.len()
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Entry key={} name='{}' length={}>",
            self.key,
            self.name,
            self.sequence.len()
        )
    }
}

/// A structure to search with.
///
/// Queries are usually taken from another catalog entry or loaded from a JSON record.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub name: String,
    pub sequence: String,
    pub symbolic_sequence: String,
    pub coordinates: Vec<Coordinate>,
}

impl Query {
    pub fn new(
        name: impl Into<String>,
        sequence: impl Into<String>,
        coordinates: Vec<Coordinate>,
    ) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
            symbolic_sequence: String::new(),
            coordinates,
        }
    }

    #[must_use]
    pub fn with_symbolic_sequence(mut self, symbolic: impl Into<String>) -> Self {
        self.symbolic_sequence = symbolic.into();
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl From<&Entry> for Query {
    fn from(entry: &Entry) -> Self {
        Self {
            name: entry.name.clone(),
            sequence: entry.sequence.clone(),
            symbolic_sequence: entry.symbolic_sequence.clone(),
            coordinates: entry.coordinates.clone(),
        }
    }
}

impl From<Entry> for Query {
    fn from(entry: Entry) -> Self {
        Self {
            name: entry.name,
            sequence: entry.sequence,
            symbolic_sequence: entry.symbolic_sequence,
            coordinates: entry.coordinates,
        }
    }
}
