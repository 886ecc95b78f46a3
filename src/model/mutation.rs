//! Mutation records placed on the branches of a mutation-annotated tree.
//!
//! - [Nucleotide]: single base state (`A`, `C`, `G`, `T`, or ambiguous `N`)
//! - [Mutation]: change of state at a genomic position, relative to the parent vertex

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

// =#========================================================================#=
// NUCLEOTIDE
// =#========================================================================#=
/// State of a single genomic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
    /// Ambiguous or missing base
    N,
}

impl Nucleotide {
    /// Returns the nucleotide for an (upper- or lowercase) character, or `None`.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Nucleotide::A),
            'C' => Some(Nucleotide::C),
            'G' => Some(Nucleotide::G),
            'T' => Some(Nucleotide::T),
            'N' => Some(Nucleotide::N),
            _ => None,
        }
    }

    /// Returns the uppercase character of this nucleotide.
    pub fn as_char(&self) -> char {
        match self {
            Nucleotide::A => 'A',
            Nucleotide::C => 'C',
            Nucleotide::G => 'G',
            Nucleotide::T => 'T',
            Nucleotide::N => 'N',
        }
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// =#========================================================================#=
// MUTATION
// =#========================================================================#=
/// A mutation on the branch leading into a vertex.
///
/// Mutations are immutable once created. Two mutations are considered equal
/// if they share `position` and `mut_state`; the reference state is carried
/// for display only. Ordering follows the same key, so sorting a list of
/// mutations groups them by position.
///
/// # Example
/// ```
/// use matmerge::model::{Mutation, Nucleotide};
///
/// let m: Mutation = "C241T".parse().unwrap();
/// assert_eq!(m.position(), 241);
/// assert_eq!(m.mut_state(), Nucleotide::T);
/// assert_eq!(m, Mutation::new(241, Nucleotide::N, Nucleotide::T));
/// assert_eq!(m.to_string(), "C241T");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Mutation {
    position: u32,
    ref_state: Nucleotide,
    mut_state: Nucleotide,
}

impl Mutation {
    /// Creates a new mutation.
    ///
    /// # Arguments
    /// * `position` - Genomic position (1-based, as in the usual `C241T` notation)
    /// * `ref_state` - State before the mutation
    /// * `mut_state` - State after the mutation
    pub fn new(position: u32, ref_state: Nucleotide, mut_state: Nucleotide) -> Self {
        Mutation {
            position,
            ref_state,
            mut_state,
        }
    }

    /// Returns the genomic position.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Returns the state before the mutation.
    pub fn ref_state(&self) -> Nucleotide {
        self.ref_state
    }

    /// Returns the state after the mutation.
    pub fn mut_state(&self) -> Nucleotide {
        self.mut_state
    }

    /// Returns the identity key `(position, mut_state)`.
    pub fn key(&self) -> (u32, Nucleotide) {
        (self.position, self.mut_state)
    }
}

impl PartialEq for Mutation {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Mutation {}

impl Hash for Mutation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Mutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mutation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.ref_state, self.position, self.mut_state)
    }
}

/// Error for mutation strings not of the form `<ref><position><mut>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mutation '{input}': {reason}")]
pub struct MutationParseError {
    input: String,
    reason: &'static str,
}

impl MutationParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        MutationParseError {
            input: input.to_string(),
            reason,
        }
    }
}

impl FromStr for Mutation {
    type Err = MutationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return Err(MutationParseError::new(s, "too short"));
        };

        let ref_state =
            Nucleotide::from_char(first).ok_or_else(|| MutationParseError::new(s, "unknown reference state"))?;
        let mut_state =
            Nucleotide::from_char(last).ok_or_else(|| MutationParseError::new(s, "unknown mutated state"))?;

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MutationParseError::new(s, "position must be a number"));
        }
        let position = digits
            .parse::<u32>()
            .map_err(|_| MutationParseError::new(s, "position out of range"))?;

        Ok(Mutation::new(position, ref_state, mut_state))
    }
}

/// Parses a comma-separated list of mutations, e.g. `"C241T,A23403G"`.
///
/// Empty input yields an empty list.
pub fn parse_mutation_list(s: &str) -> Result<Vec<Mutation>, MutationParseError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Mutation::from_str)
        .collect()
}
