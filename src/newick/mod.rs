//! Newick rendering of mutation-annotated trees.
//!
//! Reading and writing tree files is the caller's responsibility; this
//! module only renders a [MutationTree](crate::model::MutationTree) as a
//! Newick string, e.g. to log a merged tree or to hand it to a writer.
//!
//! # Styles
//! * [NewickStyle::Topology] - labels only: `(A,(B,C));`
//! * [NewickStyle::MutationCounts] - number of mutations as branch length:
//!   `(A:0,(B:0,C:1):1);`
//! * [NewickStyle::Annotated] - mutations as extended Newick comments:
//!   `(A,(B,C[&mutations="A23403G"])[&mutations="C241T"]);`
//!
//! Labels containing Newick delimiters or whitespace are wrapped in single
//! quotes, with internal single quotes doubled.

pub mod writer;

pub use writer::{NewickStyle, escape_label, to_newick};
