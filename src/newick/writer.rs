//! Newick string rendering.

use crate::model::tree::{MutationTree, VertexIndex};
use crate::model::vertex::Vertex;

/// Extra buffer in Newick string length/capacity estimate
const BUFFER_CHARS: usize = 10;

/// Style for rendering a tree as Newick string,
/// controlling how branch mutations are represented in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewickStyle {
    /// Only topology and sample labels
    Topology,
    /// Number of mutations on each branch as branch length
    MutationCounts,
    /// Mutations as `[&mutations="..."]` annotation of each vertex
    Annotated,
}

/// Returns the Newick representation of this tree with closing semicolon.
///
/// Uses an explicit stack, so arbitrarily deep trees are fine.
///
/// # Arguments
/// * `style` - The [NewickStyle] used to represent mutations
/// * `tree` - The tree to render
///
/// # Returns
/// A Newick format string terminated with `;`. Returns an empty string if
/// the tree has no root.
///
/// # Example
/// ```
/// use matmerge::model::{MutationTree, parse_mutation_list};
/// use matmerge::newick::NewickStyle;
///
/// let mut tree = MutationTree::new();
/// let root = tree.add_root(vec![]);
/// tree.add_leaf(root, "A", vec![]);
/// tree.add_leaf(root, "B", parse_mutation_list("C241T").unwrap());
///
/// assert_eq!(tree.to_newick(NewickStyle::Topology), "(A,B);");
/// assert_eq!(tree.to_newick(NewickStyle::MutationCounts), "(A:0,B:1);");
/// ```
pub fn to_newick(style: NewickStyle, tree: &MutationTree) -> String {
    if !tree.is_root_set() {
        return String::new();
    }

    enum Step {
        Enter(VertexIndex),
        Separator,
        Exit(VertexIndex),
    }

    let mut newick = String::with_capacity(estimate_newick_len(style, tree));
    let mut stack = vec![Step::Enter(tree.root_index())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(index) => {
                let vertex = &tree[index];
                if vertex.is_leaf() {
                    push_vertex_suffix(&mut newick, style, vertex, index == tree.root_index());
                } else {
                    newick.push('(');
                    stack.push(Step::Exit(index));
                    // Reverse order, so first child is written first
                    for (i, &child) in vertex.children().iter().enumerate().rev() {
                        stack.push(Step::Enter(child));
                        if i > 0 {
                            stack.push(Step::Separator);
                        }
                    }
                }
            }
            Step::Separator => newick.push(','),
            Step::Exit(index) => {
                newick.push(')');
                push_vertex_suffix(&mut newick, style, &tree[index], index == tree.root_index());
            }
        }
    }

    newick.push(';');
    newick
}

/// Writes label, annotation and branch length of a vertex.
fn push_vertex_suffix(newick: &mut String, style: NewickStyle, vertex: &Vertex, is_root: bool) {
    if let Some(label) = vertex.label() {
        newick.push_str(&escape_label(label));
    }

    match style {
        NewickStyle::Topology => {}
        NewickStyle::MutationCounts => {
            if !is_root {
                newick.push(':');
                newick.push_str(&vertex.mutations().len().to_string());
            }
        }
        NewickStyle::Annotated => {
            if !vertex.mutations().is_empty() {
                let mutations: Vec<String> = vertex.mutations().iter().map(|m| m.to_string()).collect();
                newick.push_str("[&mutations=\"");
                newick.push_str(&mutations.join(","));
                newick.push_str("\"]");
            }
        }
    }
}

/// Escapes a label for safe use in Newick strings.
///
/// Labels containing whitespace or special characters are wrapped in single
/// quotes, with internal single quotes doubled. Other labels are returned as-is.
///
/// # Examples
/// ```
/// # use matmerge::newick::escape_label;
/// assert_eq!(escape_label("England/MILK-9E05B3/2020"), "England/MILK-9E05B3/2020");
/// assert_eq!(escape_label("Pu[ke]ko"), "'Pu[ke]ko'");
/// assert_eq!(escape_label("Baillon's Crake"), "'Baillon''s Crake'");
/// ```
pub fn escape_label(label: &str) -> String {
    let needs_quotes = label.chars().any(|c| {
        c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | ':' | '[' | ']' | '\'')
    });
    if needs_quotes {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

/// Estimates the length of a Newick string for a given tree,
/// used to pre-allocate string capacity.
fn estimate_newick_len(style: NewickStyle, tree: &MutationTree) -> usize {
    // Each vertex: "(", ")" or "," ~= 2 chars
    const STRUCTURE_CHARS: usize = 2;
    // Branch length: ":12" ~= 3 chars
    const COUNT_CHARS: usize = 3;
    // Mutation: "C23403T," ~= 8 chars
    const MUTATION_CHARS: usize = 8;
    // Annotation frame: "[&mutations=\"\"]"
    const ANNOTATION_CHARS: usize = 15;

    let structure_capacity = tree.num_vertices() * STRUCTURE_CHARS;
    let label_capacity: usize = tree
        .vertices()
        .iter()
        .filter_map(|v| v.label())
        .map(|label| label.len())
        .sum();
    let mutation_capacity = match style {
        NewickStyle::Topology => 0,
        NewickStyle::MutationCounts => tree.num_vertices() * COUNT_CHARS,
        NewickStyle::Annotated => {
            let annotated = tree.vertices().iter().filter(|v| !v.mutations().is_empty()).count();
            annotated * ANNOTATION_CHARS + tree.total_mutations() * MUTATION_CHARS
        }
    };

    structure_capacity + label_capacity + mutation_capacity + BUFFER_CHARS
}
