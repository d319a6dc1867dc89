//! # Field Dependency Graph
//!
//! Watches form directed edges `watched -> dependent`. The graph is built once
//! per view and rejected when it is malformed:
//!
//! - a field watching itself,
//! - a watch naming a field that is not part of the view,
//! - two fields with the same name,
//! - any cycle (`a` watches `b` and `b` watches `a`, or longer).
//!
//! Reactions of one source are kept in declaration order (field order first,
//! then watch order within the field), which is the order the form applies them.

use crate::error::ConfigError;
use crate::field::{FieldSpec, Watch};
use std::collections::HashMap;

/// One edge: `fields[dependent].watches()[watch]` reacts to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    dependent: usize,
    watch: usize,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    edges: HashMap<String, Vec<Edge>>,
}

impl DependencyGraph {
    pub fn build(fields: Vec<FieldSpec>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if index.insert(field.name().to_owned(), i).is_some() {
                return Err(ConfigError::DuplicateField(field.name().to_owned()));
            }
        }

        let mut edges: HashMap<String, Vec<Edge>> = HashMap::new();
        for (dependent, field) in fields.iter().enumerate() {
            for (watch, w) in field.watches().iter().enumerate() {
                if w.source() == field.name() {
                    return Err(ConfigError::SelfWatch(field.name().to_owned()));
                }
                if !index.contains_key(w.source()) {
                    return Err(ConfigError::UnknownWatchTarget {
                        field: field.name().to_owned(),
                        target: w.source().to_owned(),
                    });
                }
                edges
                    .entry(w.source().to_owned())
                    .or_default()
                    .push(Edge { dependent, watch });
            }
        }

        let graph = Self {
            fields,
            index,
            edges,
        };
        if let Some(cycle) = graph.find_cycle() {
            return Err(ConfigError::Cycle(cycle));
        }
        Ok(graph)
    }

    /// `(dependent, watch)` pairs reacting to `source`, in declaration order.
    /// Watches on `source` as `(dependent, watch index, watch)`, in
    /// declaration order.
    pub fn reactions<'a>(&'a self, source: &str) -> impl Iterator<Item = (&'a FieldSpec, usize, &'a Watch)> + 'a {
        self.edges
            .get(source)
            .into_iter()
            .flatten()
            .map(|edge| {
                let field = &self.fields[edge.dependent];
                (field, edge.watch, &field.watches()[edge.watch])
            })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut marks = vec![Mark::New; self.fields.len()];
        let mut path: Vec<usize> = Vec::new();

        // Iterative DFS; each stack frame is (node, next edge to visit).
        for root in 0..self.fields.len() {
            if marks[root] != Mark::New {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            marks[root] = Mark::Active;
            path.push(root);

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                frame.1 += 1;
                let out = self
                    .edges
                    .get(self.fields[node].name())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                if let Some(edge) = out.get(next) {
                    match marks[edge.dependent] {
                        Mark::New => {
                            marks[edge.dependent] = Mark::Active;
                            path.push(edge.dependent);
                            stack.push((edge.dependent, 0));
                        }
                        Mark::Active => {
                            let start = path.iter().position(|&n| n == edge.dependent).unwrap_or(0);
                            let mut cycle: Vec<String> = path[start..]
                                .iter()
                                .map(|&n| self.fields[n].name().to_owned())
                                .collect();
                            cycle.push(self.fields[edge.dependent].name().to_owned());
                            return Some(cycle);
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    path.pop();
                    stack.pop();
                }
            }
        }
        None
    }
}
