// Cut-edge maintenance.
//
// An edge's crossing status depends only on the parts of its two endpoints,
// so after a flip only edges incident to flipped nodes can change status.
// Both updaters below re-examine exactly those edges under the new assignment
// and leave everything else as it was.

use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator as _;
use rustc_hash::FxHashSet;
use crate::assignment::{Assignment, Flip, PartId};
use crate::errors::Error;
use crate::graph::{edge, Edge, Graph};
use crate::partition::Partition;
use crate::updaters::{wrong_kind, Field, FxBuildHasher};
use crate::Updater;

/// Edges whose endpoints lie in different parts.
///
/// A persistent set, so the copy a transition makes shares everything with
/// its predecessor except the edges it re-examined.
pub type CutEdges = im::HashSet<Edge, FxBuildHasher>;

/// Cut edges filed under the parts of both their endpoints.
pub type CutEdgesByPart = im::HashMap<PartId, CutEdges, FxBuildHasher>;

/// Whether the endpoints of `edge` are assigned to different parts.
#[inline]
pub fn crosses_parts(assignment: &Assignment, (u, v): Edge) -> bool {
    assignment.get(u) != assignment.get(v)
}

fn cut_edges_from_scratch(graph: &Graph, assignment: &Assignment) -> CutEdges {
    let cut_edges: Vec<Edge> = (0..graph.len())
        .into_par_iter()
        .flat_map_iter(move |vertex| {
            graph
                .neighbors(vertex)
                .filter(move |&neighbor| neighbor > vertex)
                .map(move |neighbor| (vertex, neighbor))
                .filter(move |&pair| crosses_parts(assignment, pair))
        })
        .collect();
    cut_edges.into_iter().collect()
}

fn update_cut_edges(
    graph: &Graph,
    cut_edges: &CutEdges,
    assignment: &Assignment,
    flip: &Flip,
) -> CutEdges {
    let mut updated = cut_edges.clone();

    for &node in flip.keys() {
        for neighbor in graph.neighbors(node) {
            let incident = edge(node, neighbor);

            // Status is recomputed rather than toggled, so a flip entry that
            // leaves its node in place changes nothing.
            if crosses_parts(assignment, incident) {
                updated.insert(incident);
            } else {
                updated.remove(&incident);
            }
        }
    }

    updated
}

fn file_under(by_part: &mut CutEdgesByPart, part: PartId, cut_edge: Edge) {
    by_part
        .entry(part)
        .or_insert_with(CutEdges::default)
        .insert(cut_edge);
}

/// File every cut edge under the parts of both endpoints.
pub fn cut_edges_by_part_from_cut_edges(
    cut_edges: &CutEdges,
    assignment: &Assignment,
) -> CutEdgesByPart {
    let mut by_part = CutEdgesByPart::default();

    for &cut_edge in cut_edges.iter() {
        let (u, v) = cut_edge;
        file_under(&mut by_part, assignment.get(u), cut_edge);
        file_under(&mut by_part, assignment.get(v), cut_edge);
    }

    by_part
}

fn update_cut_edges_by_part(
    graph: &Graph,
    by_part: &CutEdgesByPart,
    previous: &Assignment,
    assignment: &Assignment,
    flip: &Flip,
) -> CutEdgesByPart {
    let mut updated = by_part.clone();
    let mut touched_parts = FxHashSet::default();

    for &node in flip.keys() {
        for neighbor in graph.neighbors(node) {
            let incident = edge(node, neighbor);
            let (u, v) = incident;

            // An edge only ever lives under its endpoints' parts, old or new.
            for part in [previous.get(u), previous.get(v), assignment.get(u), assignment.get(v)] {
                if let Some(edges) = updated.get_mut(&part) {
                    edges.remove(&incident);
                }
                touched_parts.insert(part);
            }

            if crosses_parts(assignment, incident) {
                file_under(&mut updated, assignment.get(u), incident);
                file_under(&mut updated, assignment.get(v), incident);
            }
        }
    }

    for part in touched_parts {
        if updated.get(&part).is_some_and(|edges| edges.is_empty()) {
            updated.remove(&part);
        }
    }

    updated
}

/// Maintains the set of cut edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutEdgesUpdater;

impl Updater for CutEdgesUpdater {
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
        Ok(Field::CutEdges(cut_edges_from_scratch(graph, assignment)))
    }

    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error> {
        let cut_edges = value
            .as_cut_edges()
            .ok_or_else(|| wrong_kind("cut edges", value))?;
        Ok(Field::CutEdges(update_cut_edges(previous.graph(), cut_edges, assignment, flip)))
    }
}

/// Maintains the cut edges touching each part.
///
/// Parts without any cut edge do not appear in the map.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutEdgesByPartUpdater;

impl Updater for CutEdgesByPartUpdater {
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
        let cut_edges = cut_edges_from_scratch(graph, assignment);
        Ok(Field::CutEdgesByPart(cut_edges_by_part_from_cut_edges(&cut_edges, assignment)))
    }

    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error> {
        let by_part = value
            .as_cut_edges_by_part()
            .ok_or_else(|| wrong_kind("cut edges by part", value))?;
        Ok(Field::CutEdgesByPart(update_cut_edges_by_part(
            previous.graph(),
            by_part,
            previous.assignment(),
            assignment,
            flip,
        )))
    }
}
