use std::ops::{Add, AddAssign, Sub};
use num_traits::Zero;
use rustc_hash::FxHashMap;
use crate::assignment::{Assignment, Flip, PartId};
use crate::errors::Error;
use crate::graph::{Column, Graph, NodeId, Value};
use crate::partition::Partition;
use crate::updaters::{wrong_kind, Field};
use crate::Updater;

/// Per-part sum of one node attribute.
///
/// Integer attributes give integer sums. A part that lost all of its nodes
/// keeps an entry holding zero; for comparisons a missing entry and a zero
/// entry are the same thing.
#[derive(Debug, Clone)]
pub enum Tally {
    Int(FxHashMap<PartId, i64>),
    Float(FxHashMap<PartId, f64>),
}

impl Tally {
    pub fn get(&self, part: PartId) -> Option<Value> {
        match self {
            Tally::Int(sums) => sums.get(&part).copied().map(Value::Int),
            Tally::Float(sums) => sums.get(&part).copied().map(Value::Float),
        }
    }

    /// The sum for `part` as a float, zero when the part is absent.
    pub fn as_f64(&self, part: PartId) -> f64 {
        self.get(part).map_or(0.0, |value| value.as_f64())
    }

    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        let parts: Box<dyn Iterator<Item = PartId> + '_> = match self {
            Tally::Int(sums) => Box::new(sums.keys().copied()),
            Tally::Float(sums) => Box::new(sums.keys().copied()),
        };
        parts
    }

    pub fn len(&self) -> usize {
        match self {
            Tally::Int(sums) => sums.len(),
            Tally::Float(sums) => sums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum over every part.
    pub fn total(&self) -> Value {
        match self {
            Tally::Int(sums) => Value::Int(sums.values().sum()),
            Tally::Float(sums) => Value::Float(sums.values().sum()),
        }
    }

    /// `(part, sum)` pairs sorted by part, as floats.
    pub fn loads(&self) -> Vec<(PartId, f64)> {
        let mut loads: Vec<_> = self.parts().map(|part| (part, self.as_f64(part))).collect();
        loads.sort_unstable_by_key(|&(part, _)| part);
        loads
    }
}

fn same_sums<T: Copy + Zero + PartialEq>(
    a: &FxHashMap<PartId, T>,
    b: &FxHashMap<PartId, T>,
) -> bool {
    let value = |sums: &FxHashMap<PartId, T>, part: &PartId| {
        sums.get(part).copied().unwrap_or_else(T::zero)
    };
    a.keys().chain(b.keys()).all(|part| value(a, part) == value(b, part))
}

impl PartialEq for Tally {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tally::Int(a), Tally::Int(b)) => same_sums(a, b),
            (Tally::Float(a), Tally::Float(b)) => same_sums(a, b),
            _ => false,
        }
    }
}

/// Nodes entering and leaving one part during a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flow {
    pub incoming: Vec<NodeId>,
    pub outgoing: Vec<NodeId>,
}

/// Group the effective changes of `flip` by part.
///
/// `previous` is the assignment the flip is applied to. Entries that move a
/// node to the part it already has are not changes and are skipped.
pub fn flows_from_changes(previous: &Assignment, flip: &Flip) -> FxHashMap<PartId, Flow> {
    let mut flows: FxHashMap<PartId, Flow> = FxHashMap::default();

    for (&node, &target) in flip {
        let source = previous.get(node);
        if source != target {
            flows.entry(target).or_default().incoming.push(node);
            flows.entry(source).or_default().outgoing.push(node);
        }
    }

    flows
}

fn sum_by_part<T>(values: &[T], assignment: &Assignment) -> FxHashMap<PartId, T>
where
    T: Copy + Zero + AddAssign,
{
    let mut sums = FxHashMap::default();

    for (node, part) in assignment.iter() {
        *sums.entry(part).or_insert_with(T::zero) += values[node];
    }

    sums
}

fn update_sums<T>(
    sums: &FxHashMap<PartId, T>,
    values: &[T],
    flows: &FxHashMap<PartId, Flow>,
) -> FxHashMap<PartId, T>
where
    T: Copy + Zero + Add<Output = T> + Sub<Output = T>,
{
    let mut updated = sums.clone();

    for (&part, flow) in flows {
        let out_flow = flow.outgoing.iter().fold(T::zero(), |acc, &node| acc + values[node]);
        let in_flow = flow.incoming.iter().fold(T::zero(), |acc, &node| acc + values[node]);
        let old_sum = sums.get(&part).copied().unwrap_or_else(T::zero);
        updated.insert(part, old_sum - out_flow + in_flow);
    }

    updated
}

/// Sums one attribute per part.
///
/// The updater is registered under a name of the caller's choosing, which
/// need not be the attribute's.
#[derive(Debug, Clone)]
pub struct TallyUpdater {
    attribute: String,
}

impl TallyUpdater {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Updater for TallyUpdater {
    fn initialize(&self, graph: &Graph, assignment: &Assignment) -> Result<Field, Error> {
        Ok(Field::Tally(tally_column(graph.column(&self.attribute)?, assignment)))
    }

    fn update(
        &self,
        previous: &Partition,
        value: &Field,
        _assignment: &Assignment,
        flip: &Flip,
    ) -> Result<Field, Error> {
        let tally = value.as_tally().ok_or_else(|| wrong_kind("tally", value))?;
        let flows = flows_from_changes(previous.assignment(), flip);
        let column = previous.graph().column(&self.attribute)?;

        update_tally(tally, column, &flows)
            .map(Field::Tally)
            .ok_or_else(|| wrong_kind("tally of the attribute's type", value))
    }

    fn required_attributes(&self) -> Vec<&str> {
        vec![self.attribute.as_str()]
    }

    fn agrees(&self, cached: &Field, fresh: &Field) -> bool {
        match (cached.as_tally(), fresh.as_tally()) {
            (Some(a), Some(b)) => tallies_agree(a, b),
            _ => cached == fresh,
        }
    }
}

/// Sum `column` per part from scratch.
pub(crate) fn tally_column(column: &Column, assignment: &Assignment) -> Tally {
    match column {
        Column::Int(values) => Tally::Int(sum_by_part(values, assignment)),
        Column::Float(values) => Tally::Float(sum_by_part(values, assignment)),
    }
}

/// Move the flowing nodes' values between parts. `None` when the cached
/// tally and the column disagree on integer versus float.
pub(crate) fn update_tally(
    tally: &Tally,
    column: &Column,
    flows: &FxHashMap<PartId, Flow>,
) -> Option<Tally> {
    match (tally, column) {
        (Tally::Int(sums), Column::Int(values)) => {
            Some(Tally::Int(update_sums(sums, values, flows)))
        }
        (Tally::Float(sums), Column::Float(values)) => {
            Some(Tally::Float(update_sums(sums, values, flows)))
        }
        _ => None,
    }
}

/// Integer tallies must match exactly. Float tallies may differ by the
/// rounding of summing in another order, up to 1e-9 relative per part.
pub(crate) fn tallies_agree(a: &Tally, b: &Tally) -> bool {
    match (a, b) {
        (Tally::Float(a), Tally::Float(b)) => float_sums_agree(a, b),
        _ => a == b,
    }
}

fn float_sums_agree(a: &FxHashMap<PartId, f64>, b: &FxHashMap<PartId, f64>) -> bool {
    let value = |sums: &FxHashMap<PartId, f64>, part: &PartId| {
        sums.get(part).copied().unwrap_or(0.0)
    };
    a.keys().chain(b.keys()).all(|part| {
        let (x, y) = (value(a, part), value(b, part));
        let scale = x.abs().max(y.abs()).max(1.0);
        (x - y).abs() / scale <= 1e-9
    })
}
