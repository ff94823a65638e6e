use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use sprs::io::read_matrix_market;
use crate::assignment::Assignment;
use crate::chain::FlipLog;
use crate::errors::Error;
use crate::graph::{Column, Graph, NodeId};

/// Read a matrix market file as an undirected graph.
///
/// Every stored entry `(i, j)` off the diagonal becomes an edge, so a
/// general matrix holding only one triangle is symmetrized. Values are
/// ignored.
pub fn read_matrix_market_as_graph(file_path: &Path) -> Result<Graph, Error> {
    let tri_matrix = read_matrix_market::<f64, usize, _>(file_path)?;

    let (rows, cols) = tri_matrix.shape();
    if rows != cols {
        return Err(Error::Parse(format!("adjacency matrix must be square, got {rows}x{cols}")));
    }

    let edges: Vec<(NodeId, NodeId)> = tri_matrix
        .row_inds()
        .iter()
        .copied()
        .zip(tri_matrix.col_inds().iter().copied())
        .collect();

    Graph::from_edges(rows, &edges)
}

/// Read a whitespace separated attribute table and add its columns to `graph`.
///
/// The first line names the columns; each further line holds one node's
/// values, in node order. A column where every value parses as an integer
/// becomes an integer column, otherwise a float column. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_attributes(file_path: &Path, graph: &mut Graph) -> Result<(), Error> {
    let reader = BufReader::new(File::open(file_path)?);
    let mut lines = reader.lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    break trimmed.split_whitespace().map(str::to_string).collect::<Vec<_>>();
                }
            }
            None => return Err(Error::Parse("attribute table has no header".to_string())),
        }
    };

    let mut raw: Vec<Vec<String>> = vec![Vec::with_capacity(graph.len()); header.len()];
    for (line_no, line) in lines.enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != header.len() {
            return Err(Error::Parse(format!(
                "line {}: expected {} values, found {}",
                line_no + 2,
                header.len(),
                fields.len()
            )));
        }
        for (column, field) in raw.iter_mut().zip(fields) {
            column.push(field.to_string());
        }
    }

    for (name, values) in header.iter().zip(raw) {
        graph.add_attribute(name, parse_column(name, &values)?)?;
    }

    Ok(())
}

fn parse_column(name: &str, values: &[String]) -> Result<Column, Error> {
    let ints: Result<Vec<i64>, _> = values.iter().map(|value| value.parse::<i64>()).collect();
    if let Ok(ints) = ints {
        return Ok(Column::Int(ints));
    }

    values
        .iter()
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|_| Error::Parse(format!("column `{name}`: `{value}` is not a number")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Column::Float)
}

/// Write every move of the flip log, one `step S: vertex V => part P` per line.
pub fn write_flip_log(flip_log: &FlipLog, file_name: &Path) -> Result<(), Error> {
    let mut file = BufWriter::new(File::create(file_name)?);
    for (step, vertex, part) in flip_log.moves() {
        writeln!(file, "step {}: vertex {} => part {}", step, vertex, part)?;
    }
    file.flush()?;
    Ok(())
}

/// Write the assignment, one `vertex V => part P` per line.
pub fn write_assignment_to_file(assignment: &Assignment, file_name: &Path) -> Result<(), Error> {
    let mut file = BufWriter::new(File::create(file_name)?);
    for (vertex, part) in assignment.iter() {
        writeln!(file, "vertex {} => part {}", vertex, part)?;
    }
    file.flush()?;
    Ok(())
}
