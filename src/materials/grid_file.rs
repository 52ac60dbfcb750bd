//! Text grid files listing the tabulation points of one table axis.
//!
//! ```text
//! Number of bits:
//!   4
//! Number of grid points:
//!   3
//! Grid points:
//!   0   1.0e+01
//!   1   3.0e+01
//!   2   1.0e+02
//! ```
//!
//! The bit count is optional. Each grid line carries an index and a value;
//! the value text is kept verbatim as a label since tables are often keyed
//! by it.

use std::io::BufRead;

use super::AxisGrid;
use crate::error::{RadError, Result};

const BITS_MARKER: &str = "Number of bits:";
const COUNT_MARKER: &str = "Number of grid points:";
const POINTS_MARKER: &str = "Grid points:";

/// Parsed grid file
#[derive(Debug, Clone, PartialEq)]
pub struct GridFile {
    pub nbits: Option<usize>,
    pub values: Vec<f64>,
    /// Value text as written in the file
    pub labels: Vec<String>,
}

impl GridFile {
    /// Validate into an axis (strictly increasing)
    pub fn into_axis(self, table: &str, name: &str) -> Result<AxisGrid> {
        AxisGrid::new(table, name, self.values)
    }
}

/// Parse a grid file
pub fn read_grid_file<R: BufRead>(reader: R) -> Result<GridFile> {
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

    let nbits = match find_marker(&lines, BITS_MARKER) {
        Some(i) => Some(value_after(&lines, i, BITS_MARKER)?.1),
        None => None,
    };
    let count_line = find_marker(&lines, COUNT_MARKER)
        .ok_or_else(|| RadError::parse(lines.len(), format!("missing '{}'", COUNT_MARKER)))?;
    let (_, count) = value_after(&lines, count_line, COUNT_MARKER)?;
    let points_line = find_marker(&lines, POINTS_MARKER)
        .ok_or_else(|| RadError::parse(lines.len(), format!("missing '{}'", POINTS_MARKER)))?;

    let mut values = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    let mut rows = lines
        .iter()
        .enumerate()
        .skip(points_line + 1)
        .filter(|(_, l)| !l.trim().is_empty());
    for expected in 0..count {
        let (lineno, line) = rows.next().ok_or_else(|| {
            RadError::parse(
                lines.len(),
                format!("expected {} grid points, found {}", count, expected),
            )
        })?;
        let mut tokens = line.split_whitespace();
        let index: usize = parse_token(tokens.next(), lineno + 1, "grid index")?;
        if index != expected {
            return Err(RadError::parse(
                lineno + 1,
                format!("grid index {} out of sequence (expected {})", index, expected),
            ));
        }
        let text = tokens
            .next()
            .ok_or_else(|| RadError::parse(lineno + 1, "missing grid value"))?;
        let value: f64 = parse_token(Some(text), lineno + 1, "grid value")?;
        values.push(value);
        labels.push(text.to_string());
    }
    Ok(GridFile {
        nbits,
        values,
        labels,
    })
}

fn find_marker(lines: &[String], marker: &str) -> Option<usize> {
    lines.iter().position(|l| l.contains(marker))
}

/// Integer written after `marker`, on the same line or the next non-empty one
fn value_after(lines: &[String], at: usize, marker: &str) -> Result<(usize, usize)> {
    let rest = lines[at]
        .split_once(marker)
        .map(|(_, r)| r.trim())
        .unwrap_or("");
    if !rest.is_empty() {
        return Ok((at, parse_token(rest.split_whitespace().next(), at + 1, marker)?));
    }
    let (i, line) = lines
        .iter()
        .enumerate()
        .skip(at + 1)
        .find(|(_, l)| !l.trim().is_empty())
        .ok_or_else(|| RadError::parse(at + 1, format!("no value after '{}'", marker)))?;
    Ok((i, parse_token(line.split_whitespace().next(), i + 1, marker)?))
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| RadError::parse(line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| RadError::parse(line, format!("cannot parse {} from '{}'", what, token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Number of bits:\n  4\nNumber of grid points:\n  3\nGrid points:\n  0   1.0e+01\n  1   3.0e+01\n\n  2   1.0e+02\n";

    #[test]
    fn test_parse_sample() {
        let g = read_grid_file(SAMPLE.as_bytes()).unwrap();
        assert_eq!(g.nbits, Some(4));
        assert_eq!(g.values, vec![10.0, 30.0, 100.0]);
        assert_eq!(g.labels[1], "3.0e+01");
        let axis = g.into_axis("te", "temperature").unwrap();
        assert_eq!(axis.len(), 3);
    }

    #[test]
    fn test_inline_count_without_bits() {
        let text = "Number of grid points: 2\nGrid points:\n0 5\n1 6\n";
        let g = read_grid_file(text.as_bytes()).unwrap();
        assert_eq!(g.nbits, None);
        assert_eq!(g.values, vec![5.0, 6.0]);
    }

    #[test]
    fn test_truncated_file() {
        let text = "Number of grid points:\n3\nGrid points:\n0 1.0\n1 2.0\n";
        let err = read_grid_file(text.as_bytes()).unwrap_err();
        assert!(matches!(err, RadError::Parse { .. }));
    }

    #[test]
    fn test_bad_value_reports_line() {
        let text = "Number of grid points:\n2\nGrid points:\n0 1.0\n1 abc\n";
        match read_grid_file(text.as_bytes()).unwrap_err() {
            RadError::Parse { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_unsorted_axis_is_table_error() {
        let text = "Number of grid points:\n2\nGrid points:\n0 2.0\n1 1.0\n";
        let g = read_grid_file(text.as_bytes()).unwrap();
        assert!(matches!(
            g.into_axis("tr", "radiation temperature"),
            Err(RadError::TableFormat { .. })
        ));
    }
}
