//! Matrix Market coordinate reader.
//!
//! Accepts `%%MatrixMarket matrix coordinate <real|integer|pattern>
//! <general|symmetric>`. Indices are 1-based. Pattern entries get weight 1.
//! Symmetric files store one triangle; the mirror of every off-diagonal entry
//! is added. The graph is always square, sized by the larger dimension.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, SpmvError};
use crate::matrix::{CsrBuilder, Graph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Integer,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symmetry {
    General,
    Symmetric,
}

fn bad(line: usize, msg: impl std::fmt::Display) -> SpmvError {
    SpmvError::FileFormat(format!("line {line}: {msg}"))
}

fn parse_header(line: &str) -> Result<(Field, Symmetry)> {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_ascii_lowercase).collect();
    if tokens.len() != 5 || tokens[0] != "%%matrixmarket" {
        return Err(bad(1, format!("not a Matrix Market header: {line:?}")));
    }
    if tokens[1] != "matrix" || tokens[2] != "coordinate" {
        return Err(bad(1, format!("unsupported object {} {}", tokens[1], tokens[2])));
    }
    let field = match tokens[3].as_str() {
        "real" => Field::Real,
        "integer" => Field::Integer,
        "pattern" => Field::Pattern,
        other => return Err(bad(1, format!("unsupported field {other}"))),
    };
    let symmetry = match tokens[4].as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        other => return Err(bad(1, format!("unsupported symmetry {other}"))),
    };
    Ok((field, symmetry))
}

fn parse_usize(tok: Option<&str>, line: usize, what: &str) -> Result<usize> {
    let tok = tok.ok_or_else(|| bad(line, format!("missing {what}")))?;
    tok.parse().map_err(|_| bad(line, format!("bad {what} {tok:?}")))
}

pub fn read_matrix_market<R: BufRead>(reader: R) -> Result<Graph> {
    let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));

    let (_, header) = lines.next().ok_or_else(|| bad(1, "empty file"))?;
    let (field, symmetry) = parse_header(&header?)?;

    // dimensions line follows any comments
    let (rows, cols, entries) = loop {
        let (no, line) = lines.next().ok_or_else(|| bad(1, "missing size line"))?;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let mut it = trimmed.split_whitespace();
        break (
            parse_usize(it.next(), no, "row count")?,
            parse_usize(it.next(), no, "column count")?,
            parse_usize(it.next(), no, "entry count")?,
        );
    };

    let n = rows.max(cols);
    let mut builder = CsrBuilder::with_capacity(
        n,
        n,
        if symmetry == Symmetry::Symmetric { 2 * entries } else { entries },
    );
    let mut seen = 0usize;
    for (no, line) in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        if seen == entries {
            return Err(bad(no, format!("more than the declared {entries} entries")));
        }
        let mut it = trimmed.split_whitespace();
        let r = parse_usize(it.next(), no, "row index")?;
        let c = parse_usize(it.next(), no, "column index")?;
        if r == 0 || c == 0 || r > rows || c > cols {
            return Err(bad(no, format!("entry ({r}, {c}) outside a {rows}x{cols} matrix")));
        }
        let v = match field {
            Field::Pattern => 1.0,
            Field::Real | Field::Integer => {
                let tok = it.next().ok_or_else(|| bad(no, "missing value"))?;
                tok.parse::<f64>().map_err(|_| bad(no, format!("bad value {tok:?}")))?
            }
        };
        match symmetry {
            Symmetry::General => builder.push(r - 1, c - 1, v),
            Symmetry::Symmetric => builder.push_symmetric(r - 1, c - 1, v),
        }
        seen += 1;
    }
    if seen != entries {
        return Err(SpmvError::FileFormat(format!(
            "file declares {entries} entries but holds {seen}"
        )));
    }
    builder.build()
}

pub fn read_matrix_market_file<P: AsRef<Path>>(path: P) -> Result<Graph> {
    let file = File::open(path)?;
    read_matrix_market(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_entries_are_mirrored() {
        let src = "%%MatrixMarket matrix coordinate real symmetric\n\
                   % a comment\n\
                   3 3 3\n\
                   1 1 4.0\n\
                   2 1 -1.5\n\
                   3 2 2\n";
        let g = read_matrix_market(src.as_bytes()).unwrap();
        assert_eq!(g.nnz(), 5);
        assert_eq!(g.row(0), (&[0usize, 1][..], &[4.0, -1.5][..]));
        assert_eq!(g.row(1), (&[0usize, 2][..], &[-1.5, 2.0][..]));
    }

    #[test]
    fn pattern_rectangular_becomes_square() {
        let src = "%%MatrixMarket matrix coordinate pattern general\n2 4 2\n1 4\n2 3\n";
        let g = read_matrix_market(src.as_bytes()).unwrap();
        assert_eq!((g.nrows(), g.ncols()), (4, 4));
        assert_eq!(g.vals(), &[1.0, 1.0]);
    }

    #[test]
    fn malformed_inputs_are_format_errors() {
        let cases = [
            "%%MatrixMarket matrix array real general\n1 1\n1.0\n",
            "%%MatrixMarket matrix coordinate complex general\n1 1 1\n1 1 1 0\n",
            "%%MatrixMarket matrix coordinate real skew-symmetric\n1 1 0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 x 1.0\n",
            "%%MatrixMarket matrix coordinate real general\n2 2 1\n3 1 1.0\n",
            "hello\n",
        ];
        for src in cases {
            assert!(
                matches!(read_matrix_market(src.as_bytes()), Err(SpmvError::FileFormat(_))),
                "{src:?}"
            );
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            read_matrix_market_file("/definitely/not/here.mtx"),
            Err(SpmvError::Io(_))
        ));
    }
}
