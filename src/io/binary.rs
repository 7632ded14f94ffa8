//! Legacy binary CSR format.
//!
//! Layout, little-endian, no padding: `i32` row count, `i32` column count,
//! `i32` edge count, `row_ptr` as `rows + 1` `i32`, `col_idx` as `nnz` `i32`,
//! `vals` as `nnz` `f64`.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use bytemuck::Pod;
use num_traits::cast;

use crate::error::{Result, SpmvError};
use crate::matrix::Graph;

/// Read `count` raw elements. The buffer grows with the bytes actually read,
/// so a header that overstates the counts fails on the short read instead of
/// allocating up front.
fn read_pods<R: Read, T: Pod>(r: &mut R, count: usize, what: &str) -> Result<Vec<T>> {
    let width = std::mem::size_of::<T>();
    let len = count
        .checked_mul(width)
        .ok_or_else(|| SpmvError::FileFormat(format!("{what} section of {count} entries is too large")))?;
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(SpmvError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{what} section ends after {} of {len} bytes", buf.len()),
        )));
    }
    Ok(buf.chunks_exact(width).map(bytemuck::pod_read_unaligned::<T>).collect())
}

fn read_i32s<R: Read>(r: &mut R, count: usize, what: &str) -> Result<Vec<i32>> {
    Ok(read_pods::<R, i32>(r, count, what)?.into_iter().map(i32::from_le).collect())
}

fn read_f64s<R: Read>(r: &mut R, count: usize, what: &str) -> Result<Vec<f64>> {
    Ok(read_pods::<R, u64>(r, count, what)?
        .into_iter()
        .map(|b| f64::from_bits(u64::from_le(b)))
        .collect())
}

fn to_indices(raw: Vec<i32>, what: &str) -> Result<Vec<usize>> {
    raw.into_iter()
        .map(|v| {
            cast::<i32, usize>(v)
                .ok_or_else(|| SpmvError::Validation(format!("negative {what} entry {v}")))
        })
        .collect()
}

fn to_i32(v: usize, what: &str) -> Result<i32> {
    cast::<usize, i32>(v)
        .ok_or_else(|| SpmvError::Validation(format!("{what} {v} does not fit the binary format")))
}

pub fn read_binary_csr<R: Read>(mut reader: R) -> Result<Graph> {
    let header = read_i32s(&mut reader, 3, "header")?;
    let mut dims = [0usize; 3];
    for (slot, (&v, name)) in dims.iter_mut().zip(header.iter().zip(["row", "column", "edge"])) {
        *slot = match cast::<i32, usize>(v) {
            Some(d) if d > 0 => d,
            _ => {
                return Err(SpmvError::FileFormat(format!("{name} count must be positive, got {v}")));
            }
        };
    }
    let [rows, cols, nnz] = dims;

    let row_ptr = to_indices(read_i32s(&mut reader, rows + 1, "row offset")?, "row offset")?;
    let col_idx = to_indices(read_i32s(&mut reader, nnz, "column index")?, "column index")?;
    let vals = read_f64s(&mut reader, nnz, "value")?;
    Graph::from_csr(rows, cols, row_ptr, col_idx, vals)
}

pub fn read_binary_csr_file<P: AsRef<Path>>(path: P) -> Result<Graph> {
    let file = File::open(path)?;
    read_binary_csr(BufReader::new(file))
}

/// Fails on an edgeless graph, which the format cannot represent.
pub fn write_binary_csr<W: Write>(mut writer: W, graph: &Graph) -> Result<()> {
    if graph.nnz() == 0 {
        return Err(SpmvError::FileFormat("edge count must be positive, got 0".into()));
    }
    for (v, what) in [(graph.nrows(), "row count"), (graph.ncols(), "column count"), (graph.nnz(), "edge count")] {
        writer.write_all(&to_i32(v, what)?.to_le_bytes())?;
    }
    for &o in graph.row_ptr() {
        writer.write_all(&to_i32(o, "row offset")?.to_le_bytes())?;
    }
    for &c in graph.col_idx() {
        writer.write_all(&to_i32(c, "column index")?.to_le_bytes())?;
    }
    for &v in graph.vals() {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
