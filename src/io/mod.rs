//! Readers and writers for the two on-disk graph formats.
//!
//! - [`mtx`]: Matrix Market coordinate text files.
//! - [`binary`]: the legacy little-endian CSR dump.

pub mod binary;
pub mod mtx;
pub use binary::{read_binary_csr, read_binary_csr_file, write_binary_csr};
pub use mtx::{read_matrix_market, read_matrix_market_file};
