//! Byte encoding for typed messages.
//!
//! Senders reinterpret `&[T]` as bytes in place; receivers copy element by
//! element with `pod_read_unaligned` because a received `Vec<u8>` carries no
//! alignment guarantee for `T`.

use bytemuck::Pod;

use crate::error::{Result, SpmvError};

pub fn encode<T: Pod>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

pub fn decode<T: Pod>(bytes: &[u8], rank: usize) -> Result<Vec<T>> {
    let width = std::mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(SpmvError::comm(
            rank,
            format!("message of {} bytes is not a whole number of {width}-byte elements", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_unaligned_buffers() {
        let vals = [1.5f64, -2.25, 1e300];
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(encode(&vals));
        let back: Vec<f64> = decode(&shifted[1..], 0).unwrap();
        assert_eq!(back, vals);
    }

    #[test]
    fn ragged_message_is_rejected() {
        let err = decode::<u64>(&[0u8; 9], 3).unwrap_err();
        assert!(matches!(err, SpmvError::Communication { rank: 3, .. }));
    }
}
