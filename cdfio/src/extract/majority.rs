//! Record transposition between row and column majority
//!
//! Each record is remapped element by element over its effective
//! dimensions. Elements are opaque runs of `elem_bytes` bytes.

use cdfio_core::Majority;

/// Row-major offset (last index fastest) of `index`
fn row_offset(index: &[usize], dims: &[usize]) -> usize {
    index.iter().zip(dims).fold(0, |acc, (&i, &d)| acc * d + i)
}

/// Column-major offset (first index fastest) of `index`
fn column_offset(index: &[usize], dims: &[usize]) -> usize {
    index
        .iter()
        .zip(dims)
        .rev()
        .fold(0, |acc, (&i, &d)| acc * d + i)
}

/// Transpose one record stored in `from` majority into the opposite one
pub fn transpose_record(src: &[u8], dst: &mut [u8], dims: &[usize], elem_bytes: usize, from: Majority) {
    if dims.len() < 2 {
        dst.copy_from_slice(src);
        return;
    }
    let mut copy = |row: usize, col: usize| {
        let (s, d) = match from {
            Majority::Row => (row, col),
            Majority::Column => (col, row),
        };
        dst[d * elem_bytes..(d + 1) * elem_bytes]
            .copy_from_slice(&src[s * elem_bytes..(s + 1) * elem_bytes]);
    };

    match *dims {
        [d0, d1] => {
            for i in 0..d0 {
                for j in 0..d1 {
                    copy(i * d1 + j, j * d0 + i);
                }
            }
        }
        [d0, d1, d2] => {
            for i in 0..d0 {
                for j in 0..d1 {
                    for k in 0..d2 {
                        copy((i * d1 + j) * d2 + k, (k * d1 + j) * d0 + i);
                    }
                }
            }
        }
        _ => {
            let total: usize = dims.iter().product();
            let mut index = vec![0usize; dims.len()];
            for _ in 0..total {
                copy(row_offset(&index, dims), column_offset(&index, dims));
                // advance the odometer, last index fastest
                for axis in (0..dims.len()).rev() {
                    index[axis] += 1;
                    if index[axis] < dims[axis] {
                        break;
                    }
                    index[axis] = 0;
                }
            }
        }
    }
}

/// Transpose every record of a packed buffer in place
pub fn transpose_records(data: &mut [u8], dims: &[usize], elem_bytes: usize, from: Majority) {
    let record_bytes = dims.iter().product::<usize>() * elem_bytes;
    if dims.len() < 2 || record_bytes == 0 {
        return;
    }
    let mut scratch = vec![0u8; record_bytes];
    for record in data.chunks_exact_mut(record_bytes) {
        transpose_record(record, &mut scratch, dims, elem_bytes, from);
        record.copy_from_slice(&scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_rank2() {
        // 2x3 row-major: [[0,1,2],[3,4,5]] -> column-major 0,3,1,4,2,5
        let src = [0u8, 1, 2, 3, 4, 5];
        let mut dst = [0u8; 6];
        transpose_record(&src, &mut dst, &[2, 3], 1, Majority::Row);
        assert_eq!(dst, [0, 3, 1, 4, 2, 5]);

        let mut back = [0u8; 6];
        transpose_record(&dst, &mut back, &[2, 3], 1, Majority::Column);
        assert_eq!(back, src);
    }

    #[test]
    fn test_rank3_matches_generic_offsets() {
        let dims = [2, 3, 4];
        let src: Vec<u8> = (0..24).collect();
        let mut dst = vec![0u8; 24];
        transpose_record(&src, &mut dst, &dims, 1, Majority::Row);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    let idx = [i, j, k];
                    assert_eq!(dst[column_offset(&idx, &dims)], src[row_offset(&idx, &dims)]);
                }
            }
        }
    }

    #[test]
    fn test_rank4_roundtrip_with_wide_elements() {
        let dims = [2, 2, 3, 2];
        let src: Vec<u8> = (0..24 * 2).map(|v| v as u8).collect();
        let mut col = vec![0u8; src.len()];
        let mut row = vec![0u8; src.len()];
        transpose_record(&src, &mut col, &dims, 2, Majority::Row);
        assert_ne!(col, src);
        transpose_record(&col, &mut row, &dims, 2, Majority::Column);
        assert_eq!(row, src);
    }

    #[test]
    fn test_transpose_records_in_place() {
        let mut data = vec![0u8, 1, 2, 3, 10, 11, 12, 13];
        transpose_records(&mut data, &[2, 2], 1, Majority::Row);
        assert_eq!(data, vec![0, 2, 1, 3, 10, 12, 11, 13]);
    }
}
