//! Writing level files and building pyramids from one full-resolution level.

use super::{header::format_header, DatasetError, LevelFile};
use crate::level::LevelDescriptor;
use crate::sample::{SampleData, SampleOrder, SampleType};
use byteorder::{ByteOrder, LittleEndian};
use std::fs;
use std::path::Path;

/// Levels are halved until neither dimension exceeds this many cells.
pub const DEFAULT_MAX_DIM: usize = 8192;

/// Write `samples` as `<name>.bin` (little-endian 2-byte integers) plus
/// `<name>.hdr` in `dir`.
///
/// Only the geometry of `descriptor` is used; the written level is always
/// `I16`, little endian.
pub fn write_level(
    dir: impl AsRef<Path>,
    name: &str,
    descriptor: &LevelDescriptor,
    samples: &[i16],
) -> Result<LevelFile, DatasetError> {
    let dir = dir.as_ref();
    let descriptor = LevelDescriptor {
        sample_type: SampleType::I16,
        sample_order: SampleOrder::LittleEndian,
        ..*descriptor
    };
    assert_eq!(
        samples.len(),
        descriptor.num_samples(),
        "sample count does not match a {}x{} grid",
        descriptor.num_rows,
        descriptor.num_cols
    );

    fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;

    let mut bytes = vec![0u8; samples.len() * 2];
    LittleEndian::write_i16_into(samples, &mut bytes);
    let data_path = dir.join(format!("{name}.bin"));
    fs::write(&data_path, &bytes).map_err(|e| DatasetError::io(&data_path, e))?;

    let hdr_path = dir.join(format!("{name}.hdr"));
    fs::write(&hdr_path, format_header(&descriptor)).map_err(|e| DatasetError::io(&hdr_path, e))?;

    log::info!(
        "wrote level {} ({}x{} cells at {} deg)",
        data_path.display(),
        descriptor.num_rows,
        descriptor.num_cols,
        descriptor.cell_size_deg
    );
    Ok(LevelFile {
        path: data_path,
        descriptor,
    })
}

/// Halve a level by averaging 2x2 blocks.
///
/// The output grid is `ceil(rows / 2) x ceil(cols / 2)` with the same
/// south-west corner. Blocks that run off the last row or column reuse it.
pub fn downsample(descriptor: &LevelDescriptor, samples: &[i16]) -> (LevelDescriptor, Vec<i16>) {
    let in_rows = descriptor.num_rows;
    let in_cols = descriptor.num_cols;
    let out = LevelDescriptor {
        num_rows: in_rows.div_ceil(2),
        num_cols: in_cols.div_ceil(2),
        cell_size_deg: 2.0 * descriptor.cell_size_deg,
        sample_type: SampleType::I16,
        sample_order: SampleOrder::LittleEndian,
        ..*descriptor
    };

    let mut result = Vec::with_capacity(out.num_samples());
    for out_row in 0..out.num_rows {
        let row_a = (2 * out_row).min(in_rows - 1) * in_cols;
        let row_b = (2 * out_row + 1).min(in_rows - 1) * in_cols;
        for out_col in 0..out.num_cols {
            let col_a = (2 * out_col).min(in_cols - 1);
            let col_b = (2 * out_col + 1).min(in_cols - 1);
            let sum = i32::from(samples[row_a + col_a])
                + i32::from(samples[row_a + col_b])
                + i32::from(samples[row_b + col_a])
                + i32::from(samples[row_b + col_b]);
            result.push(round_half_up(0.25 * f64::from(sum)));
        }
    }
    (out, result)
}

/// Rounds halves toward positive infinity, saturating at the i16 range.
fn round_half_up(value: f64) -> i16 {
    (value + 0.5).floor().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Write `L0` from `samples` and successively halved levels `L1`, `L2`, ...
/// into `dir` until both dimensions are at most `max_dim`.
///
/// Float input is rounded to 2-byte integers.
pub fn build_pyramid(
    dir: impl AsRef<Path>,
    descriptor: &LevelDescriptor,
    samples: &SampleData,
    max_dim: usize,
) -> Result<Vec<LevelFile>, DatasetError> {
    assert!(max_dim > 0, "max_dim must be positive");
    let dir = dir.as_ref();

    let mut current: Vec<i16> = match samples {
        SampleData::I16(v) => v.clone(),
        SampleData::F32(v) => v.iter().map(|&s| round_half_up(f64::from(s))).collect(),
    };
    let mut level = *descriptor;
    let mut files = vec![write_level(dir, "L0", &level, &current)?];

    let mut level_num = 1;
    while level.num_rows > max_dim || level.num_cols > max_dim {
        let (next, next_samples) = downsample(&level, &current);
        files.push(write_level(dir, &format!("L{level_num}"), &next, &next_samples)?);
        level = next;
        current = next_samples;
        level_num += 1;
    }
    Ok(files)
}
