//! `.hdr` sidecar parsing and filename-based header guessing.

use crate::level::LevelDescriptor;
use crate::sample::{DataUnits, SampleOrder, SampleType};
use std::collections::HashMap;
use std::fmt::Write;

/// Errors from parsing or guessing a level header.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("line {line}: expected `KEY VALUE`")]
    Malformed { line: usize },

    #[error("line {line}: duplicate key {key}")]
    DuplicateKey { key: String, line: usize },

    #[error("missing key {0}")]
    MissingKey(&'static str),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("cannot guess header from {file_name:?}: {reason}")]
    Guess { file_name: String, reason: String },
}

struct HeaderMap(HashMap<String, String>);

impl HeaderMap {
    fn read(text: &str) -> Result<Self, HeaderError> {
        let mut map = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            let line_num = index + 1;
            let mut tokens = line.split_whitespace();
            let (key, value) = match (tokens.next(), tokens.next(), tokens.next()) {
                (None, _, _) => continue,
                (Some(key), Some(value), None) => (key.to_ascii_uppercase(), value.to_string()),
                _ => return Err(HeaderError::Malformed { line: line_num }),
            };
            if map.contains_key(&key) {
                return Err(HeaderError::DuplicateKey {
                    key,
                    line: line_num,
                });
            }
            map.insert(key, value);
        }
        Ok(Self(map))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn require(&self, key: &'static str) -> Result<&str, HeaderError> {
        self.get(key).ok_or(HeaderError::MissingKey(key))
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, HeaderError> {
        let value = self.require(key)?;
        value.parse().map_err(|_| HeaderError::InvalidValue {
            key,
            value: value.to_string(),
        })
    }

    /// A corner coordinate, or a center coordinate shifted half a cell.
    fn corner(
        &self,
        corner_key: &'static str,
        center_key: &'static str,
        cell_size_deg: f64,
    ) -> Result<f64, HeaderError> {
        if self.get(corner_key).is_some() {
            self.parse(corner_key)
        } else {
            let center: f64 = self.parse(center_key)?;
            Ok(center - 0.5 * cell_size_deg)
        }
    }
}

/// Parse the text of a `.hdr` file.
///
/// Keys are case-insensitive. `XLLCORNER`/`YLLCORNER` may be replaced by
/// `XLLCENTER`/`YLLCENTER`, which locate the center of the south-west cell.
/// `ZUNITS` is optional.
pub fn parse_header(text: &str) -> Result<LevelDescriptor, HeaderError> {
    let header = HeaderMap::read(text)?;

    let num_rows = header.parse("NROWS")?;
    let num_cols = header.parse("NCOLS")?;
    let cell_size_deg = header.parse("CELLSIZE")?;
    let south_lat_deg = header.corner("YLLCORNER", "YLLCENTER", cell_size_deg)?;
    let west_lon_deg = header.corner("XLLCORNER", "XLLCENTER", cell_size_deg)?;

    let number_type = header.require("NUMBERTYPE")?;
    let sample_type = match number_type.to_ascii_uppercase().as_str() {
        "2_BYTE_INTEGER" => SampleType::I16,
        "4_BYTE_FLOAT" => SampleType::F32,
        _ => {
            return Err(HeaderError::InvalidValue {
                key: "NUMBERTYPE",
                value: number_type.to_string(),
            })
        }
    };

    let sample_order = if header.require("BYTEORDER")?.eq_ignore_ascii_case("LSBFIRST") {
        SampleOrder::LittleEndian
    } else {
        SampleOrder::BigEndian
    };

    let units = match header.get("ZUNITS") {
        None => DataUnits::Meters,
        Some(s) if s.eq_ignore_ascii_case("METERS") => DataUnits::Meters,
        Some(s) => {
            return Err(HeaderError::InvalidValue {
                key: "ZUNITS",
                value: s.to_string(),
            })
        }
    };

    Ok(LevelDescriptor {
        num_rows,
        num_cols,
        cell_size_deg,
        south_lat_deg,
        west_lon_deg,
        sample_type,
        sample_order,
        units,
    })
}

/// Render a descriptor as `.hdr` text.
pub fn format_header(descriptor: &LevelDescriptor) -> String {
    let number_type = match descriptor.sample_type {
        SampleType::I16 => "2_BYTE_INTEGER",
        SampleType::F32 => "4_BYTE_FLOAT",
    };
    let byte_order = match descriptor.sample_order {
        SampleOrder::LittleEndian => "LSBFIRST",
        SampleOrder::BigEndian => "MSBFIRST",
    };
    let units = match descriptor.units {
        DataUnits::Meters => "METERS",
    };

    let mut s = String::new();
    let _ = writeln!(s, "NCOLS       {}", descriptor.num_cols);
    let _ = writeln!(s, "NROWS       {}", descriptor.num_rows);
    let _ = writeln!(s, "XLLCORNER   {}", descriptor.west_lon_deg);
    let _ = writeln!(s, "YLLCORNER   {}", descriptor.south_lat_deg);
    let _ = writeln!(s, "CELLSIZE    {}", descriptor.cell_size_deg);
    let _ = writeln!(s, "BYTEORDER   {byte_order}");
    let _ = writeln!(s, "NUMBERTYPE  {number_type}");
    let _ = writeln!(s, "ZUNITS      {units}");
    s
}

/// Infer a header for a global dataset from its file name and length.
///
/// Follows the ETOPO naming convention: `etopo<N>_<name>_<c|g>...` where `N`
/// is the cell size in arc minutes and `c`/`g` selects cell or grid
/// registration. Samples are assumed little endian, in meters.
pub fn guess_header(file_name: &str, file_len: u64) -> Result<LevelDescriptor, HeaderError> {
    let guess_err = |reason: String| HeaderError::Guess {
        file_name: file_name.to_string(),
        reason,
    };
    let name = file_name.to_ascii_lowercase();

    let sample_type = if name.ends_with(".bin") {
        SampleType::I16
    } else if name.ends_with(".flt") {
        SampleType::F32
    } else {
        return Err(guess_err("unrecognized extension".to_string()));
    };

    let rest = name
        .strip_prefix("etopo")
        .ok_or_else(|| guess_err("no etopo prefix".to_string()))?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let rest = rest[digits.len()..]
        .strip_prefix('_')
        .ok_or_else(|| guess_err("no cell size".to_string()))?;
    let cell_minutes: f64 = digits
        .parse()
        .map_err(|_| guess_err("no cell size".to_string()))?;
    let cell_size_deg = cell_minutes / 60.0;

    let registration = rest
        .split_once('_')
        .filter(|(label, _)| !label.is_empty())
        .map(|(_, tail)| tail.split(['_', '.']).next().unwrap_or(""))
        .ok_or_else(|| guess_err("no registration token".to_string()))?;

    let bytes_per_sample = sample_type.bytes_per_sample() as u64;
    if file_len % bytes_per_sample != 0 {
        return Err(guess_err(format!(
            "length {file_len} is not a multiple of {bytes_per_sample}"
        )));
    }
    let num_cells = file_len / bytes_per_sample;

    let (num_rows, num_cols, south_lat_deg, west_lon_deg) = match registration {
        "c" => {
            let cols = exact_sqrt(2 * num_cells)
                .ok_or_else(|| guess_err(format!("{num_cells} cells is not a 2:1 grid")))?;
            if cols % 2 != 0 {
                return Err(guess_err(format!("{cols} columns is odd")));
            }
            (cols / 2, cols, -90.0, -180.0)
        }
        "g" => {
            // cols * (cols + 1) / 2 == num_cells
            let cols = exact_sqrt(1 + 8 * num_cells)
                .filter(|root| root % 2 == 1)
                .map(|root| (root - 1) / 2)
                .ok_or_else(|| {
                    guess_err(format!("{num_cells} cells is not a grid-registered grid"))
                })?;
            if cols % 2 == 0 {
                return Err(guess_err(format!("{cols} columns is even")));
            }
            let half = 0.5 * cell_size_deg;
            ((cols + 1) / 2, cols, -90.0 - half, -180.0 - half)
        }
        other => return Err(guess_err(format!("unknown registration {other:?}"))),
    };

    Ok(LevelDescriptor {
        num_rows: num_rows as usize,
        num_cols: num_cols as usize,
        cell_size_deg,
        south_lat_deg,
        west_lon_deg,
        sample_type,
        sample_order: SampleOrder::LittleEndian,
        units: DataUnits::Meters,
    })
}

fn exact_sqrt(n: u64) -> Option<u64> {
    let root = (n as f64).sqrt().round() as u64;
    (root.checked_mul(root) == Some(n)).then_some(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HDR: &str = "NCOLS 360\nNROWS 180\nxllcorner -180\nYLLCORNER -90\n\
                       CELLSIZE 1.0\nBYTEORDER LSBFIRST\n\
                       NUMBERTYPE 2_BYTE_INTEGER\nZUNITS METERS\n";

    #[test]
    fn test_parse_header() {
        let d = parse_header(HDR).unwrap();
        assert_eq!(d.num_rows, 180);
        assert_eq!(d.num_cols, 360);
        assert_eq!(d.cell_size_deg, 1.0);
        assert_eq!(d.west_lon_deg, -180.0);
        assert_eq!(d.sample_type, SampleType::I16);
        assert_eq!(d.sample_order, SampleOrder::LittleEndian);
    }

    #[test]
    fn test_parse_header_centers_and_defaults() {
        let text = "NCOLS 361\nNROWS 181\nXLLCENTER -180\nYLLCENTER -90\n\n\
                    CELLSIZE 1\nBYTEORDER MSBFIRST\nNUMBERTYPE 4_byte_float\n";
        let d = parse_header(text).unwrap();
        assert_eq!(d.west_lon_deg, -180.5);
        assert_eq!(d.south_lat_deg, -90.5);
        assert_eq!(d.sample_type, SampleType::F32);
        assert_eq!(d.sample_order, SampleOrder::BigEndian);
        assert_eq!(d.units, DataUnits::Meters);
    }

    #[test]
    fn test_parse_header_rejects_duplicates() {
        let text = format!("{HDR}NROWS 10\n");
        assert!(matches!(
            parse_header(&text),
            Err(HeaderError::DuplicateKey { line: 9, .. })
        ));
    }

    #[test]
    fn test_parse_header_rejects_malformed() {
        assert!(matches!(
            parse_header("NROWS 1 2\n"),
            Err(HeaderError::Malformed { line: 1 })
        ));
        assert!(matches!(
            parse_header("NROWS\n"),
            Err(HeaderError::Malformed { line: 1 })
        ));
    }

    #[test]
    fn test_parse_header_missing_and_invalid() {
        assert!(matches!(
            parse_header("NROWS 1\n"),
            Err(HeaderError::MissingKey("NCOLS"))
        ));
        let text = HDR.replace("2_BYTE_INTEGER", "8_BYTE_DOUBLE");
        assert!(matches!(
            parse_header(&text),
            Err(HeaderError::InvalidValue {
                key: "NUMBERTYPE",
                ..
            })
        ));
    }

    #[test]
    fn test_format_then_parse() {
        let d = LevelDescriptor::global(180, 360, 1.0, SampleType::I16);
        assert_eq!(parse_header(&format_header(&d)).unwrap(), d);
    }

    #[test]
    fn test_guess_cell_registered() {
        let d = guess_header("etopo60_ice_c.bin", 180 * 360 * 2).unwrap();
        assert_eq!((d.num_rows, d.num_cols), (180, 360));
        assert_eq!(d.cell_size_deg, 1.0);
        assert_eq!((d.south_lat_deg, d.west_lon_deg), (-90.0, -180.0));
        assert_eq!(d.sample_type, SampleType::I16);
    }

    #[test]
    fn test_guess_grid_registered() {
        let d = guess_header("ETOPO60_bed_g_f4.flt", 181 * 361 * 4).unwrap();
        assert_eq!((d.num_rows, d.num_cols), (181, 361));
        assert_eq!(d.south_lat_deg, -90.5);
        assert_eq!(d.west_lon_deg, -180.5);
        assert_eq!(d.sample_type, SampleType::F32);
    }

    #[test]
    fn test_guess_failures() {
        assert!(guess_header("world_c.bin", 129_600).is_err());
        assert!(guess_header("etopo60_ice_x.bin", 129_600).is_err());
        assert!(guess_header("etopo60_ice_c.tif", 129_600).is_err());
        assert!(guess_header("etopo60_ice_c.bin", 1000).is_err());
    }
}
