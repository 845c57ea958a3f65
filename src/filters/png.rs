//! PNG row predictors as used by `/DecodeParms << /Predictor 10..15 >>`.
//!
//! Cross-reference streams are almost always written with the `Up`
//! predictor, so this is needed to read offsets out of them.

use std::io::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None,
    Sub,
    Up,
    Avg,
    Paeth,
}

impl TryFrom<u8> for FilterType {
    type Error = Error;

    fn try_from(n: u8) -> Result<FilterType> {
        match n {
            0 => Ok(FilterType::None),
            1 => Ok(FilterType::Sub),
            2 => Ok(FilterType::Up),
            3 => Ok(FilterType::Avg),
            4 => Ok(FilterType::Paeth),
            _ => Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid PNG filter type ({})", n),
            )),
        }
    }
}

fn paeth_predict(left: u8, above: u8, upper_left: u8) -> u8 {
    let (a, b, c) = (i16::from(left), i16::from(above), i16::from(upper_left));
    let estimate = a + b - c;
    let (pa, pb, pc) = ((estimate - a).abs(), (estimate - b).abs(), (estimate - c).abs());

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

/// Undo the predictor of one row in place, given the already decoded previous row.
pub fn decode_row(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    let len = current.len();
    let bpp = bpp.min(len);

    match filter {
        FilterType::None => (),
        FilterType::Sub => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        FilterType::Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_add(previous[i]);
            }
        }
        FilterType::Avg => {
            for i in 0..len {
                let left = if i >= bpp { u16::from(current[i - bpp]) } else { 0 };
                current[i] = current[i].wrapping_add(((left + u16::from(previous[i])) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for i in 0..len {
                let (left, upper_left) = if i >= bpp {
                    (current[i - bpp], previous[i - bpp])
                } else {
                    (0, 0)
                };
                current[i] = current[i].wrapping_add(paeth_predict(left, previous[i], upper_left));
            }
        }
    }
}

/// Decode a whole predicted buffer. Every row starts with its filter-type byte.
pub fn decode_frame(content: &[u8], bytes_per_pixel: usize, pixels_per_row: usize) -> Result<Vec<u8>> {
    let bytes_per_row = bytes_per_pixel
        .checked_mul(pixels_per_row)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "PNG row size overflows"))?;
    if bytes_per_row == 0 {
        return Err(Error::new(ErrorKind::InvalidData, "PNG predictor with empty rows"));
    }
    if content.is_empty() {
        return Ok(Vec::new());
    }
    // A row is its filter byte plus `bytes_per_row` bytes.
    if bytes_per_row >= content.len() {
        return Err(Error::new(ErrorKind::UnexpectedEof, "PNG row longer than the data"));
    }

    let mut decoded = Vec::with_capacity(content.len());
    let mut previous = vec![0_u8; bytes_per_row];
    for row in content.chunks(bytes_per_row + 1) {
        let (&filter, data) = row
            .split_first()
            .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, "empty PNG row"))?;
        if data.len() < bytes_per_row {
            return Err(Error::new(ErrorKind::UnexpectedEof, "truncated PNG row"));
        }
        let mut current = data.to_vec();
        decode_row(FilterType::try_from(filter)?, bytes_per_pixel, &previous, &mut current);
        decoded.extend_from_slice(&current);
        previous = current;
    }
    Ok(decoded)
}
