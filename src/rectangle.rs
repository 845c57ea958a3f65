use std::fmt;

use crate::{Document, Error, Object, Result};

/// A page boundary rectangle in default user space units.
///
/// Corners are kept normalized: the lower-left corner is never above or to
/// the right of the upper-right one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundaryBox {
    pub lower_left_x: f64,
    pub lower_left_y: f64,
    pub upper_right_x: f64,
    pub upper_right_y: f64,
}

impl BoundaryBox {
    /// The box readers assume for a page that has none, 8.5 by 11 inches.
    pub const US_LETTER: BoundaryBox = BoundaryBox {
        lower_left_x: 0.0,
        lower_left_y: 0.0,
        upper_right_x: 612.0,
        upper_right_y: 792.0,
    };

    /// Build a box from any two opposite corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundaryBox {
        BoundaryBox {
            lower_left_x: x1.min(x2),
            lower_left_y: y1.min(y2),
            upper_right_x: x1.max(x2),
            upper_right_y: y1.max(y2),
        }
    }

    /// Read a `[x1 y1 x2 y2]` array, resolving the array or its numbers through `document`.
    pub fn from_object(object: &Object, document: &Document) -> Result<BoundaryBox> {
        let array = document.resolve_object(object).as_array()?;
        if array.len() != 4 {
            return Err(Error::ObjectType {
                expected: "Array of 4 numbers",
                found: "Array",
            });
        }
        let mut corners = [0.0; 4];
        for (corner, value) in corners.iter_mut().zip(array) {
            *corner = document.resolve_object(value).as_float()?;
        }
        let [x1, y1, x2, y2] = corners;
        Ok(BoundaryBox::new(x1, y1, x2, y2))
    }

    pub fn width(&self) -> f64 {
        self.upper_right_x - self.lower_left_x
    }

    pub fn height(&self) -> f64 {
        self.upper_right_y - self.lower_left_y
    }

    /// The box as a PDF array; whole numbers are written as integers.
    pub fn to_object(&self) -> Object {
        let number = |value: f64| {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                Object::Integer(value as i64)
            } else {
                Object::Real(value)
            }
        };
        Object::Array(vec![
            number(self.lower_left_x),
            number(self.lower_left_y),
            number(self.upper_right_x),
            number(self.upper_right_y),
        ])
    }
}

impl Default for BoundaryBox {
    fn default() -> Self {
        BoundaryBox::US_LETTER
    }
}

impl fmt::Display for BoundaryBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.lower_left_x, self.lower_left_y, self.upper_right_x, self.upper_right_y
        )
    }
}
