//! Boundary-crossing values.

use husk_error::{kinds, Result};

/// A value crossing the host/guest boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
}

impl Value {
    /// The value as an `i32`, or a type mismatch.
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Self::I32(v) => Ok(*v),
            other => Err(kinds::type_mismatch("i32", &format!("{other:?}"))),
        }
    }

    /// The value as an `i32` reinterpreted unsigned.
    pub fn as_u32(&self) -> Result<u32> {
        Ok(self.as_i32()? as u32)
    }

    /// The value as an `f64`, or a type mismatch.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::F64(v) => Ok(*v),
            other => Err(kinds::type_mismatch("f64", &format!("{other:?}"))),
        }
    }
}

/// Fetch argument `index` or fail with a type mismatch naming the gap.
pub fn arg(args: &[Value], index: usize) -> Result<Value> {
    args.get(index).copied().ok_or_else(|| {
        kinds::type_mismatch(&format!("argument {index}"), &format!("{} arguments", args.len()))
    })
}

/// The single `i32` result of a call, or a type mismatch.
pub fn single_i32(results: &[Value]) -> Result<i32> {
    match results {
        [value] => value.as_i32(),
        other => Err(kinds::type_mismatch(
            "one i32 result",
            &format!("{} results", other.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_rejects_wrong_type() {
        assert!(Value::F64(1.0).as_i32().is_err());
        assert_eq!(Value::I32(-1).as_u32().unwrap(), u32::MAX);
    }

    #[test]
    fn missing_argument_is_reported() {
        assert!(arg(&[Value::I32(1)], 1).is_err());
        assert_eq!(arg(&[Value::I32(1)], 0).unwrap(), Value::I32(1));
    }
}
