//! Payload size accounting for the memory byte budget

use serde::Serialize;

/// Size charged when a payload cannot be measured
pub const DEFAULT_WEIGHT: usize = 1024;

/// Size charged for numeric scalars
pub const SCALAR_WEIGHT: usize = 8;

/// Approximate in-memory size of a cached payload, in bytes
pub trait Weigh {
    /// Bytes charged against the memory budget
    fn weigh(&self) -> usize;
}

/// Size of the JSON encoding of `value`, or [`DEFAULT_WEIGHT`] if it fails
pub fn serialized_weight<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value)
        .map(|encoded| encoded.len())
        .unwrap_or(DEFAULT_WEIGHT)
}

impl Weigh for String {
    fn weigh(&self) -> usize {
        self.len()
    }
}

impl Weigh for Vec<u8> {
    fn weigh(&self) -> usize {
        self.len()
    }
}

impl Weigh for Box<[u8]> {
    fn weigh(&self) -> usize {
        self.len()
    }
}

macro_rules! scalar_weigh {
    ($($t:ty),*) => {
        $(
            impl Weigh for $t {
                fn weigh(&self) -> usize {
                    SCALAR_WEIGHT
                }
            }
        )*
    };
}

scalar_weigh!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl Weigh for serde_json::Value {
    fn weigh(&self) -> usize {
        match self {
            serde_json::Value::String(s) => s.len(),
            serde_json::Value::Number(_) => SCALAR_WEIGHT,
            other => serialized_weight(other),
        }
    }
}

impl<T: Weigh> Weigh for std::sync::Arc<T> {
    fn weigh(&self) -> usize {
        (**self).weigh()
    }
}
