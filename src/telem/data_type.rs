//! Scalar data types carried by channels and series

use super::time::TimeStamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of every sample in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float64,
    Float32,
    Int64,
    Int32,
    Int16,
    Int8,
    Uint64,
    Uint32,
    Uint16,
    Uint8,
    /// Nanosecond timestamps, the only valid type for index channels
    Timestamp,
}

impl DataType {
    /// Get all data types for iteration
    pub fn all() -> &'static [DataType] {
        &[
            DataType::Float64,
            DataType::Float32,
            DataType::Int64,
            DataType::Int32,
            DataType::Int16,
            DataType::Int8,
            DataType::Uint64,
            DataType::Uint32,
            DataType::Uint16,
            DataType::Uint8,
            DataType::Timestamp,
        ]
    }

    /// Bytes per sample
    pub fn density(&self) -> usize {
        match self {
            DataType::Float64 | DataType::Int64 | DataType::Uint64 | DataType::Timestamp => 8,
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => 4,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int8 | DataType::Uint8 => 1,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DataType::all()
            .iter()
            .copied()
            .find(|dt| dt.to_string().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float64 => "float64",
            DataType::Float32 => "float32",
            DataType::Int64 => "int64",
            DataType::Int32 => "int32",
            DataType::Int16 => "int16",
            DataType::Int8 => "int8",
            DataType::Uint64 => "uint64",
            DataType::Uint32 => "uint32",
            DataType::Uint16 => "uint16",
            DataType::Uint8 => "uint8",
            DataType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// A native Rust type that can be packed into a series
pub trait Sample: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn write_le(self, out: &mut Vec<u8>);

    /// Read one sample from exactly `DATA_TYPE.density()` bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($ty:ty, $dt:expr) => {
        impl Sample for $ty {
            const DATA_TYPE: DataType = $dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

impl_sample!(f64, DataType::Float64);
impl_sample!(f32, DataType::Float32);
impl_sample!(i64, DataType::Int64);
impl_sample!(i32, DataType::Int32);
impl_sample!(i16, DataType::Int16);
impl_sample!(i8, DataType::Int8);
impl_sample!(u64, DataType::Uint64);
impl_sample!(u32, DataType::Uint32);
impl_sample!(u16, DataType::Uint16);
impl_sample!(u8, DataType::Uint8);

impl Sample for TimeStamp {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        TimeStamp(i64::read_le(bytes))
    }
}
