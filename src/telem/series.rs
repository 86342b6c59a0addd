//! Typed, densely packed sample buffers

use super::data_type::{DataType, Sample};
use crate::error::{Error, Result};
use std::ops::Range;

/// A buffer of samples of one scalar type, stored little-endian
///
/// The shape is carried so that validators can reject multi-dimensional
/// buffers; every series produced by this crate is rank 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    data_type: DataType,
    data: Vec<u8>,
    shape: Vec<usize>,
}

impl Series {
    /// Create a rank-1 series from native values
    pub fn new<T: Sample>(values: Vec<T>) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DATA_TYPE.density());
        for v in &values {
            v.write_le(&mut data);
        }
        Self {
            data_type: T::DATA_TYPE,
            shape: vec![values.len()],
            data,
        }
    }

    /// Create a rank-1 series from raw little-endian bytes
    pub fn from_bytes(data_type: DataType, data: Vec<u8>) -> Result<Self> {
        let density = data_type.density();
        if data.len() % density != 0 {
            return Err(Error::validation(format!(
                "byte length {} is not a multiple of the {} element width {}",
                data.len(),
                data_type,
                density
            )));
        }
        Ok(Self {
            data_type,
            shape: vec![data.len() / density],
            data,
        })
    }

    /// An empty series of the given type
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            data: Vec::new(),
            shape: vec![0],
        }
    }

    /// Reinterpret the series with a different shape
    pub fn with_shape(mut self, shape: Vec<usize>) -> Result<Self> {
        let count: usize = shape.iter().product();
        if count != self.len() {
            return Err(Error::validation(format!(
                "shape {:?} holds {} samples but series has {}",
                shape,
                count,
                self.len()
            )));
        }
        self.shape = shape;
        Ok(self)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.data.len() / self.data_type.density()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Decode all samples as `T`
    pub fn values<T: Sample>(&self) -> Result<Vec<T>> {
        if T::DATA_TYPE != self.data_type {
            return Err(Error::validation(format!(
                "cannot read {} series as {}",
                self.data_type,
                T::DATA_TYPE
            )));
        }
        Ok(self
            .data
            .chunks_exact(self.data_type.density())
            .map(T::read_le)
            .collect())
    }

    /// Sample at `index`, if in bounds and of type `T`
    pub fn get<T: Sample>(&self, index: usize) -> Option<T> {
        if T::DATA_TYPE != self.data_type || index >= self.len() {
            return None;
        }
        let density = self.data_type.density();
        Some(T::read_le(&self.data[index * density..(index + 1) * density]))
    }

    /// Rank-1 copy of the samples in `range`
    pub fn slice(&self, range: Range<usize>) -> Series {
        let density = self.data_type.density();
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Series {
            data_type: self.data_type,
            data: self.data[start * density..end * density].to_vec(),
            shape: vec![end - start],
        }
    }

    /// Append another series of the same type
    pub fn extend(&mut self, other: &Series) -> Result<()> {
        if other.data_type != self.data_type {
            return Err(Error::validation(format!(
                "cannot extend {} series with {} samples",
                self.data_type, other.data_type
            )));
        }
        self.data.extend_from_slice(&other.data);
        self.shape = vec![self.len()];
        Ok(())
    }
}

impl<T: Sample> From<Vec<T>> for Series {
    fn from(values: Vec<T>) -> Self {
        Series::new(values)
    }
}
