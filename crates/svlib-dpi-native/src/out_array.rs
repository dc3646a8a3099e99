//! Caller-owned fixed-capacity arrays.
//!
//! The simulator hands over an open array it allocated. `OutArray` checks its
//! shape once, then writes at most `capacity()` elements while counting every
//! element offered, so a short array truncates visibly instead of overrunning.

use std::ffi::c_int;
use std::marker::PhantomData;

use crate::abi::{open_array_elem, open_array_shape, svOpenArrayHandle};
use crate::error::{BridgeError, Result};

/// How many elements were produced versus how many fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteCount {
    pub written: usize,
    pub total: usize,
}

impl WriteCount {
    pub fn truncated(self) -> bool {
        self.written < self.total
    }
}

pub struct OutArray<T> {
    handle: svOpenArrayHandle,
    low: c_int,
    capacity: usize,
    _elem: PhantomData<T>,
}

impl<T: Copy> OutArray<T> {
    /// Validates that `handle` is a one-dimensional array. `T` must match the
    /// SystemVerilog element type (`int` is `i32`, `longint` is `i64`).
    pub unsafe fn open(handle: svOpenArrayHandle) -> Result<Self> {
        if handle.is_null() {
            return Err(BridgeError::ContractViolation(
                "array argument is null".to_string(),
            ));
        }
        let shape = open_array_shape(handle);
        if shape.dims != 1 {
            return Err(BridgeError::ContractViolation(format!(
                "expected a one-dimensional array, got {} dimensions",
                shape.dims
            )));
        }
        if shape.size < 0 {
            return Err(BridgeError::ContractViolation(format!(
                "array reports negative size {}",
                shape.size
            )));
        }
        Ok(OutArray {
            handle,
            low: shape.low,
            capacity: shape.size as usize,
            _elem: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes the leading `capacity()` values and counts the rest.
    pub fn write(&mut self, values: impl IntoIterator<Item = T>) -> Result<WriteCount> {
        let mut count = WriteCount {
            written: 0,
            total: 0,
        };
        for v in values {
            if count.total < self.capacity {
                let index = self.low + count.total as c_int;
                let p = unsafe { open_array_elem(self.handle, index) };
                if p.is_null() {
                    return Err(BridgeError::ContractViolation(format!(
                        "array element {index} is not addressable"
                    )));
                }
                unsafe { p.cast::<T>().write_unaligned(v) };
                count.written += 1;
            }
            count.total += 1;
        }
        Ok(count)
    }
}
