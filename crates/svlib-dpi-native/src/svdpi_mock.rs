// In-process stand-in for the simulator's open-array accessors, linked into
// test binaries only.

use std::ffi::{c_int, c_void};

pub enum MockElems {
    Int(Vec<i32>),
    LongInt(Vec<i64>),
}

pub struct MockOpenArray {
    pub dims: c_int,
    pub low: c_int,
    pub elems: MockElems,
}

impl MockOpenArray {
    pub fn ints(values: &[i32]) -> Box<Self> {
        Box::new(MockOpenArray {
            dims: 1,
            low: 0,
            elems: MockElems::Int(values.to_vec()),
        })
    }

    pub fn longints(values: &[i64]) -> Box<Self> {
        Box::new(MockOpenArray {
            dims: 1,
            low: 0,
            elems: MockElems::LongInt(values.to_vec()),
        })
    }

    pub fn handle(&mut self) -> *mut c_void {
        self as *mut MockOpenArray as *mut c_void
    }

    pub fn len(&self) -> usize {
        match &self.elems {
            MockElems::Int(v) => v.len(),
            MockElems::LongInt(v) => v.len(),
        }
    }

    pub fn as_ints(&self) -> &[i32] {
        match &self.elems {
            MockElems::Int(v) => v,
            MockElems::LongInt(_) => panic!("not an int array"),
        }
    }

    pub fn as_longints(&self) -> &[i64] {
        match &self.elems {
            MockElems::LongInt(v) => v,
            MockElems::Int(_) => panic!("not a longint array"),
        }
    }
}

unsafe fn mock<'a>(h: *mut c_void) -> &'a mut MockOpenArray {
    &mut *(h as *mut MockOpenArray)
}

#[no_mangle]
extern "C" fn svDimensions(h: *mut c_void) -> c_int {
    unsafe { mock(h).dims }
}

#[no_mangle]
extern "C" fn svSize(h: *mut c_void, d: c_int) -> c_int {
    let m = unsafe { mock(h) };
    if d < 1 || d > m.dims {
        return -1;
    }
    m.len() as c_int
}

#[no_mangle]
extern "C" fn svLow(h: *mut c_void, _d: c_int) -> c_int {
    unsafe { mock(h).low }
}

#[no_mangle]
extern "C" fn svGetArrElemPtr1(h: *mut c_void, indx1: c_int) -> *mut c_void {
    let m = unsafe { mock(h) };
    let i = indx1 - m.low;
    if i < 0 || i as usize >= m.len() {
        return std::ptr::null_mut();
    }
    match &mut m.elems {
        MockElems::Int(v) => &mut v[i as usize] as *mut i32 as *mut c_void,
        MockElems::LongInt(v) => &mut v[i as usize] as *mut i64 as *mut c_void,
    }
}
