//! Pull-one-string-at-a-time sequences behind opaque handles.
//!
//! A producer fills a [`Payload`], `begin` parks it in the table and hands the
//! caller a handle plus the item count, and each `next` returns one item until
//! the end, where the payload is released and the caller's handle is cleared
//! in the same step. Handles carry a generation so stale or forged values are
//! rejected instead of aliasing a newer sequence.

use std::ffi::c_char;
use std::sync::{Mutex, OnceLock};

use crate::error::{BridgeError, Result};
use crate::producers::Payload;

/// The "no handle" sentinel. `next` on it is a terminal no-op.
pub const NO_HANDLE: i64 = 0;

struct Sequence {
    // Copy of the handle this sequence was issued under.
    tag: i64,
    cursor: usize,
    payload: Payload,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Next {
    /// `item` stays valid until the next call into the library; `remaining`
    /// counts this item and the ones after it.
    Item { item: *const c_char, remaining: usize },
    Terminal,
}

struct SeqTable {
    slots: Vec<Option<Sequence>>,
    generation: u32,
}

fn encode(slot: usize, generation: u32) -> i64 {
    ((generation as i64) << 32) | ((slot as i64) + 1)
}

fn slot_of(handle: i64) -> Option<usize> {
    let low = (handle & 0xFFFF_FFFF) as usize;
    if handle <= 0 || low == 0 {
        None
    } else {
        Some(low - 1)
    }
}

impl SeqTable {
    fn new() -> Self {
        SeqTable {
            slots: Vec::new(),
            generation: 0,
        }
    }

    fn next_generation(&mut self) -> u32 {
        // Keep handles positive and never zero.
        self.generation = (self.generation % 0x7FFF_FFFF) + 1;
        self.generation
    }

    fn insert(&mut self, payload: Payload) -> Result<i64> {
        let generation = self.next_generation();
        let free = self.slots.iter().position(|s| s.is_none());
        let slot = match free {
            Some(i) => i,
            None => {
                if self.slots.len() >= u32::MAX as usize {
                    return Err(BridgeError::OutOfMemory);
                }
                self.slots
                    .try_reserve(1)
                    .map_err(|_| BridgeError::OutOfMemory)?;
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let tag = encode(slot, generation);
        self.slots[slot] = Some(Sequence {
            tag,
            cursor: 0,
            payload,
        });
        Ok(tag)
    }

    fn lookup(&self, handle: i64) -> Result<usize> {
        let slot = slot_of(handle).ok_or(BridgeError::InvalidHandle(handle))?;
        match self.slots.get(slot) {
            Some(Some(seq)) if seq.tag == handle => Ok(slot),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    fn next(&mut self, handle: &mut i64) -> Result<Next> {
        if *handle == NO_HANDLE {
            return Ok(Next::Terminal);
        }
        let slot = self.lookup(*handle)?;
        if let Some(seq) = self.slots[slot].as_mut() {
            let items = seq.payload.items();
            if let Some(item) = items.get(seq.cursor) {
                let remaining = items.len() - seq.cursor;
                seq.cursor += 1;
                return Ok(Next::Item {
                    item: item.as_ptr(),
                    remaining,
                });
            }
        }
        self.release(slot);
        *handle = NO_HANDLE;
        Ok(Next::Terminal)
    }

    fn drop_handle(&mut self, handle: &mut i64) -> Result<()> {
        if *handle == NO_HANDLE {
            return Ok(());
        }
        let slot = self.lookup(*handle)?;
        self.release(slot);
        *handle = NO_HANDLE;
        Ok(())
    }

    fn release(&mut self, slot: usize) {
        if let Some(seq) = self.slots[slot].take() {
            seq.payload.release();
        }
    }
}

static TABLE: OnceLock<Mutex<SeqTable>> = OnceLock::new();

fn with_table<R>(f: impl FnOnce(&mut SeqTable) -> R) -> R {
    let table = TABLE.get_or_init(|| Mutex::new(SeqTable::new()));
    let mut guard = table.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

fn report_invalid<T>(r: Result<T>) -> Result<T> {
    if let Err(BridgeError::InvalidHandle(h)) = &r {
        log::error!("svlib: rejected stale or foreign sequence handle {h:#x}");
    }
    r
}

/// Parks a populated payload and reports its size up front. An empty payload
/// is released immediately and yields `NO_HANDLE` with a count of zero.
pub fn begin(payload: Payload) -> Result<(i64, usize)> {
    let count = payload.items().len();
    if count == 0 {
        payload.release();
        return Ok((NO_HANDLE, 0));
    }
    let handle = with_table(|t| t.insert(payload))?;
    Ok((handle, count))
}

pub fn next(handle: &mut i64) -> Result<Next> {
    report_invalid(with_table(|t| t.next(handle)))
}

/// Abandons a sequence before it is exhausted.
pub fn drop_handle(handle: &mut i64) -> Result<()> {
    report_invalid(with_table(|t| t.drop_handle(handle)))
}
