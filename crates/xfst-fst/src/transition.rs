// Fixed-layout records shared by the compact lookup form and the native
// binary container.

use bytemuck::{Pod, Zeroable};

/// One transition of a [`CompactTransducer`](crate::compact::CompactTransducer)
/// (16 bytes).
///
/// - `sym_in` (u32): input symbol index, or [`COMPACT_FINAL_SYM`]
/// - `sym_out` (u32): output symbol index
/// - `target` (u32): target state index
/// - `weight` (f32): arc weight, or the final weight for the sentinel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompactTransition {
    pub sym_in: u32,
    pub sym_out: u32,
    pub target: u32,
    pub weight: f32,
}

/// Input symbol of the sentinel transition that marks a final state. It is
/// always the first transition of its state.
pub const COMPACT_FINAL_SYM: u32 = u32::MAX;

impl CompactTransition {
    #[inline]
    pub fn is_final(&self) -> bool {
        self.sym_in == COMPACT_FINAL_SYM
    }
}

/// Location of one state's transitions in the transition table (8 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct StateRange {
    pub first: u32,
    pub count: u32,
}

impl StateRange {
    #[inline]
    pub fn end(&self) -> u32 {
        self.first + self.count
    }
}

/// Stored state of an ordinary network (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StoredState {
    pub first_arc: u32,
    pub arc_count: u32,
    pub final_weight: f32,
    /// 1 when the state is final.
    pub is_final: u32,
}

/// Stored arc of an ordinary network (16 bytes). Symbols index the symbol
/// list stored before the states.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StoredArc {
    pub input: u32,
    pub output: u32,
    pub target: u32,
    pub weight: f32,
}

const _: () = assert!(size_of::<CompactTransition>() == 16);
const _: () = assert!(size_of::<StateRange>() == 8);
const _: () = assert!(size_of::<StoredState>() == 16);
const _: () = assert!(size_of::<StoredArc>() == 16);

/// Copy `count` records of `T` starting at `offset` into an aligned vector.
pub fn read_records<T: Pod>(data: &[u8], offset: usize, count: usize) -> Option<Vec<T>> {
    let len = count.checked_mul(size_of::<T>())?;
    let bytes = data.get(offset..offset.checked_add(len)?)?;
    let mut records = vec![T::zeroed(); count];
    bytemuck::cast_slice_mut::<T, u8>(&mut records).copy_from_slice(bytes);
    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(size_of::<CompactTransition>(), 16);
        assert_eq!(size_of::<StoredArc>(), 16);
    }

    #[test]
    fn zero_copy_cast_compact() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&3u32.to_le_bytes());
        raw.extend_from_slice(&1.5f32.to_le_bytes());
        let transitions: Vec<CompactTransition> = read_records(&raw, 0, 1).unwrap();
        assert_eq!(transitions[0].sym_in, 1);
        assert_eq!(transitions[0].sym_out, 2);
        assert_eq!(transitions[0].target, 3);
        assert_eq!(transitions[0].weight, 1.5);
    }

    #[test]
    fn read_records_unaligned_offset() {
        let mut raw = vec![0xAAu8];
        raw.extend_from_slice(bytemuck::bytes_of(&StateRange { first: 7, count: 2 }));
        let ranges: Vec<StateRange> = read_records(&raw, 1, 1).unwrap();
        assert_eq!(ranges[0], StateRange { first: 7, count: 2 });
        assert_eq!(ranges[0].end(), 9);
    }

    #[test]
    fn read_records_out_of_bounds() {
        let raw = [0u8; 10];
        assert!(read_records::<StoredArc>(&raw, 0, 1).is_none());
    }

    #[test]
    fn sentinel_detection() {
        let t = CompactTransition {
            sym_in: COMPACT_FINAL_SYM,
            sym_out: 0,
            target: 0,
            weight: 0.0,
        };
        assert!(t.is_final());
    }
}
