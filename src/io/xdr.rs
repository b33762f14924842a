//! XDR persistence of index arrays and index state.
//!
//! All integers are big-endian 32-bit signed (XDR `int`). An index array is
//! its length followed by that many entries, `-1` marking an unassigned
//! slot. Reading an array resizes the target to the persisted length before
//! filling it.

use crate::grid_error::GridError;
use crate::index::hierarchic::HierarchicIndexManager;
use crate::index::leaf::AdaptiveLeafIndexSet;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};

const XDR_INT: usize = 4;

fn to_xdr_int(value: usize) -> Result<i32, GridError> {
    i32::try_from(value).map_err(|_| GridError::Io(format!("{value} exceeds the XDR int range")))
}

fn get_int(buf: &mut impl Buf) -> Result<i32, GridError> {
    if buf.remaining() < XDR_INT {
        return Err(GridError::PersistLengthMismatch {
            expected: XDR_INT,
            found: buf.remaining(),
        });
    }
    Ok(buf.get_i32())
}

fn get_count(buf: &mut impl Buf) -> Result<usize, GridError> {
    let n = get_int(buf)?;
    usize::try_from(n).map_err(|_| GridError::Io(format!("negative XDR count {n}")))
}

/// Append `values` as a length-prefixed XDR int array.
pub fn write_index_array(buf: &mut BytesMut, values: &[Option<usize>]) -> Result<(), GridError> {
    buf.reserve((values.len() + 1) * XDR_INT);
    buf.put_i32(to_xdr_int(values.len())?);
    for v in values {
        buf.put_i32(match v {
            Some(i) => to_xdr_int(*i)?,
            None => -1,
        });
    }
    Ok(())
}

/// Read a length-prefixed XDR int array into `target`, resizing it to the
/// persisted length.
pub fn read_index_array(buf: &mut impl Buf, target: &mut Vec<Option<usize>>) -> Result<(), GridError> {
    let len = get_count(buf)?;
    if buf.remaining() < len * XDR_INT {
        return Err(GridError::PersistLengthMismatch {
            expected: len * XDR_INT,
            found: buf.remaining(),
        });
    }
    if target.len() != len {
        target.resize(len, None);
    }
    for slot in target.iter_mut() {
        let v = buf.get_i32();
        *slot = usize::try_from(v).ok();
    }
    Ok(())
}

fn read_all<R: Read>(mut reader: R) -> Result<Bytes, GridError> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    Ok(Bytes::from(raw))
}

impl AdaptiveLeafIndexSet {
    /// Encode the leaf indices of every codimension.
    pub fn to_xdr(&self) -> Result<Bytes, GridError> {
        let mut buf = BytesMut::new();
        buf.put_i32(to_xdr_int(self.codims.len())?);
        for slots in &self.codims {
            buf.put_i32(to_xdr_int(slots.next_free)?);
            let live: Vec<Option<usize>> = slots
                .leaf_index
                .iter()
                .zip(&slots.state)
                .map(|(i, s)| i.filter(|_| *s != crate::index::IndexState::Unused))
                .collect();
            write_index_array(&mut buf, &live)?;
        }
        Ok(buf.freeze())
    }

    /// Decode a set written by [`Self::to_xdr`]. Every assigned slot comes
    /// back as `Used`.
    pub fn from_xdr(mut buf: impl Buf) -> Result<Self, GridError> {
        let codims = get_count(&mut buf)?;
        let mut parts = Vec::with_capacity(codims);
        for _ in 0..codims {
            let next_free = get_count(&mut buf)?;
            let mut leaf_index = Vec::new();
            read_index_array(&mut buf, &mut leaf_index)?;
            parts.push((next_free, leaf_index));
        }
        if buf.has_remaining() {
            return Err(GridError::PersistLengthMismatch {
                expected: 0,
                found: buf.remaining(),
            });
        }
        Ok(Self::from_parts(parts))
    }

    pub fn write_xdr<W: Write>(&self, mut writer: W) -> Result<(), GridError> {
        writer.write_all(&self.to_xdr()?)?;
        Ok(())
    }

    pub fn read_xdr<R: Read>(reader: R) -> Result<Self, GridError> {
        Self::from_xdr(read_all(reader)?)
    }
}

impl HierarchicIndexManager {
    /// Encode the high-water mark of every codimension.
    pub fn to_xdr(&self) -> Result<Bytes, GridError> {
        let mut buf = BytesMut::with_capacity((self.codims() + 1) * XDR_INT);
        buf.put_i32(to_xdr_int(self.codims())?);
        for codim in 0..self.codims() {
            buf.put_i32(to_xdr_int(self.max_index(codim))?);
        }
        Ok(buf.freeze())
    }

    /// Restore high-water marks written by [`Self::to_xdr`], so indices
    /// issued afterwards never collide with persisted ones.
    pub fn restore_xdr(&mut self, mut buf: impl Buf) -> Result<(), GridError> {
        let codims = get_count(&mut buf)?;
        if codims != self.codims() {
            return Err(GridError::PersistLengthMismatch {
                expected: self.codims(),
                found: codims,
            });
        }
        for codim in 0..codims {
            let max = get_count(&mut buf)?;
            self.set_max_index(codim, max);
        }
        Ok(())
    }

    pub fn write_xdr<W: Write>(&self, mut writer: W) -> Result<(), GridError> {
        writer.write_all(&self.to_xdr()?)?;
        Ok(())
    }

    pub fn read_xdr<R: Read>(&mut self, reader: R) -> Result<(), GridError> {
        self.restore_xdr(read_all(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{AdaptGrid, GridOptions, HierarchicGrid, OneDGrid};

    #[test]
    fn index_array_layout_is_big_endian() {
        let mut buf = BytesMut::new();
        write_index_array(&mut buf, &[Some(1), None]).unwrap();
        assert_eq!(
            &buf[..],
            &[0, 0, 0, 2, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn read_resizes_target() {
        let mut buf = BytesMut::new();
        write_index_array(&mut buf, &[Some(4), Some(0), None]).unwrap();
        let mut target = vec![Some(9); 7];
        read_index_array(&mut buf.freeze(), &mut target).unwrap();
        assert_eq!(target, vec![Some(4), Some(0), None]);
    }

    #[test]
    fn truncated_array_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i32(3);
        buf.put_i32(1);
        let mut target = Vec::new();
        assert_eq!(
            read_index_array(&mut buf.freeze(), &mut target),
            Err(GridError::PersistLengthMismatch {
                expected: 12,
                found: 4
            })
        );
    }

    #[test]
    fn leaf_set_roundtrip_through_writer() {
        let mut g = OneDGrid::new(&[0.0, 1.0, 2.0, 3.0], GridOptions::default()).unwrap();
        let mut set = AdaptiveLeafIndexSet::for_grid(&g).unwrap();
        let e = g.macro_elements()[1];
        g.refine_element(e).unwrap();
        g.end_adaptation();
        set.resize(&g).unwrap();
        set.compress(&g).unwrap();

        let mut file = Vec::new();
        set.write_xdr(&mut file).unwrap();
        let back = AdaptiveLeafIndexSet::read_xdr(file.as_slice()).unwrap();
        for codim in 0..=1 {
            assert_eq!(back.size(codim), set.size(codim));
            for h in 0..g.max_hierarchic_index(codim) {
                assert_eq!(back.new_index(codim, h), set.new_index(codim, h));
            }
        }
        assert!(back.is_compressed());
    }

    #[test]
    fn manager_restores_high_water_mark() {
        let g = OneDGrid::new(&[0.0, 1.0, 2.0], GridOptions::default()).unwrap();
        let bytes = g.index_manager().to_xdr().unwrap();
        let mut fresh = HierarchicIndexManager::new(1, 16);
        fresh.read_xdr(&bytes[..]).unwrap();
        assert_eq!(fresh.max_index(0), 2);
        assert_eq!(fresh.new_index(1), 3);

        let mut wrong = HierarchicIndexManager::new(2, 16);
        assert!(matches!(
            wrong.restore_xdr(bytes),
            Err(GridError::PersistLengthMismatch { .. })
        ));
    }
}
