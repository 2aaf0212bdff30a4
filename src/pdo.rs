/*!
    typed values exchanged through the process data image.

    Each PDO entry of a slave gets a [PdoValue] holding its last exchanged value and its location in the domain buffer. The location is fixed by the master engine when the entry is registered.
*/

use crate::{
    data::{PduData, Field, BitField, PackingResult},
    sdo::EntryType,
    };
use core::fmt;


/// scalar kinds a PDO entry can be exchanged as
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// padding or unsupported length, never transfered
    #[default]
    None,
    Bit,
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
}

impl ValueKind {
    /**
        kind of an entry of the given bit length

        The entry type from the slave's dictionary, when known, selects the signed kinds. Lengths other than 1, 8, 16 and 32 give [Self::None].
    */
    pub fn from_bitlength(bit_length: u8, entry_type: Option<EntryType>) -> Self {
        let signed = matches!(entry_type, Some(EntryType::Integer8 | EntryType::Integer16 | EntryType::Integer32));
        match (bit_length, signed) {
            (1, _) => Self::Bit,
            (8, false) => Self::U8,
            (8, true) => Self::I8,
            (16, false) => Self::U16,
            (16, true) => Self::I16,
            (32, false) => Self::U32,
            (32, true) => Self::I32,
            _ => Self::None,
        }
    }
    /// number of bits transfered, zero for [Self::None]
    pub fn bit_length(self) -> usize {
        match self {
            Self::None => 0,
            Self::Bit => 1,
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
            Self::U32 | Self::I32 => 32,
        }
    }
}


/**
    value of one PDO entry and its location in the process data buffer

    The value is kept as a wide integer whatever its kind, it is truncated to the kind's width when written to the buffer.
*/
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PdoValue {
    pub(crate) value: i64,
    /// byte offset in the domain buffer
    pub(crate) offset: u32,
    /// bit offset in the byte, only relevant for [ValueKind::Bit]
    pub(crate) bit_offset: u8,
    pub(crate) kind: ValueKind,
    pub(crate) index: u16,
    pub(crate) sub: u8,
    pub(crate) bit_length: u8,
}

impl PdoValue {
    pub(crate) fn new(index: u16, sub: u8, bit_length: u8, kind: ValueKind) -> Self {
        Self {index, sub, bit_length, kind, .. Default::default()}
    }

    pub fn value(&self) -> i64  {self.value}
    pub fn offset(&self) -> u32  {self.offset}
    pub fn bit_offset(&self) -> u8  {self.bit_offset}
    pub fn kind(&self) -> ValueKind  {self.kind}
    /// dictionary index of the mapped object
    pub fn index(&self) -> u16  {self.index}
    pub fn sub(&self) -> u8  {self.sub}
    pub fn bit_length(&self) -> u8  {self.bit_length}

    /// index of the last byte touched in the domain buffer, `None` for a padding entry
    pub fn end(&self) -> Option<usize> {
        match self.kind {
            ValueKind::None => None,
            kind => Some((self.offset as usize * 8 + self.bit_offset as usize + kind.bit_length() + 7) / 8),
        }
    }

    fn field<T: PduData>(&self) -> Field<T>  {Field::simple(self.offset as usize)}

    /// read the value from the domain buffer, a padding entry keeps its last value
    pub fn decode(&mut self, data: &[u8]) -> PackingResult<()> {
        self.value = match self.kind {
            ValueKind::None => return Ok(()),
            ValueKind::Bit => BitField::<bool>::new(self.offset as usize * 8 + self.bit_offset as usize, 1).get(data)? as i64,
            ValueKind::U8 => self.field::<u8>().get(data)?.into(),
            ValueKind::U16 => self.field::<u16>().get(data)?.into(),
            ValueKind::U32 => self.field::<u32>().get(data)?.into(),
            ValueKind::I8 => self.field::<i8>().get(data)?.into(),
            ValueKind::I16 => self.field::<i16>().get(data)?.into(),
            ValueKind::I32 => self.field::<i32>().get(data)?.into(),
        };
        Ok(())
    }
    /// write the value to the domain buffer, a padding entry writes nothing
    pub fn encode(&self, data: &mut [u8]) -> PackingResult<()> {
        match self.kind {
            ValueKind::None => Ok(()),
            ValueKind::Bit => BitField::<bool>::new(self.offset as usize * 8 + self.bit_offset as usize, 1).set(data, self.value != 0),
            ValueKind::U8 => self.field::<u8>().set(data, self.value as u8),
            ValueKind::U16 => self.field::<u16>().set(data, self.value as u16),
            ValueKind::U32 => self.field::<u32>().set(data, self.value as u32),
            ValueKind::I8 => self.field::<i8>().set(data, self.value as i8),
            ValueKind::I16 => self.field::<i16>().set(data, self.value as i16),
            ValueKind::I32 => self.field::<i32>().set(data, self.value as i32),
        }
    }
}

impl fmt::Display for PdoValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}:{:02x} {:?} @{}.{} = {}",
            self.index, self.sub, self.kind, self.offset, self.bit_offset, self.value)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(ValueKind::from_bitlength(1, None), ValueKind::Bit);
        assert_eq!(ValueKind::from_bitlength(16, None), ValueKind::U16);
        assert_eq!(ValueKind::from_bitlength(16, Some(EntryType::Unsigned16)), ValueKind::U16);
        assert_eq!(ValueKind::from_bitlength(32, Some(EntryType::Integer32)), ValueKind::I32);
        assert_eq!(ValueKind::from_bitlength(8, Some(EntryType::Integer8)), ValueKind::I8);
        assert_eq!(ValueKind::from_bitlength(1, Some(EntryType::Integer8)), ValueKind::Bit);
        for bits in [0, 2, 4, 7, 12, 24, 64] {
            assert_eq!(ValueKind::from_bitlength(bits, None), ValueKind::None);
        }
    }

    #[test]
    fn decode_unsigned_at_offset() {
        let mut data = [0u8; 8];
        data[4] = 0x34;
        data[5] = 0x12;
        let mut value = PdoValue::new(0x6041, 0, 16, ValueKind::U16);
        value.offset = 4;
        value.decode(&data).unwrap();
        assert_eq!(value.value(), 0x1234);
    }

    #[test]
    fn signed_extension() {
        let mut data = [0xffu8, 0xfe, 0, 0];
        let mut value = PdoValue::new(0x6077, 0, 16, ValueKind::I16);
        value.decode(&data).unwrap();
        assert_eq!(value.value(), -257);

        value.value = -2;
        value.kind = ValueKind::I32;
        value.encode(&mut data).unwrap();
        assert_eq!(data, [0xfe, 0xff, 0xff, 0xff]);
        value.kind = ValueKind::U32;
        value.decode(&data).unwrap();
        assert_eq!(value.value(), 0xffff_fffe);
    }

    #[test]
    fn bits_share_bytes() {
        let mut data = [0u8; 1];
        let mut a = PdoValue::new(0x7000, 1, 1, ValueKind::Bit);
        let mut b = PdoValue::new(0x7000, 2, 1, ValueKind::Bit);
        b.bit_offset = 3;
        a.value = 1;
        b.value = 5;
        a.encode(&mut data).unwrap();
        b.encode(&mut data).unwrap();
        assert_eq!(data[0], 0b1001);
        b.value = 0;
        b.encode(&mut data).unwrap();
        assert_eq!(data[0], 0b0001);
        a.decode(&data).unwrap();
        assert_eq!(a.value(), 1);
    }

    #[test]
    fn padding_is_skipped() {
        let mut data = [0xaau8; 2];
        let mut pad = PdoValue::new(0, 0, 16, ValueKind::None);
        pad.value = 7;
        pad.encode(&mut data).unwrap();
        assert_eq!(data, [0xaa; 2]);
        pad.decode(&data).unwrap();
        assert_eq!(pad.value(), 7);
        assert_eq!(pad.end(), None);
    }

    #[test]
    fn out_of_buffer() {
        let mut data = [0u8; 4];
        let mut value = PdoValue::new(0x6064, 0, 32, ValueKind::I32);
        value.offset = 2;
        assert_eq!(value.end(), Some(6));
        assert!(value.decode(&data).is_err());
        assert!(value.encode(&mut data).is_err());
        assert_eq!(data, [0; 4]);
    }
}
