/*!
    dictionary objects of a slave (SDO) and their values.

    Each subitem of each object found in a slave's dictionary during the bus scan gets an [Sdo] entry, caching the last value read or written. Reading and writing the entry on the slave is done by [crate::request].
*/

use crate::{
    data::{PduData, PackingError},
    engine::{Name, RequestState, SdoRequest, SdoInfo, SdoEntryInfo},
    error::{EthercatError, EthercatResult},
    registers::AlState,
    };
use bilge::prelude::*;
use core::fmt;


/// maximum length of a visible or octet string value
pub const MAX_STRING_LENGTH: usize = 50;


/// data type of a dictionary entry, as reported in the object description
///
/// ETG.1000.6 table 63
#[bitsize(16)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EntryType {
    /// not reported, or not a basic type
    Undefined = 0x0000,
    Boolean = 0x0001,
    Integer8 = 0x0002,
    Integer16 = 0x0003,
    Integer32 = 0x0004,
    Unsigned8 = 0x0005,
    Unsigned16 = 0x0006,
    Unsigned32 = 0x0007,
    Real32 = 0x0008,
    VisibleString = 0x0009,
    OctetString = 0x000a,
    UnicodeString = 0x000b,
    TimeOfDay = 0x000c,
}
impl EntryType {
    /// decode the data type code reported by the master engine, other types are [Self::Undefined]
    pub fn from_raw(code: u16) -> Self {
        Self::try_from(code).unwrap_or(Self::Undefined)
    }
}

/// kind of dictionary object
///
/// ETG.1000.6 table 62
#[bitsize(8)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ObjectCode {
    Undefined = 0,
    Domain = 2,
    DefType = 5,
    DefStruct = 6,
    Var = 7,
    Array = 8,
    Record = 9,
}
impl ObjectCode {
    pub fn from_raw(code: u8) -> Self {
        Self::try_from(code).unwrap_or(Self::Undefined)
    }
}

/// access rights of a dictionary entry in each state allowing mailbox communication
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SdoAccess {
    /// read access in PREOP, SAFEOP, OP
    pub read: [bool; 3],
    /// write access in PREOP, SAFEOP, OP
    pub write: [bool; 3],
}
impl SdoAccess {
    fn slot(state: AlState) -> Option<usize> {
        match state {
            AlState::PreOperational => Some(0),
            AlState::SafeOperational => Some(1),
            AlState::Operational => Some(2),
            _ => None,
        }
    }
    pub fn readable(&self, state: AlState) -> bool  {Self::slot(state).map_or(false, |i| self.read[i])}
    pub fn writable(&self, state: AlState) -> bool  {Self::slot(state).map_or(false, |i| self.write[i])}
}


/// decoded value of a dictionary entry
#[derive(Clone, Debug, PartialEq)]
pub enum SdoValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    U8(u8),
    U16(u16),
    U32(u32),
    Real(f32),
    /// one latin-1 character per byte, as transfered
    VisibleString(heapless::Vec<u8, MAX_STRING_LENGTH>),
    OctetString(heapless::Vec<u8, MAX_STRING_LENGTH>),
}

impl SdoValue {
    /**
        decode the bytes transfered for an entry of the given type

        Integers are sign or zero extended according to the type. Visible strings are cut at their first null byte, and strings are truncated to [MAX_STRING_LENGTH].

        Data too short for the type is an [EthercatError::Request] failure of this entry.
    */
    pub fn decode<T>(entry_type: EntryType, data: &[u8]) -> EthercatResult<Self, T> {
        let short = |_: PackingError| EthercatError::<T>::Request("reply too short for the entry type");
        Ok(match entry_type {
            EntryType::Boolean => Self::Bool(bool::unpack(data).map_err(short)?),
            EntryType::Integer8 => Self::I8(i8::unpack(data).map_err(short)?),
            EntryType::Integer16 => Self::I16(i16::unpack(data).map_err(short)?),
            EntryType::Integer32 => Self::I32(i32::unpack(data).map_err(short)?),
            EntryType::Unsigned8 => Self::U8(u8::unpack(data).map_err(short)?),
            EntryType::Unsigned16 => Self::U16(u16::unpack(data).map_err(short)?),
            EntryType::Unsigned32 => Self::U32(u32::unpack(data).map_err(short)?),
            EntryType::Real32 => Self::Real(f32::unpack(data).map_err(short)?),
            EntryType::VisibleString => {
                let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                Self::VisibleString(truncated("visible", &data[.. end]))
            },
            EntryType::OctetString => Self::OctetString(truncated("octet", data)),
            other => return Err(EthercatError::Unsupported(other)),
        })
    }

    /**
        encode the value into the given request buffer, returning the number of bytes used

        Strings are padded with null bytes up to the buffer size. A value larger than the buffer is an [EthercatError::Master] error, nothing is sent for it.
    */
    pub fn encode<T>(&self, dst: &mut [u8]) -> EthercatResult<usize, T> {
        let packed = match self {
            Self::Bool(value) => value.pack(dst),
            Self::I8(value) => value.pack(dst),
            Self::I16(value) => value.pack(dst),
            Self::I32(value) => value.pack(dst),
            Self::U8(value) => value.pack(dst),
            Self::U16(value) => value.pack(dst),
            Self::U32(value) => value.pack(dst),
            Self::Real(value) => value.pack(dst),
            Self::VisibleString(value) | Self::OctetString(value) => return pad_copy(value, dst),
        };
        packed.map_err(|_| EthercatError::<T>::Master("value larger than the dictionary entry"))?;
        Ok(self.size())
    }

    /// entry type this value belongs to
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Bool(_) => EntryType::Boolean,
            Self::I8(_) => EntryType::Integer8,
            Self::I16(_) => EntryType::Integer16,
            Self::I32(_) => EntryType::Integer32,
            Self::U8(_) => EntryType::Unsigned8,
            Self::U16(_) => EntryType::Unsigned16,
            Self::U32(_) => EntryType::Unsigned32,
            Self::Real(_) => EntryType::Real32,
            Self::VisibleString(_) => EntryType::VisibleString,
            Self::OctetString(_) => EntryType::OctetString,
        }
    }

    /// number of meaningful bytes of the value
    pub fn size(&self) -> usize {
        match self {
            Self::Bool(_) | Self::I8(_) | Self::U8(_) => 1,
            Self::I16(_) | Self::U16(_) => 2,
            Self::I32(_) | Self::U32(_) | Self::Real(_) => 4,
            Self::VisibleString(value) => value.len(),
            Self::OctetString(value) => value.len(),
        }
    }

    /// value of the given entry type from an integer, truncated to the type's width. A real is given by its bit pattern
    pub fn from_int<T>(entry_type: EntryType, value: i64) -> EthercatResult<Self, T> {
        Ok(match entry_type {
            EntryType::Boolean => Self::Bool(value != 0),
            EntryType::Integer8 => Self::I8(value as i8),
            EntryType::Integer16 => Self::I16(value as i16),
            EntryType::Integer32 => Self::I32(value as i32),
            EntryType::Unsigned8 => Self::U8(value as u8),
            EntryType::Unsigned16 => Self::U16(value as u16),
            EntryType::Unsigned32 => Self::U32(value as u32),
            EntryType::Real32 => Self::Real(f32::from_bits(value as u32)),
            other => return Err(EthercatError::Unsupported(other)),
        })
    }

    /**
        value of the given entry type from its text

        Integers can be given in decimal or in hexadecimal prefixed by `0x`, booleans also accept `true` and `false`. Visible strings accept latin-1 characters only and are truncated to [MAX_STRING_LENGTH]. Octet strings are given as pairs of hexadecimal digits, as they are displayed.
    */
    pub fn from_text<T>(entry_type: EntryType, text: &str) -> EthercatResult<Self, T> {
        match entry_type {
            EntryType::VisibleString => {
                let mut bytes = heapless::Vec::<u8, MAX_STRING_LENGTH>::new();
                for c in text.chars() {
                    let byte = u8::try_from(c)
                        .map_err(|_| EthercatError::<T>::Master("visible strings are latin-1 only"))?;
                    if bytes.push(byte).is_err() {
                        log::warn!("visible string of {} characters truncated to {}", text.chars().count(), MAX_STRING_LENGTH);
                        break
                    }
                }
                Ok(Self::VisibleString(bytes))
            },
            EntryType::OctetString => parse_hex(text.trim())
                .map(Self::OctetString)
                .ok_or(EthercatError::Master("text is not hexadecimal bytes")),
            EntryType::Real32 => text.trim().parse::<f32>()
                .map(Self::Real)
                .map_err(|_| EthercatError::Master("text is not a real number")),
            EntryType::Boolean if text.trim() == "true" => Ok(Self::Bool(true)),
            EntryType::Boolean if text.trim() == "false" => Ok(Self::Bool(false)),
            _ => Self::from_int(entry_type, parse_int(text)
                .ok_or(EthercatError::<T>::Master("text is not an integer"))?),
        }
    }

    /// integer form of the value, a real gives its bit pattern and strings give nothing
    pub fn as_int(&self) -> Option<i64> {
        Some(match self {
            Self::Bool(value) => *value as i64,
            Self::I8(value) => (*value).into(),
            Self::I16(value) => (*value).into(),
            Self::I32(value) => (*value).into(),
            Self::U8(value) => (*value).into(),
            Self::U16(value) => (*value).into(),
            Self::U32(value) => (*value).into(),
            Self::Real(value) => value.to_bits().into(),
            Self::VisibleString(_) | Self::OctetString(_) => return None,
        })
    }
}

impl fmt::Display for SdoValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::I8(value) => write!(f, "{}", value),
            Self::I16(value) => write!(f, "{}", value),
            Self::I32(value) => write!(f, "{}", value),
            Self::U8(value) => write!(f, "{}", value),
            Self::U16(value) => write!(f, "{}", value),
            Self::U32(value) => write!(f, "{}", value),
            Self::Real(value) => write!(f, "{}", value),
            Self::VisibleString(value) => {
                for &byte in value.iter() {write!(f, "{}", char::from(byte))?;}
                Ok(())
            },
            Self::OctetString(value) => {
                for byte in value.iter() {write!(f, "{:02x}", byte)?;}
                Ok(())
            },
        }
    }
}

fn truncated(kind: &str, data: &[u8]) -> heapless::Vec<u8, MAX_STRING_LENGTH> {
    if data.len() > MAX_STRING_LENGTH {
        log::warn!("{} string of {} bytes truncated to {}", kind, data.len(), MAX_STRING_LENGTH);
    }
    let mut bytes = heapless::Vec::new();
    // cannot fail, the length is clamped to the capacity
    let _ = bytes.extend_from_slice(&data[.. data.len().min(MAX_STRING_LENGTH)]);
    bytes
}

fn pad_copy<T>(src: &[u8], dst: &mut [u8]) -> EthercatResult<usize, T> {
    if src.len() > dst.len()
        {return Err(EthercatError::Master("value larger than the dictionary entry"))}
    dst[.. src.len()].copy_from_slice(src);
    dst[src.len() ..].fill(0);
    Ok(src.len())
}

fn parse_hex(text: &str) -> Option<heapless::Vec<u8, MAX_STRING_LENGTH>> {
    if text.len() % 2 != 0 || ! text.bytes().all(|b| b.is_ascii_hexdigit())
        {return None}
    let mut bytes = heapless::Vec::new();
    for pair in text.as_bytes().chunks(2) {
        let pair = core::str::from_utf8(pair).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?).ok()?;
    }
    Some(bytes)
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative {-magnitude} else {magnitude})
}


/**
    one subitem of a slave's dictionary, with its description and cached value

    The request handle is only present while the bus is in cyclic operation, see [crate::request]
*/
pub struct Sdo {
    pub(crate) index: u16,
    pub(crate) sub: u8,
    pub(crate) value: Option<SdoValue>,
    pub(crate) bit_length: u16,
    pub(crate) entry_type: EntryType,
    pub(crate) object_code: ObjectCode,
    pub(crate) access: SdoAccess,
    pub(crate) object_name: Name,
    pub(crate) description: Name,

    pub(crate) request: Option<Box<dyn SdoRequest>>,
    /// last state observed on the request handle
    pub(crate) request_state: RequestState,
}

impl Sdo {
    /// entry built from the descriptions reported by the master engine
    pub fn new(object: &SdoInfo, sub: u8, entry: &SdoEntryInfo) -> Self {
        Self {
            index: object.index,
            sub,
            value: None,
            bit_length: entry.bit_length,
            entry_type: EntryType::from_raw(entry.data_type),
            object_code: ObjectCode::from_raw(object.object_code),
            access: SdoAccess {read: entry.read_access, write: entry.write_access},
            object_name: object.name.clone(),
            description: entry.description.clone(),
            request: None,
            request_state: RequestState::Unused,
        }
    }

    pub fn index(&self) -> u16  {self.index}
    pub fn sub(&self) -> u8  {self.sub}
    pub fn bit_length(&self) -> u16  {self.bit_length}
    pub fn entry_type(&self) -> EntryType  {self.entry_type}
    pub fn object_code(&self) -> ObjectCode  {self.object_code}
    pub fn access(&self) -> SdoAccess  {self.access}
    pub fn object_name(&self) -> &str  {&self.object_name}
    pub fn description(&self) -> &str  {&self.description}
    /// last value read from the slave, or last value whose write was accepted
    pub fn value(&self) -> Option<&SdoValue>  {self.value.as_ref()}
    /// state of the asynchronous request, as last observed
    pub fn request_state(&self) -> RequestState  {self.request_state}
    /// true while a request handle is attached
    pub fn has_request(&self) -> bool  {self.request.is_some()}

    /// size of the request buffer for this entry
    pub fn byte_size(&self) -> usize {
        if self.bit_length >= 8  {usize::from(self.bit_length / 8)}
        else {1}
    }

    pub(crate) fn attach(&mut self, request: Box<dyn SdoRequest>) {
        self.request = Some(request);
        self.request_state = RequestState::Unused;
    }
    /// drop the request handle, it must not be used anymore
    pub(crate) fn detach(&mut self) {
        self.request = None;
        self.request_state = RequestState::Unused;
    }
}

impl fmt::Debug for Sdo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sdo")
            .field("index", &self.index)
            .field("sub", &self.sub)
            .field("entry_type", &self.entry_type)
            .field("bit_length", &self.bit_length)
            .field("value", &self.value)
            .field("request", &self.request.as_ref().map(|_| self.request_state))
            .finish()
    }
}

impl fmt::Display for Sdo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#06x}:{:02x} {:?} {:?} {} bits \"{}\" \"{}\"",
            self.index, self.sub,
            self.object_code, self.entry_type, self.bit_length,
            self.object_name, self.description)?;
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        Ok(())
    }
}
