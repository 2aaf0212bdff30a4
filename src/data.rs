//! Traits and impls used to read/write scalar values from/to the process data image.

use core::{
	marker::PhantomData,
	fmt,
	};

/**
	trait for data types than can be packed/unpacked to/from a byte buffer

	Values are little-endian, as everything transmitted on the bus.
*/
pub trait PduData: Sized {
    type Packed: Storage;

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()>;
    fn unpack(src: &[u8]) -> PackingResult<Self>;

    fn packed_size() -> usize  {Self::Packed::LEN}
    fn packed_bitsize() -> usize {Self::Packed::LEN*8}
}

/** Enum to identify and raise adapted error raised by this package
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PackingError {
    BadSize(usize, &'static str),
}

pub type PackingResult<T> = Result<T, PackingError>;


/// fixed size byte storage of a packed [PduData]
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {
    const LEN: usize;
}
impl<const N: usize> Storage for [u8; N] {
    const LEN: usize = N;
}

impl PduData for bool {
	type Packed = [u8; 1];

	fn pack(&self, dst: &mut [u8]) -> PackingResult<()>  {
        if dst.len() < Self::Packed::LEN
            {return Err(PackingError::BadSize(dst.len(), "no byte for bool"))}
        dst[0] = if *self {0b1} else {0b0};
        Ok(())
	}
	fn unpack(src: &[u8]) -> PackingResult<Self>  {
        if src.len() < Self::Packed::LEN
            {return Err(PackingError::BadSize(src.len(), "no byte for bool"))}
		Ok(src[0] & 0b1 == 0b1)
	}
}

/// macro implementing [PduData] for numeric types
macro_rules! num_pdudata {
	($t: ty) => { impl crate::data::PduData for $t {
            type Packed = [u8; core::mem::size_of::<$t>()];

            fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
				let size = dst.len();
				dst.get_mut(.. core::mem::size_of::<$t>())
					.ok_or(crate::data::PackingError::BadSize(size, "not enough bytes for integer"))?
					.copy_from_slice(&self.to_le_bytes());
				Ok(())
			}
			fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
				Ok(Self::from_le_bytes(src
					.get(.. core::mem::size_of::<$t>())
					.ok_or(crate::data::PackingError::BadSize(src.len(), "not enough bytes for integer"))?
					.try_into()
					.map_err(|_|  crate::data::PackingError::BadSize(src.len(), "not enough bytes for integer"))?
					))
			}
		}};
}

num_pdudata!(u8);
num_pdudata!(u16);
num_pdudata!(u32);
num_pdudata!(i8);
num_pdudata!(i16);
num_pdudata!(i32);
num_pdudata!(f32);



/**
	locate some data in a byte buffer by its byte position and length, which must be extracted to type `T` to be processed in rust

	It acts like a getter/setter of a value in a byte sequence. One can think of it as an offset to a data location because it does not actually point the data but only its offset in the byte sequence, it also contains its length to dynamically check memory bounds.
*/
#[derive(Default, Eq, Hash)]
pub struct Field<T: PduData> {
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
	/// start byte index of the object
	pub byte: usize,
	/// byte length of the object
	pub len: usize,
}
impl<T: PduData> Field<T>
{
	/// build a Field from its byte offset and byte length
	pub const fn new(byte: usize, len: usize) -> Self {
		Self{extracted: PhantomData, byte, len}
	}
	/// build a Field from its byte offset, infering its length from the data nominal size
	pub const fn simple(byte: usize) -> Self {
        Self{extracted: PhantomData, byte, len: T::Packed::LEN}
	}

	/// extract the value pointed by the field in the given byte array
	pub fn get(&self, data: &[u8]) -> PackingResult<T>       {
		T::unpack(data
			.get(self.byte .. self.byte + self.len)
			.ok_or(PackingError::BadSize(data.len(), "field exceeds data"))?)
	}
	/// dump the given value to the place pointed by the field in the byte array
	pub fn set(&self, data: &mut [u8], value: T) -> PackingResult<()>   {
		let size = data.len();
        value.pack(data
			.get_mut(self.byte .. self.byte + self.len)
			.ok_or(PackingError::BadSize(size, "field exceeds data"))?)
	}
}
impl<T: PduData> fmt::Debug for Field<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Field{{0x{:x}, {}}}", self.byte, self.len)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying a field pointing to a type which does not implement this operation
impl<T: PduData> Clone for Field<T> {
    fn clone(&self) -> Self   {Self::new(self.byte, self.len)}
}
impl<T: PduData> Copy for Field<T> {}
impl<T: PduData> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.byte == other.byte && self.len == other.len
    }
}


/**
	locate some data in a byte buffer by its bit position and length, which must be extracted to type `T` to be processed in rust

	It acts like a getter/setter of a value in a byte sequence. One can think of it as an offset to a data location because it does not actually point the data but only its offset in the byte sequence, it also contains its length to dynamically check memory bounds.

	Bits are numbered from the least significant bit of each byte, following the bus convention. Bits outside `len` are left untouched by [Self::set]
*/
#[derive(Default, Eq, PartialEq, Hash)]
pub struct BitField<T: PduData> {
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
	/// start bit index of the object
	pub bit: usize,
	/// bit length of the object
	pub len: usize,
}
impl<T: PduData> BitField<T> {
	/// build a Field from its content
	pub const fn new(bit: usize, len: usize) -> Self {
		Self{extracted: PhantomData, bit, len}
	}

	fn check(&self, size: usize) -> PackingResult<()> {
		if self.len > T::packed_bitsize() || T::Packed::LEN > 8
			{return Err(PackingError::BadSize(self.len, "bitfield larger than its type"))}
		if (self.bit + self.len + 7) / 8 > size
			{return Err(PackingError::BadSize(size, "bitfield exceeds data"))}
		Ok(())
	}
	/// extract the value pointed by the field in the given byte array
	pub fn get(&self, data: &[u8]) -> PackingResult<T>       {
		self.check(data.len())?;
		let mut raw = 0u64;
		for i in 0 .. self.len {
			let bit = self.bit + i;
			if (data[bit/8] >> (bit%8)) & 1 == 1
				{raw |= 1 << i}
		}
		T::unpack(&raw.to_le_bytes()[.. T::Packed::LEN])
	}
	/// dump the given value to the place pointed by the field in the byte array
	pub fn set(&self, data: &mut [u8], value: T) -> PackingResult<()>   {
		self.check(data.len())?;
		let mut packed = [0u8; 8];
		value.pack(&mut packed[.. T::Packed::LEN])?;
		let raw = u64::from_le_bytes(packed);
		for i in 0 .. self.len {
			let bit = self.bit + i;
			let mask = 1u8 << (bit%8);
			if (raw >> i) & 1 == 1  {data[bit/8] |= mask}
			else                    {data[bit/8] &= !mask}
		}
		Ok(())
	}
}
impl<T: PduData> fmt::Debug for BitField<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "BitField{{{}, {}}}", self.bit, self.len)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying a field pointing to a type which does not implement this operation
impl<T: PduData> Clone for BitField<T> {
    fn clone(&self) -> Self   {Self::new(self.bit, self.len)}
}
impl<T: PduData> Copy for BitField<T> {}
