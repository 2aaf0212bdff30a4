/*!
    state and code values exchanged with the master engine about slaves: application-layer states and dictionary abort codes.

    These are the standard values of ETG.1000.6, so what you see here is exactly what a slave may report, no more, no less.
*/

use core::fmt;
use bilge::prelude::*;


/**
    the current operation state on one device.

    This is the enum version, useful when communicating with one slave only

    Except [Self::Bootstrap], changing to any mode can be requested from any upper mode or from the preceding one.

    ETG.1000.6 table 9
*/
#[bitsize(4)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlState {
    /**
        Transitional state meaning the slave is booting up and ready for nothing yet.

        It cannot be requested, nor changed while it is active.
    */
    Bootstrap = 3,
    /// only registers can be used, no mailbox and no process data
    Init = 1,
    /**
        mailbox communication is enabled, this is where dictionary objects are usually configured before realtime operations.

        The direct (blocking) dictionary access is safe in this state.
    */
    PreOperational = 2,
    /**
        realtime operations, except that outputs sent to the slave are not applied.

        Mapping is no more allowed in this state.
    */
    SafeOperational = 4,
    /**
        Realtime operations running

        The master has full access to the slave's effector functions. slaves might expect the master to regularly refresh its commands.
    */
    Operational = 8,
}

impl AlState {
    /// decode the raw state value reported by the master engine
    pub fn from_raw(raw: u8) -> Option<Self> {
        if raw > 0xf  {return None}
        Self::try_from(u4::new(raw)).ok()
    }
    /// raw state value as expected by the master engine
    pub fn raw(self) -> u8  {u4::from(self).value()}
}

impl fmt::Display for AlState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Self::Bootstrap => "BOOT",
			Self::Init => "INIT",
			Self::PreOperational => "PREOP",
			Self::SafeOperational => "SAFEOP",
			Self::Operational => "OP",
		})
	}
}

/**
	gather the current operation states on several devices
	this struct does not provide any way to know which slave is in which state

	This is the bitfield version, as reported by the master engine for the whole bus

    ETG.1000.6 table 9
*/
#[bitsize(4)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct AlMixedState {
    /// one slave at least is in [AlState::Init]
	pub init: bool,
	/// one slave at least is in [AlState::PreOperational]
	pub pre_operational: bool,
	/// one slave at least is in [AlState::SafeOperational]
	pub safe_operational: bool,
	/// one slave at least is in [AlState::Operational]
	pub operational: bool,
}

impl AlMixedState {
    /// decode the bus states bitmask reported by the master engine, upper bits are ignored
    pub fn from_raw(mask: u8) -> Self  {Self::from(u4::new(mask & 0xf))}
    /// bitmask as reported by the master engine
    pub fn raw(self) -> u8  {u4::from(self).value()}
}

impl fmt::Display for AlMixedState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}{{", core::any::type_name::<Self>()) ?;
		for (active, mark) in [ (self.init(), "init"),
								(self.pre_operational(), "pre"),
								(self.safe_operational(), "safe"),
								(self.operational(), "op"),
								] {
			write!(f, " ")?;
			if active {
				write!(f, "{}", mark)?;
			} else {
				for _ in 0 .. mark.len() {write!(f, " ")?;}
			}
		}
		write!(f, "}}")?;
		Ok(())
	}
}

impl TryFrom<AlMixedState> for AlState {
    type Error = &'static str;
    fn try_from(state: AlMixedState) -> Result<Self, Self::Error> {
        Self::try_from(u4::from(state)).map_err(|_|  "cannot unwrap when not only 1 state in mix")
    }
}
impl From<AlState> for AlMixedState {
    fn from(state: AlState) -> Self {
        Self::from(u4::from(state))
    }
}


/// reason of an aborted dictionary transfer, as reported by the slave
///
/// ETG.1000.6 table 41
#[bitsize(32)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SdoAbortCode {
    /// Toggle bit not changed
    BadToggle = 0x05_03_00_00,
    /// SDO protocol timeout
    Timeout = 0x05_04_00_00,
    /// Client/Server command specifier not valid or unknown
    UnsupportedCommand = 0x05_04_00_01,
    /// Out of memory
    OufOfMemory = 0x05_04_00_05,
    /// Unsupported access to an object
    UnsupportedAccess = 0x06_01_00_00,
    /// Attempt to read to a write only object
    WriteOnly = 0x06_01_00_01,
    /// Attempt to write to a read only object
    ReadOnly = 0x06_01_00_02,
    /// Subindex cannot be written, SI0 must be 0 for write access
    WriteError = 0x06_01_00_03,
    /// SDO Complete access not supported for objects of variable length such as ENUM object types
    VariableLength = 0x06_01_00_04,
    /// Object length exceeds mailbox size
    ObjectTooBig = 0x06_01_00_05,
    /// Object mapped to RxPDO, SDO Download blocked
    LockedByPdo = 0x06_01_00_06,
    /// The object does not exist in the object directory
    InvalidIndex = 0x06_02_00_00,
    /// The object can not be mapped into the PDO
    CannotMap = 0x06_04_00_41,
    /// The number and length of the objects to be mapped would exceed the PDO length
    PdoTooSmall = 0x06_04_00_42,
    /// General parameter incompatibility reason
    IncompatibleParameter = 0x06_04_00_43,
    /// General internal incompatibility in the device
    IncompatibleDevice = 0x06_04_00_47,
    /// Access failed due to a hardware error
    HardwareError = 0x06_06_00_00,
    /// Data type does not match, length of service parameter does not match
    InvalidLength = 0x06_07_00_10,
    /// Data type does not match, length of service parameter too high
    ServiceTooBig = 0x06_07_00_12,
    /// Data type does not match, length of service parameter too low
    ServiceTooSmall = 0x06_07_00_13,
    /// Subindex does not exist
    InvalidSubIndex = 0x06_09_00_11,
    /// Value range of parameter exceeded (only for write access)
    ValueOutOfRange = 0x06_09_00_30,
    /// Value of parameter written too high
    ValueTooHigh = 0x06_09_00_31,
    /// Value of parameter written too low
    ValueTooLow = 0x06_09_00_32,
    /// Maximum value is less than minimum value
    InvalidRange = 0x06_09_00_36,
    /// General error
    GeneralError = 0x08_00_00_00,
    /// Data cannot be transferred or stored to the application
    Refused = 0x08_00_00_20,
    /// Data cannot be transferred or stored to the application because of local control
    ApplicationRefused = 0x08_00_00_21,
    /// Data cannot be transferred or stored to the application because of the present device state
    StateRefused = 0x08_00_00_22,
    /// Object dictionary dynamic generation fails or no object dictionary is present
    DictionnaryEmpty = 0x08_00_00_23,
}

impl SdoAbortCode {
    /// decode an abort code reported by the master engine, unknown codes are reported as [Self::GeneralError]
    pub fn from_raw(code: u32) -> Self {
        Self::try_from(code).unwrap_or(Self::GeneralError)
    }
    pub fn object_related(self) -> bool   {u32::from(self) >> 24 == 0x06}
    pub fn subitem_related(self) -> bool  {u32::from(self) >> 16 == 0x06_09}
    pub fn mapping_related(self) -> bool  {u32::from(self) >> 16 == 0x06_04}
    pub fn device_related(self) -> bool   {u32::from(self) >> 24 == 0x08}
    pub fn protocol_related(self) -> bool {u32::from(self) >> 24 == 0x05}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn al_state_raw() {
        assert_eq!(AlState::from_raw(8), Some(AlState::Operational));
        assert_eq!(AlState::from_raw(2), Some(AlState::PreOperational));
        assert_eq!(AlState::from_raw(6), None);
        assert_eq!(AlState::from_raw(0x18), None);
        assert_eq!(AlState::SafeOperational.raw(), 4);
    }

    #[test]
    fn mixed_state() {
        let mixed = AlMixedState::from_raw(0b1010);
        assert!(mixed.operational());
        assert!(mixed.pre_operational());
        assert!(! mixed.init());
        assert_eq!(mixed.raw(), 0b1010);
        assert!(AlState::try_from(mixed).is_err());
        assert_eq!(AlState::try_from(AlMixedState::from(AlState::Init)), Ok(AlState::Init));
    }

    #[test]
    fn abort_code_groups() {
        assert_eq!(SdoAbortCode::from_raw(0x0602_0000), SdoAbortCode::InvalidIndex);
        assert!(SdoAbortCode::InvalidIndex.object_related());
        assert!(SdoAbortCode::InvalidSubIndex.subitem_related());
        assert!(SdoAbortCode::Timeout.protocol_related());
        assert_eq!(SdoAbortCode::from_raw(0x1234), SdoAbortCode::GeneralError);
    }
}
