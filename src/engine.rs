/*!
    boundary with the master engine: the component building and exchanging frames on the wire, scanning the bus and running the mailbox protocols.

    This crate never touches the wire itself. Everything it knows about the bus comes through [MasterEngine], and every dictionary round-trip in realtime context goes through a [SdoRequest] handle created by the engine.

    The engine is expected to report slaves, sync managers, PDOs and entries always in the same order, since this order is the order of the registration table given back to it in [MasterEngine::register_pdo_entries]
*/

use crate::{
    error::EthercatResult,
    registers::{AlState, AlMixedState, SdoAbortCode},
    slave::SyncManager,
    mapping::Registration,
    };
use core::{fmt, time::Duration};


/// maximum length of names reported by the master engine
pub const MAX_NAME_LENGTH: usize = 64;
/// name of a slave, a PDO or a dictionary object
pub type Name = heapless::String<MAX_NAME_LENGTH>;


/// handle of a slave configuration created in the master engine
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlaveConfigIndex(pub u32);

/// handle of a process data domain created in the master engine
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DomainIndex(pub u32);


/// snapshot of the bus state
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MasterState {
    /// number of slaves answering on the bus
    pub slaves_responding: u32,
    /// union of the application-layer states of all slaves
    pub al_states: AlMixedState,
    /// true when at least one link is up
    pub link_up: bool,
}

/// scan status of the master engine
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MasterInfo {
    /// number of slaves found by the last scan
    pub slave_count: u32,
    pub link_up: bool,
    /// true while the engine is still scanning the bus
    pub scan_busy: bool,
}

/// identity of a slave as found by the bus scan
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SlaveInfo {
    /// ring position of the slave
    pub position: u16,
    /// configured station alias
    pub alias: u16,
    pub vendor_id: u32,
    pub product_code: u32,
    pub revision: u32,
    pub serial: u32,
    /// raw application-layer state
    pub al_state: u8,
    /// the slave reported an error in its status
    pub error_flag: bool,
    /// number of sync managers, including the mailbox ones
    pub sync_count: u8,
    /// number of objects in the slave's dictionary
    pub sdo_count: u16,
    pub name: Name,
}

/// direction of a sync manager, from the master's point of view
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncDirection {
    /// not reported by the slave
    Invalid,
    /// master writes, slave reads
    Output,
    /// slave writes, master reads
    Input,
    /// both directions, only found on mailbox sync managers
    Both,
}

/// sync manager description, without its PDOs
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyncManagerInfo {
    pub index: u8,
    pub direction: SyncDirection,
    /// zero on mailbox sync managers
    pub pdo_count: u8,
}

/// PDO description, without its entries
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PdoInfo {
    pub index: u16,
    pub entry_count: u8,
    pub name: Name,
}

/// PDO entry description
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PdoEntryInfo {
    /// dictionary index of the mapped object, zero for padding
    pub index: u16,
    pub sub: u8,
    pub bit_length: u8,
    pub name: Name,
}

/// dictionary object description
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SdoInfo {
    pub index: u16,
    /// highest subindex of the object
    pub max_subindex: u8,
    /// raw object code (variable, array, record ...)
    pub object_code: u8,
    pub name: Name,
}

/// dictionary subitem description
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SdoEntryInfo {
    /// raw data type code
    pub data_type: u16,
    pub bit_length: u16,
    /// read access in PREOP, SAFEOP, OP
    pub read_access: [bool; 3],
    /// write access in PREOP, SAFEOP, OP
    pub write_access: [bool; 3],
    pub description: Name,
}

/// completeness of the last exchange of a domain
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum WcState {
    /// no slave exchanged the domain data
    #[default]
    Zero,
    /// some slaves exchanged the domain data
    Incomplete,
    /// all registered slaves exchanged the domain data
    Complete,
}

/// state of a process data domain after the last cycle
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DomainState {
    pub working_counter: u32,
    pub wc_state: WcState,
}

/// state of a slave configured by the master
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SlaveConfigState {
    /// the slave is answering on the bus
    pub online: bool,
    /// the slave is in OP with its configuration applied
    pub operational: bool,
    /// raw application-layer state
    pub al_state: u8,
}
impl SlaveConfigState {
    pub fn state(&self) -> Option<AlState>  {AlState::from_raw(self.al_state)}
}


/// state of a dictionary request handle
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RequestState {
    /// never submitted
    #[default]
    Unused,
    /// submitted, awaiting its mailbox round-trip
    Busy,
    /// last round-trip completed, data is ready
    Success,
    /// last round-trip failed or timed out
    Error,
}
impl RequestState {
    /// true if a request in state `self` can be observed next in state `next`
    pub fn leads_to(self, next: Self) -> bool {
        use RequestState::*;
        matches!((self, next),
              (Unused, Busy)
            | (Busy, Busy)
            | (Busy, Success)
            | (Busy, Error)
            | (Success, Busy)
            | (Error, Busy)
            )
    }
}
impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Unused => "unused",
            Self::Busy => "busy",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

/**
    asynchronous dictionary request handle, created by [MasterEngine::create_sdo_request]

    Submitting a request only schedules it, the engine proceeds to the mailbox round-trip during the following cycles. The handle buffer has the size given at creation.

    A handle is only valid while the master engine is active, it is dropped on deactivation.
*/
pub trait SdoRequest: Send {
    /// dictionary index and subindex addressed
    fn address(&self) -> (u16, u8);
    /// current state of the request
    fn state(&self) -> RequestState;
    /// schedule an upload of the object into the buffer
    fn read(&mut self);
    /// schedule a download of the buffer to the object
    fn write(&mut self);
    /// complete buffer
    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];
    /// number of bytes transfered by the last upload
    fn data_size(&self) -> usize;
    /// round-trip timeout, after which the request ends in [RequestState::Error]
    fn set_timeout(&mut self, timeout: Duration);
}

/**
    master engine operations used by this crate.

    Inventory methods report what the engine found during its bus scan. Configuration methods are only valid before [Self::activate], cycle methods only after.

    The direct dictionary access ([Self::sdo_upload], [Self::sdo_download]) blocks until the mailbox round-trip completes, and must never be used while the process data exchange is running.
*/
pub trait MasterEngine {
    /// current bus state
    fn state(&self) -> EthercatResult<MasterState>;
    /// current scan status
    fn info(&self) -> EthercatResult<MasterInfo>;
    fn slave_info(&self, position: u16) -> EthercatResult<SlaveInfo>;
    fn sync_manager(&self, position: u16, sync: u8) -> EthercatResult<SyncManagerInfo>;
    fn pdo(&self, position: u16, sync: u8, pdo: u8) -> EthercatResult<PdoInfo>;
    fn pdo_entry(&self, position: u16, sync: u8, pdo: u8, entry: u8) -> EthercatResult<PdoEntryInfo>;
    /// object description by its position in the slave's dictionary
    fn sdo_info(&self, position: u16, sdo_position: u16) -> EthercatResult<SdoInfo>;
    fn sdo_entry_info(&self, position: u16, index: u16, sub: u8) -> EthercatResult<SdoEntryInfo>;

    /// create the configuration of the slave expected at the given address
    fn slave_config(&mut self, alias: u16, position: u16, vendor_id: u32, product_code: u32) -> EthercatResult<SlaveConfigIndex>;
    /// submit the PDO mapping of a slave configuration
    fn config_pdos(&mut self, config: SlaveConfigIndex, sync_managers: &[SyncManager]) -> EthercatResult;
    fn create_sdo_request(&mut self, config: SlaveConfigIndex, index: u16, sub: u8, size: usize) -> EthercatResult<Box<dyn SdoRequest>>;
    fn create_domain(&mut self) -> EthercatResult<DomainIndex>;
    /**
        register all the given PDO entries in the domain.

        On success, the engine has written the byte offset and bit position of each entry in its registration. On failure, nothing shall be kept registered.
    */
    fn register_pdo_entries(&mut self, domain: DomainIndex, registrations: &mut [Registration]) -> EthercatResult;
    /// apply the configuration and start the process data exchange
    fn activate(&mut self) -> EthercatResult;
    /// stop the process data exchange and drop all configurations, domains and request handles
    fn deactivate(&mut self) -> EthercatResult;

    /// process data buffer of an activated domain, `None` if the engine has no buffer for it
    fn domain_data(&mut self, domain: DomainIndex) -> Option<&mut [u8]>;
    fn domain_state(&self, domain: DomainIndex) -> EthercatResult<DomainState>;
    fn slave_config_state(&self, config: SlaveConfigIndex) -> EthercatResult<SlaveConfigState>;

    /// fetch received frames
    fn receive(&mut self) -> EthercatResult;
    /// evaluate received frames for the domain
    fn process(&mut self, domain: DomainIndex) -> EthercatResult;
    /// queue the domain data for sending
    fn queue(&mut self, domain: DomainIndex) -> EthercatResult;
    /// send queued frames
    fn send(&mut self) -> EthercatResult;

    /// blocking upload, returns the number of bytes written in `data`
    fn sdo_upload(&mut self, position: u16, index: u16, sub: u8, data: &mut [u8]) -> EthercatResult<usize, SdoAbortCode>;
    /// blocking download
    fn sdo_download(&mut self, position: u16, index: u16, sub: u8, data: &[u8]) -> EthercatResult<(), SdoAbortCode>;
    /// request an application-layer state for a slave
    fn request_al_state(&mut self, position: u16, state: AlState) -> EthercatResult;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_transitions() {
        use RequestState::*;
        let all = [Unused, Busy, Success, Error];
        let legal: Vec<_> = all.iter()
            .flat_map(|a| all.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a.leads_to(*b))
            .collect();
        assert_eq!(legal, [
            (Unused, Busy),
            (Busy, Busy), (Busy, Success), (Busy, Error),
            (Success, Busy),
            (Error, Busy),
            ]);
    }
}
