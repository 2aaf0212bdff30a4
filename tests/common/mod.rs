//! simulated master engine, replacing the wire and the mailbox with in-memory state the tests can drive

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
    };
use etherwrap::{
    engine::*,
    mapping::Registration,
    AlState, AlMixedState, SdoAbortCode, SyncManager,
    EthercatError, EthercatResult,
    };


pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// description of a simulated slave
#[derive(Clone, Debug, Default)]
pub struct SimSlave {
    pub info: SlaveInfo,
    pub syncs: Vec<(SyncDirection, Vec<(u16, Vec<(u16, u8, u8)>)>)>,
    pub objects: Vec<(SdoInfo, Vec<SdoEntryInfo>)>,
}

impl SimSlave {
    pub fn new(position: u16, vendor_id: u32, product_code: u32, revision: u32) -> Self {
        Self {
            info: SlaveInfo {
                position,
                vendor_id,
                product_code,
                revision,
                serial: 1000 + u32::from(position),
                al_state: AlState::PreOperational.raw(),
                name: "simulated".try_into().unwrap(),
                .. Default::default()
            },
            .. Default::default()
        }
    }
    /// add a sync manager with PDOs given as (index, [(entry index, sub, bit length)])
    pub fn sync(mut self, direction: SyncDirection, pdos: Vec<(u16, Vec<(u16, u8, u8)>)>) -> Self {
        self.syncs.push((direction, pdos));
        self
    }
    /// add a mailbox sync manager
    pub fn mailbox(self, direction: SyncDirection) -> Self {
        self.sync(direction, Vec::new())
    }
    /// add a variable object with one entry
    pub fn object(mut self, index: u16, data_type: EntryType, bit_length: u16) -> Self {
        self.objects.push((
            SdoInfo {index, max_subindex: 0, object_code: 7, name: "object".try_into().unwrap()},
            vec![SdoEntryInfo {
                data_type: data_type as u16,
                bit_length,
                read_access: [true; 3],
                write_access: [true; 3],
                description: "entry".try_into().unwrap(),
            }],
            ));
        self
    }
}

pub use etherwrap::EntryType;

/// a servo drive with mailbox, one output PDO and one input PDO
pub fn drive(position: u16) -> SimSlave {
    SimSlave::new(position, 0x22d2, 0x201, 0x0a000002)
        .mailbox(SyncDirection::Output)
        .mailbox(SyncDirection::Input)
        .sync(SyncDirection::Output, vec![
            (0x1600, vec![(0x6040, 0, 16), (0x607a, 0, 32)]),
            ])
        .sync(SyncDirection::Input, vec![
            (0x1a00, vec![(0x6041, 0, 16), (0x6064, 0, 32)]),
            ])
        .object(0x6040, EntryType::Unsigned16, 16)
        .object(0x607a, EntryType::Integer32, 32)
        .object(0x6041, EntryType::Unsigned16, 16)
        .object(0x6064, EntryType::Integer32, 32)
        .object(0x6075, EntryType::Unsigned32, 32)
        .object(0x6060, EntryType::Integer8, 8)
        .object(0x1008, EntryType::VisibleString, 64)
        .object(0x2000, EntryType::TimeOfDay, 48)
        .object(0x2001, EntryType::OctetString, 16)
}

/// an IO module with inputs only, a 32-bit word followed by a 16-bit word and a padding
pub fn io_module(position: u16) -> SimSlave {
    SimSlave::new(position, 0x22d2, 0x202, 0x1)
        .sync(SyncDirection::Input, vec![
            (0x1a00, vec![(0x6000, 1, 32), (0x6010, 1, 16), (0, 0, 8)]),
            ])
        .object(0x6000, EntryType::Unsigned32, 32)
        .object(0x6010, EntryType::Unsigned16, 16)
}

/// state of a simulated request handle, visible to the tests
#[derive(Clone, Debug, Default)]
pub struct RequestCell {
    pub state: RequestState,
    pub reads: usize,
    pub writes: usize,
    pub written: Vec<u8>,
    pub timeout: Duration,
}

/// everything the simulation shares between the engine, its request handles and the tests
#[derive(Default)]
pub struct Bus {
    pub slaves: Vec<SimSlave>,
    pub link_up: bool,
    pub al_states: u8,
    /// overrides the number of responding slaves
    pub responding: Option<u32>,
    /// number of scan checks still reporting a busy scan
    pub scan_polls: u32,

    pub configs: Vec<u16>,
    pub fail_slave_config: Option<u16>,
    pub fail_config_pdos: bool,
    pub domains: u32,
    pub registrations: Vec<Registration>,
    pub bit_cursor: u32,
    pub activated: bool,
    pub activations: usize,
    pub deactivations: usize,
    /// the master engine gives no process data buffer
    pub no_buffer: bool,
    /// frame content as seen on the wire
    pub wire: Vec<u8>,
    pub cycles: usize,

    /// object values stored in the slaves, by (position, index, sub)
    pub values: HashMap<(u16, u16, u8), Vec<u8>>,
    pub requests: HashMap<(u16, u16, u8), RequestCell>,
    pub uploads: usize,
    pub downloads: usize,
    pub al_requests: Vec<(u16, AlState)>,
}

impl Bus {
    /// total number of request submissions
    pub fn submissions(&self) -> usize {
        self.requests.values().map(|cell| cell.reads + cell.writes).sum()
    }
    pub fn request(&mut self, position: u16, index: u16, sub: u8) -> &mut RequestCell {
        self.requests.get_mut(&(position, index, sub)).expect("no such request")
    }
}

/// handle on the simulation for the tests
#[derive(Clone)]
pub struct Control(Arc<Mutex<Bus>>);

impl Control {
    pub fn bus(&self) -> MutexGuard<'_, Bus>  {self.0.lock().unwrap()}
    pub fn set_link(&self, up: bool)  {self.bus().link_up = up}
    /// end the pending round-trip of a request
    pub fn complete(&self, position: u16, index: u16, sub: u8, success: bool) {
        let mut bus = self.bus();
        let cell = bus.request(position, index, sub);
        assert_eq!(cell.state, RequestState::Busy, "request is not pending");
        cell.state = if success {RequestState::Success} else {RequestState::Error};
        if success && ! cell.written.is_empty() {
            let written = cell.written.clone();
            bus.values.insert((position, index, sub), written);
        }
    }
}


pub struct SimulatedMaster {
    bus: Arc<Mutex<Bus>>,
    domain: Option<Vec<u8>>,
}

impl SimulatedMaster {
    pub fn new(slaves: Vec<SimSlave>) -> Self {
        init_logging();
        let bus = Bus {
            slaves,
            link_up: true,
            al_states: AlState::PreOperational.raw(),
            .. Default::default()
        };
        Self {bus: Arc::new(Mutex::new(bus)), domain: None}
    }
    pub fn control(&self) -> Control  {Control(self.bus.clone())}
    fn bus(&self) -> MutexGuard<'_, Bus>  {self.bus.lock().unwrap()}
}

fn slave<'b>(bus: &'b Bus, position: u16) -> EthercatResult<&'b SimSlave> {
    bus.slaves.get(usize::from(position)).ok_or(EthercatError::Master("no such slave"))
}

impl MasterEngine for SimulatedMaster {
    fn state(&self) -> EthercatResult<MasterState> {
        let bus = self.bus();
        Ok(MasterState {
            slaves_responding: bus.responding.unwrap_or(bus.slaves.len() as u32),
            al_states: AlMixedState::from_raw(bus.al_states),
            link_up: bus.link_up,
        })
    }
    fn info(&self) -> EthercatResult<MasterInfo> {
        let mut bus = self.bus();
        let scan_busy = bus.scan_polls > 0;
        bus.scan_polls = bus.scan_polls.saturating_sub(1);
        Ok(MasterInfo {slave_count: bus.slaves.len() as u32, link_up: bus.link_up, scan_busy})
    }
    fn slave_info(&self, position: u16) -> EthercatResult<SlaveInfo> {
        let bus = self.bus();
        let mut info = slave(&bus, position)?.info.clone();
        info.sync_count = slave(&bus, position)?.syncs.len() as u8;
        info.sdo_count = slave(&bus, position)?.objects.len() as u16;
        Ok(info)
    }
    fn sync_manager(&self, position: u16, sync: u8) -> EthercatResult<SyncManagerInfo> {
        let bus = self.bus();
        let (direction, pdos) = slave(&bus, position)?.syncs.get(usize::from(sync))
            .ok_or(EthercatError::Master("no such sync manager"))?;
        Ok(SyncManagerInfo {index: sync, direction: *direction, pdo_count: pdos.len() as u8})
    }
    fn pdo(&self, position: u16, sync: u8, pdo: u8) -> EthercatResult<PdoInfo> {
        let bus = self.bus();
        let (index, entries) = slave(&bus, position)?.syncs.get(usize::from(sync))
            .and_then(|(_, pdos)| pdos.get(usize::from(pdo)))
            .ok_or(EthercatError::Master("no such pdo"))?;
        Ok(PdoInfo {index: *index, entry_count: entries.len() as u8, name: "pdo".try_into().unwrap()})
    }
    fn pdo_entry(&self, position: u16, sync: u8, pdo: u8, entry: u8) -> EthercatResult<PdoEntryInfo> {
        let bus = self.bus();
        let (index, sub, bit_length) = *slave(&bus, position)?.syncs.get(usize::from(sync))
            .and_then(|(_, pdos)| pdos.get(usize::from(pdo)))
            .and_then(|(_, entries)| entries.get(usize::from(entry)))
            .ok_or(EthercatError::Master("no such pdo entry"))?;
        Ok(PdoEntryInfo {index, sub, bit_length, name: "entry".try_into().unwrap()})
    }
    fn sdo_info(&self, position: u16, sdo_position: u16) -> EthercatResult<SdoInfo> {
        let bus = self.bus();
        slave(&bus, position)?.objects.get(usize::from(sdo_position))
            .map(|(info, _)| info.clone())
            .ok_or(EthercatError::Master("no such object"))
    }
    fn sdo_entry_info(&self, position: u16, index: u16, sub: u8) -> EthercatResult<SdoEntryInfo> {
        let bus = self.bus();
        slave(&bus, position)?.objects.iter()
            .find(|(info, _)| info.index == index)
            .and_then(|(_, entries)| entries.get(usize::from(sub)))
            .cloned()
            .ok_or(EthercatError::Master("no such entry"))
    }

    fn slave_config(&mut self, _alias: u16, position: u16, vendor_id: u32, product_code: u32) -> EthercatResult<SlaveConfigIndex> {
        let mut bus = self.bus();
        if bus.fail_slave_config == Some(position)
            {return Err(EthercatError::Master("configuration refused"))}
        let found = slave(&bus, position)?;
        if found.info.vendor_id != vendor_id || found.info.product_code != product_code
            {return Err(EthercatError::Master("identity mismatch"))}
        bus.configs.push(position);
        Ok(SlaveConfigIndex(bus.configs.len() as u32 - 1))
    }
    fn config_pdos(&mut self, config: SlaveConfigIndex, _sync_managers: &[SyncManager]) -> EthercatResult {
        let bus = self.bus();
        if bus.fail_config_pdos
            {return Err(EthercatError::Master("mapping refused"))}
        bus.configs.get(config.0 as usize).ok_or(EthercatError::Master("no such configuration"))?;
        Ok(())
    }
    fn create_sdo_request(&mut self, config: SlaveConfigIndex, index: u16, sub: u8, size: usize) -> EthercatResult<Box<dyn SdoRequest>> {
        let mut bus = self.bus();
        let position = *bus.configs.get(config.0 as usize).ok_or(EthercatError::Master("no such configuration"))?;
        bus.requests.insert((position, index, sub), RequestCell::default());
        Ok(Box::new(SimRequest {
            bus: self.bus.clone(),
            position,
            index,
            sub,
            data: vec![0; size],
            size: 0,
        }))
    }
    fn create_domain(&mut self) -> EthercatResult<DomainIndex> {
        let mut bus = self.bus();
        bus.domains += 1;
        bus.bit_cursor = 0;
        Ok(DomainIndex(bus.domains - 1))
    }
    fn register_pdo_entries(&mut self, _domain: DomainIndex, registrations: &mut [Registration]) -> EthercatResult {
        let mut bus = self.bus();
        for row in registrations.iter_mut() {
            if row.bit_length % 8 == 0 && bus.bit_cursor % 8 != 0 {
                bus.bit_cursor += 8 - bus.bit_cursor % 8;
            }
            row.offset = bus.bit_cursor / 8;
            row.bit_position = (bus.bit_cursor % 8) as u8;
            bus.bit_cursor += u32::from(row.bit_length);
        }
        bus.registrations = registrations.to_vec();
        Ok(())
    }
    fn activate(&mut self) -> EthercatResult {
        let mut bus = self.bus();
        let size = ((bus.bit_cursor + 7) / 8) as usize;
        bus.wire = vec![0; size];
        bus.activated = true;
        bus.activations += 1;
        drop(bus);
        self.domain = Some(vec![0; size]);
        Ok(())
    }
    fn deactivate(&mut self) -> EthercatResult {
        let mut bus = self.bus();
        bus.activated = false;
        bus.deactivations += 1;
        bus.configs.clear();
        bus.requests.clear();
        drop(bus);
        self.domain = None;
        Ok(())
    }

    fn domain_data(&mut self, _domain: DomainIndex) -> Option<&mut [u8]> {
        if self.bus().no_buffer  {return None}
        self.domain.as_deref_mut()
    }
    fn domain_state(&self, _domain: DomainIndex) -> EthercatResult<DomainState> {
        let bus = self.bus();
        Ok(DomainState {working_counter: 3 * bus.slaves.len() as u32, wc_state: WcState::Complete})
    }
    fn slave_config_state(&self, config: SlaveConfigIndex) -> EthercatResult<SlaveConfigState> {
        let bus = self.bus();
        let position = *bus.configs.get(config.0 as usize).ok_or(EthercatError::Master("no such configuration"))?;
        let al_state = slave(&bus, position)?.info.al_state;
        Ok(SlaveConfigState {
            online: bus.link_up,
            operational: al_state == AlState::Operational.raw(),
            al_state,
        })
    }

    fn receive(&mut self) -> EthercatResult {
        let bus = self.bus();
        if ! bus.activated
            {return Err(EthercatError::Master("not activated"))}
        let wire = bus.wire.clone();
        drop(bus);
        if let Some(domain) = self.domain.as_mut() {
            domain.copy_from_slice(&wire);
        }
        Ok(())
    }
    fn process(&mut self, _domain: DomainIndex) -> EthercatResult  {Ok(())}
    fn queue(&mut self, _domain: DomainIndex) -> EthercatResult  {Ok(())}
    fn send(&mut self) -> EthercatResult {
        let mut bus = self.bus();
        if let Some(domain) = self.domain.as_ref() {
            bus.wire.copy_from_slice(domain);
        }
        bus.cycles += 1;
        Ok(())
    }

    fn sdo_upload(&mut self, position: u16, index: u16, sub: u8, data: &mut [u8]) -> EthercatResult<usize, SdoAbortCode> {
        let mut bus = self.bus();
        bus.uploads += 1;
        let value = bus.values.get(&(position, index, sub))
            .ok_or(EthercatError::Slave(SdoAbortCode::InvalidIndex))?;
        let size = value.len().min(data.len());
        data[.. size].copy_from_slice(&value[.. size]);
        Ok(size)
    }
    fn sdo_download(&mut self, position: u16, index: u16, sub: u8, data: &[u8]) -> EthercatResult<(), SdoAbortCode> {
        let mut bus = self.bus();
        bus.downloads += 1;
        bus.values.insert((position, index, sub), data.to_vec());
        Ok(())
    }
    fn request_al_state(&mut self, position: u16, state: AlState) -> EthercatResult {
        let mut bus = self.bus();
        slave(&bus, position)?;
        bus.al_requests.push((position, state));
        Ok(())
    }
}


/// request handle of the simulation, its round-trips are ended by [Control::complete]
pub struct SimRequest {
    bus: Arc<Mutex<Bus>>,
    position: u16,
    index: u16,
    sub: u8,
    data: Vec<u8>,
    size: usize,
}

impl SimRequest {
    fn with_cell<R>(&self, task: impl FnOnce(&mut RequestCell) -> R) -> R {
        let mut bus = self.bus.lock().unwrap();
        task(bus.request(self.position, self.index, self.sub))
    }
}

impl SdoRequest for SimRequest {
    fn address(&self) -> (u16, u8)  {(self.index, self.sub)}
    fn state(&self) -> RequestState  {self.with_cell(|cell| cell.state)}
    fn read(&mut self) {
        // the uploaded content is the object value at submission
        let value = self.bus.lock().unwrap()
            .values.get(&(self.position, self.index, self.sub))
            .cloned()
            .unwrap_or_default();
        self.size = value.len().min(self.data.len());
        self.data[.. self.size].copy_from_slice(&value[.. self.size]);
        self.with_cell(|cell| {
            cell.reads += 1;
            cell.state = RequestState::Busy;
        });
    }
    fn write(&mut self) {
        let written = self.data.clone();
        self.with_cell(|cell| {
            cell.writes += 1;
            cell.written = written;
            cell.state = RequestState::Busy;
        });
    }
    fn data(&self) -> &[u8]  {&self.data}
    fn data_mut(&mut self) -> &mut [u8]  {&mut self.data}
    fn data_size(&self) -> usize  {self.size}
    fn set_timeout(&mut self, timeout: Duration)  {self.with_cell(|cell| cell.timeout = timeout)}
}
