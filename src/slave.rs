
use crate::{
    engine::{MasterEngine, SlaveInfo, SyncDirection, PdoEntryInfo, SlaveConfigIndex, SlaveConfigState, Name},
    device::DeviceType,
    pdo::PdoValue,
    sdo::{Sdo, EntryType},
    registers::AlState,
    error::EthercatResult,
    };
use core::fmt;


/// sync manager of a slave with its assigned PDOs
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncManager {
    pub index: u8,
    pub direction: SyncDirection,
    /// empty for mailbox sync managers
    pub pdos: Vec<Pdo>,
}

/// PDO assigned to a sync manager, with its mapped entries in mapping order
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pdo {
    pub index: u16,
    pub name: Name,
    pub entries: Vec<PdoEntryInfo>,
}

impl SyncManager {
    /// a sync manager without PDO only carries the mailbox
    pub fn is_mailbox(&self) -> bool  {self.pdos.is_empty()}
    /// number of entries in all its PDOs
    pub fn entry_count(&self) -> usize  {self.pdos.iter().map(|pdo| pdo.entries.len()).sum()}
}


/**
    everything known about one slave on the bus: its identity, its mapping, the values it exchanges and its dictionary

    A slave is discovered by [Self::scan] at bus initialization, then owned by [crate::Master]. Its process data values are allocated by [crate::mapping::Mapping] and exchanged every cycle, its dictionary entries are read and written by [crate::request].

    ## Example

    ```ignore
    let slave = master.slave(0).unwrap();
    println!("{} is a {}", slave.name(), slave.device());
    for value in slave.inputs() {
        println!("  {}", value);
    }
    ```
*/
pub struct Slave {
    info: SlaveInfo,
    device: DeviceType,
    sync_managers: Vec<SyncManager>,
    pub(crate) dictionary: Vec<Sdo>,

    pub(crate) inputs: Vec<PdoValue>,
    pub(crate) outputs: Vec<PdoValue>,

    /// configuration handle in the master engine, while configured
    pub(crate) config: Option<SlaveConfigIndex>,
    /// true only while the bus is activated and process data is exchanged
    pub(crate) cyclic: bool,
    /// last state snapshot of the slave configuration
    pub(crate) config_state: SlaveConfigState,
}

impl Slave {
    /// gather a slave's description from what the master engine found during its bus scan
    pub fn scan<E: MasterEngine>(engine: &E, position: u16) -> EthercatResult<Self> {
        let info = engine.slave_info(position)?;

        let mut sync_managers = Vec::with_capacity(info.sync_count.into());
        for sync in 0 .. info.sync_count {
            let header = engine.sync_manager(position, sync)?;
            let mut pdos = Vec::with_capacity(header.pdo_count.into());
            for pdo in 0 .. header.pdo_count {
                let pdo_info = engine.pdo(position, sync, pdo)?;
                let entries = (0 .. pdo_info.entry_count)
                    .map(|entry| engine.pdo_entry(position, sync, pdo, entry))
                    .collect::<EthercatResult<Vec<_>>>()?;
                pdos.push(Pdo {index: pdo_info.index, name: pdo_info.name, entries});
            }
            if ! pdos.is_empty() && matches!(header.direction, SyncDirection::Invalid | SyncDirection::Both) {
                log::warn!("slave {}: sync manager {} has PDOs but direction {:?}", position, sync, header.direction);
            }
            sync_managers.push(SyncManager {index: header.index, direction: header.direction, pdos});
        }

        let mut dictionary = Vec::new();
        if info.sdo_count == 0 {
            log::warn!("slave {}: no dictionary", position);
        }
        for sdo_position in 0 .. info.sdo_count {
            let object = match engine.sdo_info(position, sdo_position) {
                Ok(object) => object,
                Err(err) => {
                    log::warn!("slave {}: cannot read object {}: {}", position, sdo_position, err);
                    continue
                },
            };
            for sub in 0 ..= object.max_subindex {
                match engine.sdo_entry_info(position, object.index, sub) {
                    Ok(entry) => dictionary.push(Sdo::new(&object, sub, &entry)),
                    Err(err) => log::warn!("slave {}: cannot read entry {:#06x}:{:02x}: {}",
                                    position, object.index, sub, err),
                }
            }
        }
        log::debug!("slave {}: {:?} with {} sync managers and {} dictionary entries",
            position, info.name, sync_managers.len(), dictionary.len());

        Ok(Self::new(info, sync_managers, dictionary))
    }

    /// slave from an already known description
    pub fn new(info: SlaveInfo, sync_managers: Vec<SyncManager>, dictionary: Vec<Sdo>) -> Self {
        Self {
            device: DeviceType::classify(info.vendor_id, info.product_code, info.revision),
            info,
            sync_managers,
            dictionary,
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: None,
            cyclic: false,
            config_state: SlaveConfigState::default(),
        }
    }

    pub fn info(&self) -> &SlaveInfo  {&self.info}
    pub fn position(&self) -> u16  {self.info.position}
    pub fn alias(&self) -> u16  {self.info.alias}
    pub fn vendor_id(&self) -> u32  {self.info.vendor_id}
    pub fn product_code(&self) -> u32  {self.info.product_code}
    pub fn revision(&self) -> u32  {self.info.revision}
    pub fn serial(&self) -> u32  {self.info.serial}
    pub fn name(&self) -> &str  {&self.info.name}
    pub fn device(&self) -> DeviceType  {self.device}
    pub fn sync_managers(&self) -> &[SyncManager]  {&self.sync_managers}

    /// values read from the slave every cycle, in mapping order
    pub fn inputs(&self) -> &[PdoValue]  {&self.inputs}
    /// values written to the slave every cycle, in mapping order
    pub fn outputs(&self) -> &[PdoValue]  {&self.outputs}
    pub fn dictionary(&self) -> &[Sdo]  {&self.dictionary}

    /// true while the process data of this slave is exchanged
    pub fn is_cyclic(&self) -> bool  {self.cyclic}
    /// last snapshot of the slave state, see [crate::Master::update_states]
    pub fn config_state(&self) -> SlaveConfigState  {self.config_state}
    /// application-layer state from the last snapshot
    pub fn state(&self) -> Option<AlState>  {self.config_state.state()}

    /// position of the given object in the dictionary
    pub fn find_sdo(&self, index: u16, sub: u8) -> Option<usize> {
        self.dictionary.iter().position(|sdo| sdo.index == index && sdo.sub == sub)
    }
    pub fn sdo(&self, index: u16, sub: u8) -> Option<&Sdo> {
        self.find_sdo(index, sub).map(|i| &self.dictionary[i])
    }
    /// entry type of the given object if it is in the dictionary
    pub(crate) fn entry_type(&self, index: u16, sub: u8) -> Option<EntryType> {
        self.sdo(index, sub).map(|sdo| sdo.entry_type)
    }
}

impl fmt::Debug for Slave {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Slave")
            .field("position", &self.info.position)
            .field("name", &self.info.name)
            .field("device", &self.device)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("dictionary", &self.dictionary.len())
            .field("cyclic", &self.cyclic)
            .finish()
    }
}

/// topology description: identity and mapping
impl fmt::Display for Slave {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "slave {} \"{}\" ({}) vendor {:#010x} product {:#010x} revision {:#010x} serial {:#010x}",
            self.info.position, self.info.name, self.device,
            self.info.vendor_id, self.info.product_code, self.info.revision, self.info.serial)?;
        for sync in &self.sync_managers {
            writeln!(f, "  sync manager {} {:?}{}", sync.index, sync.direction,
                if sync.is_mailbox() {" (mailbox)"} else {""})?;
            for pdo in &sync.pdos {
                writeln!(f, "    pdo {:#06x} \"{}\"", pdo.index, pdo.name)?;
                for entry in &pdo.entries {
                    writeln!(f, "      {:#06x}:{:02x} {} bits \"{}\"", entry.index, entry.sub, entry.bit_length, entry.name)?;
                }
            }
        }
        Ok(())
    }
}
