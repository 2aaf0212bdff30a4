/*!
    This module builds the process data domain of a bunch of slaves: the typed values each slave exchanges, and the registration table telling the master engine which entries to place in the domain buffer.

    It highlights
    - [Mapping::configure] to submit every slave's configuration and PDO mapping to the master engine
    - [Mapping::build] to allocate the slaves' values and produce the registration table
    - [Mapping::register] and [Mapping::apply] to get the buffer offsets from the master engine and store them in the slaves' values

    Example

    ```ignore
    Mapping::configure(&mut engine, &mut slaves)?;
    let mut mapping = Mapping::build(&mut slaves);
    let domain = engine.create_domain()?;
    mapping.register(&mut engine, domain)?;
    mapping.apply(&mut slaves);
    engine.activate()?;
    ```

    The registration table follows the order of slaves, then sync managers, then PDOs, then entries. Mailbox sync managers have no PDO and contribute nothing.
*/

use crate::{
    engine::{MasterEngine, DomainIndex, SyncDirection},
    pdo::{PdoValue, ValueKind},
    slave::Slave,
    error::{EthercatError, EthercatResult},
    };
use core::fmt;


/// direction of a value from the master's point of view
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// place of a registered value in the slaves' value arrays
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Slot {
    /// index of the slave in the slave table
    pub slave: usize,
    pub direction: Direction,
    /// index of the value in the slave's inputs or outputs
    pub value: usize,
}

/**
    one row of the registration table

    The identity fields are given to the master engine, which fills [Self::offset] and [Self::bit_position] when registering.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Registration {
    pub alias: u16,
    pub position: u16,
    pub vendor_id: u32,
    pub product_code: u32,
    /// dictionary index of the mapped object
    pub index: u16,
    pub sub: u8,
    pub bit_length: u8,
    /// byte offset in the domain buffer, set by the master engine
    pub offset: u32,
    /// bit position in the byte, set by the master engine
    pub bit_position: u8,
    /// value receiving the offsets
    pub slot: Slot,
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{} {:#010x}:{:#010x} {:#06x}:{:02x} {} bits {:?} @{}.{}",
            self.alias, self.position, self.vendor_id, self.product_code,
            self.index, self.sub, self.bit_length, self.slot.direction,
            self.offset, self.bit_position)
    }
}


/// transient registration table of a domain, see the module doc
#[derive(Clone, Debug, Default)]
pub struct Mapping {
    registrations: Vec<Registration>,
}

impl Mapping {
    /**
        create the configuration of every slave in the master engine and submit its PDO mapping

        All slaves must be accepted, the first failure aborts the whole configuration and no slave keeps a configuration handle.
    */
    pub fn configure<E: MasterEngine>(engine: &mut E, slaves: &mut [Slave]) -> EthercatResult {
        let mut configs = Vec::with_capacity(slaves.len());
        for slave in slaves.iter() {
            let config = engine.slave_config(slave.alias(), slave.position(), slave.vendor_id(), slave.product_code())
                .map_err(|err| {
                    log::error!("slave {}: configuration rejected: {}", slave.position(), err);
                    EthercatError::Config("cannot create slave configuration")
                })?;
            engine.config_pdos(config, slave.sync_managers())
                .map_err(|err| {
                    log::error!("slave {}: PDO mapping rejected: {}", slave.position(), err);
                    EthercatError::Config("cannot configure slave PDOs")
                })?;
            configs.push(config);
        }
        for (slave, config) in slaves.iter_mut().zip(configs) {
            slave.config = Some(config);
        }
        Ok(())
    }

    /**
        allocate the input and output values of every slave, and build the registration table

        Every value starts at zero. Entries with a length the process data cannot carry are kept in the table but marked [ValueKind::None] and never exchanged.
    */
    pub fn build(slaves: &mut [Slave]) -> Self {
        let mut registrations = Vec::new();
        for (position, slave) in slaves.iter_mut().enumerate() {
            let mut inputs = Vec::new();
            let mut outputs = Vec::new();

            for sync in slave.sync_managers().iter().filter(|sync| ! sync.is_mailbox()) {
                let (direction, values) = match sync.direction {
                    SyncDirection::Input => (Direction::Input, &mut inputs),
                    SyncDirection::Output => (Direction::Output, &mut outputs),
                    other => {
                        log::warn!("slave {}: sync manager {} skipped, direction {:?}",
                            slave.position(), sync.index, other);
                        continue
                    },
                };
                for pdo in &sync.pdos {
                    for entry in &pdo.entries {
                        let kind = if entry.index == 0 {ValueKind::None}
                            else {ValueKind::from_bitlength(entry.bit_length, slave.entry_type(entry.index, entry.sub))};
                        if kind == ValueKind::None && entry.index != 0 {
                            log::warn!("slave {}: entry {:#06x}:{:02x} of {} bits is not supported, it will not be exchanged",
                                slave.position(), entry.index, entry.sub, entry.bit_length);
                        }
                        registrations.push(Registration {
                            alias: slave.alias(),
                            position: slave.position(),
                            vendor_id: slave.vendor_id(),
                            product_code: slave.product_code(),
                            index: entry.index,
                            sub: entry.sub,
                            bit_length: entry.bit_length,
                            offset: 0,
                            bit_position: 0,
                            slot: Slot {slave: position, direction, value: values.len()},
                        });
                        values.push(PdoValue::new(entry.index, entry.sub, entry.bit_length, kind));
                    }
                }
            }
            slave.inputs = inputs;
            slave.outputs = outputs;
        }
        Self {registrations}
    }

    pub fn registrations(&self) -> &[Registration]  {&self.registrations}
    pub fn len(&self) -> usize  {self.registrations.len()}
    pub fn is_empty(&self) -> bool  {self.registrations.is_empty()}

    /// register the table in the given domain, the master engine sets the offsets of every row
    pub fn register<E: MasterEngine>(&mut self, engine: &mut E, domain: DomainIndex) -> EthercatResult {
        engine.register_pdo_entries(domain, &mut self.registrations)
            .map_err(|err| {
                log::error!("cannot register {} PDO entries: {}", self.registrations.len(), err);
                EthercatError::Config("cannot register PDO entries")
            })
    }

    /// store the registered offsets in the slaves' values, consuming the table
    pub fn apply(self, slaves: &mut [Slave]) -> EthercatResult {
        for row in self.registrations {
            let value = slaves.get_mut(row.slot.slave)
                .and_then(|slave| match row.slot.direction {
                    Direction::Input => slave.inputs.get_mut(row.slot.value),
                    Direction::Output => slave.outputs.get_mut(row.slot.value),
                })
                .ok_or(EthercatError::Config("registration does not match the slaves"))?;
            value.offset = row.offset;
            value.bit_offset = row.bit_position;
        }
        Ok(())
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} registered entries", self.registrations.len())?;
        for row in &self.registrations {
            writeln!(f, "  {}", row)?;
        }
        Ok(())
    }
}
