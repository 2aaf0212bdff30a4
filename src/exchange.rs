/*!
    cyclic exchange of the process data between the slaves' values and the domain buffer of the master engine.

    Every cycle runs [ProcessData::receive] then [ProcessData::send], with the application reading inputs and setting outputs in between. Nothing here allocates or blocks.
*/

use crate::{
    engine::{MasterEngine, DomainIndex},
    slave::Slave,
    error::{EthercatError, EthercatResult},
    };


/// the activated domain and the size of its buffer
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProcessData {
    domain: DomainIndex,
    size: usize,
}

impl ProcessData {
    /**
        process data of an activated domain

        Fails if the master engine gives no buffer for it, or if a registered value lays outside the buffer.
    */
    pub fn new<E: MasterEngine>(engine: &mut E, domain: DomainIndex, slaves: &[Slave]) -> EthercatResult<Self> {
        let size = engine.domain_data(domain)
            .ok_or(EthercatError::Config("no process data buffer"))?
            .len();
        for slave in slaves {
            for value in slave.inputs().iter().chain(slave.outputs()) {
                if value.end().map_or(false, |end| end > size) {
                    log::error!("slave {}: entry {:#06x}:{:02x} at offset {} exceeds process data of {} bytes",
                        slave.position(), value.index(), value.sub(), value.offset(), size);
                    return Err(EthercatError::Config("registered entry outside the process data"));
                }
            }
        }
        Ok(Self {domain, size})
    }

    pub fn domain(&self) -> DomainIndex  {self.domain}
    /// byte size of the domain buffer
    pub fn size(&self) -> usize  {self.size}

    /// fetch the received frame and decode every input value
    pub fn receive<E: MasterEngine>(&self, engine: &mut E, slaves: &mut [Slave]) -> EthercatResult {
        engine.receive()?;
        engine.process(self.domain)?;
        decode_inputs(self.buffer(engine)?, slaves)
    }

    /// encode every output value and send the frame
    pub fn send<E: MasterEngine>(&self, engine: &mut E, slaves: &[Slave]) -> EthercatResult {
        encode_outputs(self.buffer(engine)?, slaves)?;
        engine.queue(self.domain)?;
        engine.send()
    }

    fn buffer<'e, E: MasterEngine>(&self, engine: &'e mut E) -> EthercatResult<&'e mut [u8]> {
        engine.domain_data(self.domain)
            .ok_or(EthercatError::Protocol("process data buffer vanished"))
    }
}

/// decode every input value of every slave from the buffer, in slave and mapping order
pub fn decode_inputs(data: &[u8], slaves: &mut [Slave]) -> EthercatResult {
    for slave in slaves {
        for value in slave.inputs.iter_mut() {
            value.decode(data)?;
        }
    }
    Ok(())
}

/// encode every output value of every slave into the buffer, in slave and mapping order
pub fn encode_outputs(data: &mut [u8], slaves: &[Slave]) -> EthercatResult {
    for slave in slaves {
        for value in slave.outputs.iter() {
            value.encode(data)?;
        }
    }
    Ok(())
}
