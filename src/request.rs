/*!
    reading and writing dictionary entries on slaves.

    Two paths exist, selected by [AccessMode::select] at every access:

    - **request**: used while the process data is exchanged, or as soon as a slave is operational. Each entry owns a request handle from the master engine and every access makes at most one step of a non-blocking state machine, so it can be called every cycle. A round-trip takes several cycles, during which accesses report [EthercatError::Busy].
    - **direct**: used otherwise. The access blocks until the mailbox round-trip completes.

    A blocking mailbox call during cyclic operation would stall the whole bus, so the request path is mandatory there.

    ## request state machine

    The state of an entry is the state last observed on its handle ([Sdo::request_state]). An upload:

    - `Unused`: submits a read, reports busy
    - `Busy`: reports busy
    - `Success` observed for the first time: decodes the buffer into the entry's value, reports success
    - `Success` already reported: submits a new read to refresh the value, reports busy
    - `Error` observed for the first time: reports the failure
    - `Error` already reported: submits a new read, reports busy

    A download encodes the given value and submits a write in `Unused` (reporting busy) and in `Success` (reporting success), so the last value set is always the one written. Errors are reported and resubmitted the same way as uploads. The entry's cached value only becomes the written one once its write is submitted, or completed on the direct path: a value refused or never sent leaves the cache as it was.

    The only transitions a handle can go through are `Unused → Busy`, `Busy → Busy | Success | Error`, `Success → Busy` and `Error → Busy`.
*/

use crate::{
    engine::{MasterEngine, MasterState, RequestState},
    sdo::{Sdo, SdoValue, EntryType, MAX_STRING_LENGTH},
    slave::Slave,
    registers::SdoAbortCode,
    error::{EthercatError, EthercatResult},
    };
use core::time::Duration;


/// how a dictionary access is performed
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessMode {
    /// asynchronous, through the entry's request handle
    Request,
    /// blocking, directly through the master engine
    Direct,
}

impl AccessMode {
    /**
        access mode for a slave in the given bus state

        Fails with [EthercatError::Link] when the link is down. The request path is chosen when the slave exchanges process data, or when any slave on the bus is operational.
    */
    pub fn select<T>(state: &MasterState, cyclic: bool) -> EthercatResult<Self, T> {
        if ! state.link_up
            {return Err(EthercatError::Link)}
        if cyclic || state.al_states.operational()
            {Ok(Self::Request)}
        else
            {Ok(Self::Direct)}
    }
}

/// true for the entry types whose values can be transfered
pub fn supported(entry_type: EntryType) -> bool {
    matches!(entry_type,
          EntryType::Boolean
        | EntryType::Integer8 | EntryType::Integer16 | EntryType::Integer32
        | EntryType::Unsigned8 | EntryType::Unsigned16 | EntryType::Unsigned32
        | EntryType::Real32
        | EntryType::VisibleString | EntryType::OctetString
        )
}

fn check_supported(sdo: &Sdo) -> EthercatResult<(), SdoAbortCode> {
    if supported(sdo.entry_type)  {Ok(())}
    else  {Err(EthercatError::Unsupported(sdo.entry_type))}
}

/// read the entry from the slave at the given position, updating its cached value on success
pub fn upload<E: MasterEngine>(engine: &mut E, mode: AccessMode, position: u16, sdo: &mut Sdo) -> EthercatResult<(), SdoAbortCode> {
    check_supported(sdo)?;
    match mode {
        AccessMode::Request => upload_request(sdo),
        AccessMode::Direct => upload_direct(engine, position, sdo),
    }
}

/// write a value of the entry to the slave at the given position
pub fn download<E: MasterEngine>(engine: &mut E, mode: AccessMode, position: u16, sdo: &mut Sdo, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
    check_supported(sdo)?;
    if value.entry_type() != sdo.entry_type
        {return Err(EthercatError::Master("value type does not match the dictionary entry"))}
    match mode {
        AccessMode::Request => download_request(sdo, value),
        AccessMode::Direct => download_direct(engine, position, sdo, value),
    }
}

/// update the observed state of the entry's handle, returning the previous and current states
fn observe(sdo: &mut Sdo) -> EthercatResult<(RequestState, RequestState), SdoAbortCode> {
    let current = sdo.request.as_ref()
        .ok_or(EthercatError::Master("no request handle, the bus is not in cyclic operation"))?
        .state();
    let previous = sdo.request_state;
    if current != previous {
        if ! previous.leads_to(current) {
            log::error!("request {:#06x}:{:02x} went from {} to {}", sdo.index, sdo.sub, previous, current);
        }
        sdo.request_state = current;
    }
    Ok((previous, current))
}

fn submit_read(sdo: &mut Sdo) -> EthercatResult<(), SdoAbortCode> {
    if let Some(request) = sdo.request.as_mut() {
        request.read();
        sdo.request_state = RequestState::Busy;
    }
    Err(EthercatError::Busy)
}

fn submit_write(sdo: &mut Sdo, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
    let request = sdo.request.as_mut()
        .ok_or(EthercatError::Master("no request handle"))?;
    value.encode::<SdoAbortCode>(request.data_mut())?;
    request.write();
    sdo.request_state = RequestState::Busy;
    sdo.value = Some(value);
    Ok(())
}

fn upload_request(sdo: &mut Sdo) -> EthercatResult<(), SdoAbortCode> {
    let (previous, current) = observe(sdo)?;
    match current {
        RequestState::Unused => submit_read(sdo),
        RequestState::Busy => Err(EthercatError::Busy),
        RequestState::Success if previous != RequestState::Success => {
            let value = match sdo.request.as_ref() {
                Some(request) => {
                    let size = request.data_size().min(request.data().len());
                    SdoValue::decode::<SdoAbortCode>(sdo.entry_type, &request.data()[.. size])?
                },
                None => return Err(EthercatError::Master("no request handle")),
            };
            sdo.value = Some(value);
            Ok(())
        },
        RequestState::Success => submit_read(sdo),
        RequestState::Error if previous != RequestState::Error =>
            Err(EthercatError::Request("dictionary upload failed")),
        RequestState::Error => submit_read(sdo),
    }
}

fn download_request(sdo: &mut Sdo, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
    let (previous, current) = observe(sdo)?;
    match current {
        RequestState::Unused => {
            submit_write(sdo, value)?;
            Err(EthercatError::Busy)
        },
        RequestState::Busy => Err(EthercatError::Busy),
        RequestState::Success => submit_write(sdo, value),
        RequestState::Error if previous != RequestState::Error =>
            Err(EthercatError::Request("dictionary download failed")),
        RequestState::Error => {
            submit_write(sdo, value)?;
            Err(EthercatError::Busy)
        },
    }
}

fn upload_direct<E: MasterEngine>(engine: &mut E, position: u16, sdo: &mut Sdo) -> EthercatResult<(), SdoAbortCode> {
    let mut buffer = [0u8; MAX_STRING_LENGTH];
    let size = engine.sdo_upload(position, sdo.index, sdo.sub, &mut buffer)?;
    sdo.value = Some(SdoValue::decode::<SdoAbortCode>(sdo.entry_type, &buffer[.. size.min(buffer.len())])?);
    Ok(())
}

fn download_direct<E: MasterEngine>(engine: &mut E, position: u16, sdo: &mut Sdo, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
    let mut buffer = [0u8; MAX_STRING_LENGTH];
    let size = value.encode::<SdoAbortCode>(&mut buffer[.. sdo.byte_size().min(MAX_STRING_LENGTH)])?;
    engine.sdo_download(position, sdo.index, sdo.sub, &buffer[.. size])?;
    sdo.value = Some(value);
    Ok(())
}

/// give every dictionary entry of a configured slave its request handle
pub fn attach_requests<E: MasterEngine>(engine: &mut E, slave: &mut Slave, timeout: Duration) -> EthercatResult {
    let config = slave.config
        .ok_or(EthercatError::Master("slave is not configured"))?;
    let position = slave.position();
    for sdo in slave.dictionary.iter_mut() {
        let mut request = engine.create_sdo_request(config, sdo.index, sdo.sub, sdo.byte_size())
            .map_err(|err| {
                log::error!("slave {}: cannot create request for {:#06x}:{:02x}: {}",
                    position, sdo.index, sdo.sub, err);
                EthercatError::Config("cannot create dictionary requests")
            })?;
        request.set_timeout(timeout);
        sdo.attach(request);
    }
    Ok(())
}

/// drop every request handle of a slave, they are invalid once the master engine is deactivated
pub fn detach_requests(slave: &mut Slave) {
    for sdo in slave.dictionary.iter_mut() {
        sdo.detach();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{AlMixedState, AlState};

    #[test]
    fn mode_selection() {
        let mut state = MasterState {slaves_responding: 1, al_states: AlState::PreOperational.into(), link_up: true};
        assert_eq!(AccessMode::select::<()>(&state, false).unwrap(), AccessMode::Direct);
        assert_eq!(AccessMode::select::<()>(&state, true).unwrap(), AccessMode::Request);

        state.al_states = AlMixedState::from_raw(0b1010);
        assert_eq!(AccessMode::select::<()>(&state, false).unwrap(), AccessMode::Request);

        state.link_up = false;
        assert!(matches!(AccessMode::select::<()>(&state, true), Err(EthercatError::Link)));
        assert!(matches!(AccessMode::select::<()>(&state, false), Err(EthercatError::Link)));
    }

    #[test]
    fn supported_types() {
        assert!(supported(EntryType::Unsigned32));
        assert!(supported(EntryType::VisibleString));
        assert!(! supported(EntryType::UnicodeString));
        assert!(! supported(EntryType::TimeOfDay));
        assert!(! supported(EntryType::Undefined));
    }
}
