use crate::{
    engine::{MasterEngine, MasterState, DomainState},
    config::MasterConfig,
    slave::Slave,
    mapping::Mapping,
    exchange::ProcessData,
    request::{self, AccessMode},
    sdo::{Sdo, SdoValue},
    registers::{AlState, AlMixedState, SdoAbortCode},
    error::{EthercatError, EthercatResult},
    };
use core::fmt;


/// lifecycle state of the bus, as driven by [Master]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusState {
    /// slaves not discovered yet
    Uninitialized,
    /// slaves discovered, process data not exchanged yet
    Configured,
    /// process data is exchanged, dictionary accesses go through request handles
    Active,
    /// process data was exchanged and has been stopped, the master can be started again
    Stopped,
}

/// last snapshot of the bus diagnostics, see [Master::update_states]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Diagnostics {
    pub master: MasterState,
    /// state of the domain, only while active
    pub domain: Option<DomainState>,
}

/// cached location of a dictionary entry, returned by [Master::sdo_handle]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SdoHandle {
    slave: usize,
    entry: usize,
}
impl SdoHandle {
    pub fn slave(&self) -> usize  {self.slave}
}


/**
    This struct exposes the whole bus to the application: its slaves, their process data and their dictionaries.

    It owns the master engine and drives its lifecycle

    ```text
    Uninitialized --init--> Configured --start--> Active --stop--> Stopped --start--> Active ...
    ```

    and [Self::release] consumes it at any time.

    ## Note

    This struct is single-threaded by design: the process data buffer, the slaves' values and the dictionary requests are accessed without locks, always from the same task and between cycle boundaries. Stopping must not be requested in the middle of a cycle.

    ## Example

    The following is the typical sequence of an application

    ```ignore
    let mut master = Master::new(engine, MasterConfig::default());
    master.init()?;
    master.set_sdo_int(0, 0x6060, 0, 8)?;
    master.start()?;
    loop {
        master.receive()?;
        let position = master.get_input(0, 1)?;
        master.set_output(0, 1, position + 10)?;
        match master.get_sdo_int(0, 0x6075, 0) {
            Ok(current) => println!("rated current {}", current),
            Err(EthercatError::Busy) => {},
            Err(err) => return Err(err),
        }
        master.send()?;
    }
    ```
*/
pub struct Master<E: MasterEngine> {
    engine: E,
    config: MasterConfig,
    state: BusState,
    slaves: Vec<Slave>,
    /// registration table waiting for the next activation
    mapping: Option<Mapping>,
    /// buffer of the activated domain
    process: Option<ProcessData>,
    diagnostics: Diagnostics,
}

impl<E: MasterEngine> Master<E> {
    /// wrap a master engine, no communication is done before [Self::init]
    pub fn new(engine: E, config: MasterConfig) -> Self {
        Self {
            engine,
            config,
            state: BusState::Uninitialized,
            slaves: Vec::new(),
            mapping: None,
            process: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /**
        wait for the link and the end of the bus scan, then gather the description of every slave found and allocate their process data values.

        Fails if the link or the scan does not come within their timeouts, or if some slaves found by the scan are not responding.
    */
    pub fn init(&mut self) -> EthercatResult {
        if self.state != BusState::Uninitialized
            {return Err(EthercatError::Master("master already initialized"))}

        let mut state = self.engine.state()?;
        for _ in 0 .. self.config.attempts(self.config.link_timeout) {
            if state.link_up  {break}
            std::thread::sleep(self.config.poll_interval);
            state = self.engine.state()?;
        }
        if ! state.link_up {
            log::error!("link is still down after {:?}", self.config.link_timeout);
            return Err(EthercatError::Timeout("link is down"));
        }

        let mut info = self.engine.info()?;
        for _ in 0 .. self.config.attempts(self.config.scan_timeout) {
            if ! info.scan_busy  {break}
            std::thread::sleep(self.config.poll_interval);
            info = self.engine.info()?;
        }
        if info.scan_busy {
            log::error!("bus scan not finished after {:?}", self.config.scan_timeout);
            return Err(EthercatError::Timeout("bus scan"));
        }

        let state = self.engine.state()?;
        if info.slave_count != state.slaves_responding {
            log::error!("{} slaves found but {} responding", info.slave_count, state.slaves_responding);
            return Err(EthercatError::Config("slave count mismatch"));
        }

        let count = u16::try_from(info.slave_count)
            .map_err(|_| EthercatError::Protocol("too many slaves"))?;
        let mut slaves = (0 .. count)
            .map(|position| Slave::scan(&self.engine, position))
            .collect::<EthercatResult<Vec<_>>>()?;
        self.mapping = Some(Mapping::build(&mut slaves));
        self.slaves = slaves;
        self.state = BusState::Configured;
        log::info!("master {} configured with {} slaves", self.config.index, self.slaves.len());

        self.update_states()
    }

    /**
        configure every slave in the master engine, register the process data and activate it.

        On success the bus is [BusState::Active], process data must be exchanged every cycle and dictionary accesses go through request handles. On failure nothing of the attempted configuration is kept and the bus stays in its previous state.
    */
    pub fn start(&mut self) -> EthercatResult {
        match self.state {
            BusState::Configured | BusState::Stopped => {},
            BusState::Uninitialized => return Err(EthercatError::Master("master must be initialized before starting")),
            BusState::Active => return Err(EthercatError::Master("master already started")),
        }
        match self.activate() {
            Ok(process) => {
                for slave in self.slaves.iter_mut() {
                    slave.cyclic = true;
                }
                self.process = Some(process);
                self.state = BusState::Active;
                log::info!("master {} active, {} bytes of process data", self.config.index, process.size());
                self.update_states()
            },
            Err(err) => {
                log::error!("cannot start master {}: {}", self.config.index, err);
                if let Err(err) = self.engine.deactivate() {
                    log::error!("cannot deactivate after failed start: {}", err);
                }
                self.invalidate();
                Err(err)
            },
        }
    }

    fn activate(&mut self) -> EthercatResult<ProcessData> {
        Mapping::configure(&mut self.engine, &mut self.slaves)?;
        for slave in self.slaves.iter_mut() {
            request::attach_requests(&mut self.engine, slave, self.config.sdo_timeout)?;
        }
        let mut mapping = match self.mapping.take() {
            Some(mapping) => mapping,
            None => Mapping::build(&mut self.slaves),
        };
        let domain = self.engine.create_domain()
            .map_err(|err| {
                log::error!("cannot create domain: {}", err);
                EthercatError::Config("cannot create domain")
            })?;
        mapping.register(&mut self.engine, domain)?;
        log::debug!("{}", mapping);
        mapping.apply(&mut self.slaves)?;

        self.engine.activate()
            .map_err(|err| {
                log::error!("cannot activate: {}", err);
                EthercatError::Config("cannot activate master")
            })?;
        ProcessData::new(&mut self.engine, domain, &self.slaves)
    }

    /// forget everything depending on the master engine's configuration, which is gone after deactivation
    fn invalidate(&mut self) {
        self.process = None;
        self.mapping = None;
        self.diagnostics.domain = None;
        for slave in self.slaves.iter_mut() {
            slave.cyclic = false;
            slave.config = None;
            request::detach_requests(slave);
        }
    }

    /**
        stop the process data exchange.

        The process data buffer and every dictionary request handle become invalid, the next [Self::start] will register a fresh domain, with every process data value reset to zero.
    */
    pub fn stop(&mut self) -> EthercatResult {
        if self.state != BusState::Active
            {return Err(EthercatError::Master("master is not active"))}
        self.invalidate();
        self.state = BusState::Stopped;
        log::info!("master {} stopped", self.config.index);
        self.engine.deactivate()
    }

    /// stop if active, and give back the master engine
    pub fn release(mut self) -> E {
        if self.state == BusState::Active {
            if let Err(err) = self.stop() {
                log::error!("cannot stop master before release: {}", err);
            }
        }
        self.engine
    }

    /// stop cyclic operation after an error leaving the process data in an unknown state
    fn halt<T>(&mut self, err: EthercatError) -> EthercatResult<T> {
        log::error!("fatal process data error, stopping cyclic operation: {}", err);
        if let Err(err) = self.stop() {
            log::error!("cannot stop master: {}", err);
        }
        Err(err)
    }

    /**
        receive the frame of the current cycle and decode every slave's inputs.

        A buffer or offset error halts cyclic operation, the bus is then [BusState::Stopped].
    */
    pub fn receive(&mut self) -> EthercatResult {
        let process = self.process
            .ok_or(EthercatError::Master("master is not active"))?;
        match process.receive(&mut self.engine, &mut self.slaves) {
            Err(err @ EthercatError::Protocol(_)) => self.halt(err),
            other => other,
        }
    }

    /**
        encode every slave's outputs and send the frame of the current cycle.

        A buffer or offset error halts cyclic operation, the bus is then [BusState::Stopped].
    */
    pub fn send(&mut self) -> EthercatResult {
        let process = self.process
            .ok_or(EthercatError::Master("master is not active"))?;
        match process.send(&mut self.engine, &self.slaves) {
            Err(err @ EthercatError::Protocol(_)) => self.halt(err),
            other => other,
        }
    }

    /// a complete cycle without application: receive, refresh diagnostics, send
    ///
    /// The process data is sent even when the diagnostics cannot be refreshed, the first error is returned afterwards.
    pub fn cyclic(&mut self) -> EthercatResult {
        self.receive()?;
        let states = self.update_states();
        self.send()?;
        states
    }

    pub fn bus_state(&self) -> BusState  {self.state}
    pub fn config(&self) -> &MasterConfig  {&self.config}
    /// the master engine, for inspection only
    pub fn engine(&self) -> &E  {&self.engine}
    /**
        the master engine.

        This method is marked unsafe since acting on the engine behind this struct (configuring, activating, blocking dictionary calls) may break the lifecycle it drives.
    */
    pub unsafe fn engine_mut(&mut self) -> &mut E  {&mut self.engine}

    /// every slave found on the bus, in position order
    pub fn slaves(&self) -> &[Slave]  {&self.slaves}
    pub fn slave(&self, slave: usize) -> Option<&Slave>  {self.slaves.get(slave)}
    /// number of slaves found on the bus
    pub fn slave_count(&self) -> usize  {self.slaves.len()}

    fn check_link(&self) -> EthercatResult {
        if self.engine.state()?.link_up  {Ok(())}
        else  {Err(EthercatError::Link)}
    }
    fn get_slave(&self, slave: usize) -> EthercatResult<&Slave> {
        self.slaves.get(slave).ok_or(EthercatError::Master("no such slave"))
    }

    /// last decoded value of an input of a slave
    pub fn get_input(&self, slave: usize, index: usize) -> EthercatResult<i64> {
        self.check_link()?;
        self.get_slave(slave)?
            .inputs.get(index)
            .map(|value| value.value)
            .ok_or(EthercatError::Master("no such input"))
    }
    /// current value of an output of a slave
    pub fn get_output(&self, slave: usize, index: usize) -> EthercatResult<i64> {
        self.check_link()?;
        self.get_slave(slave)?
            .outputs.get(index)
            .map(|value| value.value)
            .ok_or(EthercatError::Master("no such output"))
    }
    /// set an output of a slave, it will be sent with the next frame
    pub fn set_output(&mut self, slave: usize, index: usize, value: i64) -> EthercatResult {
        self.check_link()?;
        let output = self.slaves.get_mut(slave)
            .ok_or(EthercatError::Master("no such slave"))?
            .outputs.get_mut(index)
            .ok_or(EthercatError::Master("no such output"))?;
        output.value = value;
        Ok(())
    }

    /// locate a dictionary entry once, for repeated accesses
    pub fn sdo_handle(&self, slave: usize, index: u16, sub: u8) -> EthercatResult<SdoHandle> {
        let entry = self.get_slave(slave)?
            .find_sdo(index, sub)
            .ok_or(EthercatError::NotFound{index, sub})?;
        Ok(SdoHandle {slave, entry})
    }
    /// description and cached value of a dictionary entry
    pub fn sdo(&self, handle: SdoHandle) -> Option<&Sdo> {
        self.slaves.get(handle.slave)?.dictionary.get(handle.entry)
    }

    fn access(&mut self, handle: SdoHandle) -> EthercatResult<(AccessMode, u16), SdoAbortCode> {
        let state = self.engine.state().map_err(EthercatError::upgrade)?;
        let slave = self.slaves.get(handle.slave)
            .ok_or(EthercatError::Master("no such slave"))?;
        if slave.dictionary.get(handle.entry).is_none()
            {return Err(EthercatError::Master("invalid dictionary handle"))}
        Ok((AccessMode::select(&state, slave.cyclic)?, slave.position()))
    }
    fn entry_mut(&mut self, handle: SdoHandle) -> EthercatResult<&mut Sdo, SdoAbortCode> {
        self.slaves.get_mut(handle.slave)
            .and_then(|slave| slave.dictionary.get_mut(handle.entry))
            .ok_or(EthercatError::Master("invalid dictionary handle"))
    }

    /**
        read a dictionary entry from its slave.

        While the bus is active this only makes one step of the entry's request, and reports [EthercatError::Busy] until the round-trip completes. Polling it every cycle keeps the value refreshed.
    */
    pub fn read_sdo(&mut self, handle: SdoHandle) -> EthercatResult<SdoValue, SdoAbortCode> {
        let (mode, position) = self.access(handle)?;
        let Self {engine, slaves, ..} = self;
        let sdo = slaves.get_mut(handle.slave)
            .and_then(|slave| slave.dictionary.get_mut(handle.entry))
            .ok_or(EthercatError::Master("invalid dictionary handle"))?;
        request::upload(engine, mode, position, sdo)?;
        sdo.value.clone().ok_or(EthercatError::Master("no value read"))
    }
    /**
        write a dictionary entry to its slave.

        The value must be of the entry's type. While the bus is active this only makes one step of the entry's request, the first write reports [EthercatError::Busy] and the next ones report success as soon as the previous round-trip completed.
    */
    pub fn write_sdo(&mut self, handle: SdoHandle, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
        let (mode, position) = self.access(handle)?;
        let Self {engine, slaves, ..} = self;
        let sdo = slaves.get_mut(handle.slave)
            .and_then(|slave| slave.dictionary.get_mut(handle.entry))
            .ok_or(EthercatError::Master("invalid dictionary handle"))?;
        request::download(engine, mode, position, sdo, value)
    }
    /// read a dictionary entry as an integer, a real gives its bit pattern
    pub fn read_sdo_int(&mut self, handle: SdoHandle) -> EthercatResult<i64, SdoAbortCode> {
        let value = self.read_sdo(handle)?;
        value.as_int().ok_or(EthercatError::Unsupported(value.entry_type()))
    }
    /// read a dictionary entry as text
    pub fn read_sdo_string(&mut self, handle: SdoHandle) -> EthercatResult<String, SdoAbortCode> {
        Ok(self.read_sdo(handle)?.to_string())
    }
    /// write a dictionary entry from an integer, truncated to the entry's width
    pub fn write_sdo_int(&mut self, handle: SdoHandle, value: i64) -> EthercatResult<(), SdoAbortCode> {
        let entry_type = self.entry_mut(handle)?.entry_type;
        self.write_sdo(handle, SdoValue::from_int::<SdoAbortCode>(entry_type, value)?)
    }
    /// write a dictionary entry from text
    pub fn write_sdo_string(&mut self, handle: SdoHandle, value: &str) -> EthercatResult<(), SdoAbortCode> {
        let entry_type = self.entry_mut(handle)?.entry_type;
        self.write_sdo(handle, SdoValue::from_text::<SdoAbortCode>(entry_type, value)?)
    }

    /// same as [Self::read_sdo] addressing the entry by index and subindex
    pub fn get_sdo(&mut self, slave: usize, index: u16, sub: u8) -> EthercatResult<SdoValue, SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.read_sdo(handle)
    }
    pub fn get_sdo_int(&mut self, slave: usize, index: u16, sub: u8) -> EthercatResult<i64, SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.read_sdo_int(handle)
    }
    pub fn get_sdo_string(&mut self, slave: usize, index: u16, sub: u8) -> EthercatResult<String, SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.read_sdo_string(handle)
    }
    /// same as [Self::write_sdo] addressing the entry by index and subindex
    pub fn set_sdo(&mut self, slave: usize, index: u16, sub: u8, value: SdoValue) -> EthercatResult<(), SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.write_sdo(handle, value)
    }
    pub fn set_sdo_int(&mut self, slave: usize, index: u16, sub: u8, value: i64) -> EthercatResult<(), SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.write_sdo_int(handle, value)
    }
    pub fn set_sdo_string(&mut self, slave: usize, index: u16, sub: u8, value: &str) -> EthercatResult<(), SdoAbortCode> {
        let handle = self.sdo_handle(slave, index, sub).map_err(EthercatError::upgrade)?;
        self.write_sdo_string(handle, value)
    }

    /// request an application-layer state for a slave
    pub fn switch(&mut self, slave: usize, target: AlState) -> EthercatResult {
        let position = self.get_slave(slave)?.position();
        log::debug!("slave {}: requesting {}", position, target);
        self.engine.request_al_state(position, target)
    }

    /// current bus state, from the master engine
    pub fn state(&self) -> EthercatResult<MasterState>  {self.engine.state()}
    /// number of slaves currently responding
    pub fn slaves_responding(&self) -> EthercatResult<u32>  {Ok(self.engine.state()?.slaves_responding)}
    /// union of the states of all slaves on the bus
    pub fn al_states(&self) -> EthercatResult<AlMixedState>  {Ok(self.engine.state()?.al_states)}
    pub fn link_up(&self) -> EthercatResult<bool>  {Ok(self.engine.state()?.link_up)}
    /// state of the domain after the last cycle, only while active
    pub fn domain_state(&self) -> EthercatResult<DomainState> {
        let process = self.process.as_ref()
            .ok_or(EthercatError::Master("master is not active"))?;
        self.engine.domain_state(process.domain())
    }
    /// last snapshot taken by [Self::update_states]
    pub fn diagnostics(&self) -> &Diagnostics  {&self.diagnostics}

    /**
        snapshot the bus, domain and slaves states.

        The states of configured slaves come from their configuration, the others from the bus scan.
    */
    pub fn update_states(&mut self) -> EthercatResult {
        let master = self.engine.state()?;
        if master.slaves_responding as usize != self.slaves.len() {
            log::warn!("{} slaves responding, {} expected", master.slaves_responding, self.slaves.len());
        }
        self.diagnostics.master = master;
        self.diagnostics.domain = match &self.process {
            Some(process) => Some(self.engine.domain_state(process.domain())?),
            None => None,
        };
        for slave in self.slaves.iter_mut() {
            slave.config_state = match slave.config {
                Some(config) => self.engine.slave_config_state(config)?,
                None => {
                    let info = self.engine.slave_info(slave.position())?;
                    crate::engine::SlaveConfigState {
                        online: true,
                        operational: AlState::from_raw(info.al_state) == Some(AlState::Operational),
                        al_state: info.al_state,
                    }
                },
            };
        }
        Ok(())
    }

    /// log the identity and mapping of every slave
    pub fn log_topology(&self) {
        for slave in &self.slaves {
            log::debug!("{}", slave);
        }
    }
    /// log the dictionary of every slave
    pub fn log_dictionaries(&self) {
        for slave in &self.slaves {
            log::debug!("slave {} dictionary, {} entries", slave.position(), slave.dictionary.len());
            for sdo in &slave.dictionary {
                log::debug!("  {}", sdo);
            }
        }
    }
    /// log the process data values of every slave
    pub fn log_process_data(&self) {
        for slave in &self.slaves {
            log::debug!("slave {} process data", slave.position());
            for value in slave.inputs() {
                log::debug!("  in  {}", value);
            }
            for value in slave.outputs() {
                log::debug!("  out {}", value);
            }
        }
    }
}

impl<E: MasterEngine> fmt::Debug for Master<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Master")
            .field("index", &self.config.index)
            .field("state", &self.state)
            .field("slaves", &self.slaves)
            .field("process", &self.process)
            .finish()
    }
}
