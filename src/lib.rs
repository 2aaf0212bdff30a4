/*!
    Process data domain builder and dictionary request engine layered over an EtherCAT master engine.

    The master engine (scanning the bus, building frames, running mailboxes) is anything implementing [MasterEngine]. On top of it, [Master] discovers the slaves, builds their process data domain, exchanges it every cycle and reads or writes their dictionaries without ever blocking the cyclic exchange.

    - [engine] the interface expected from the master engine
    - [mapping] building the process data domain
    - [exchange] the per-cycle process data exchange
    - [request] dictionary accesses
    - [cyclic] periodic execution
*/

mod error;
mod data;
mod registers;
mod config;
mod pdo;
mod device;
mod sdo;
mod slave;
mod master;
pub mod engine;
pub mod mapping;
pub mod exchange;
pub mod request;
pub mod cyclic;

pub use crate::error::{EthercatError, EthercatResult};
pub use crate::data::{PduData, Field, BitField, PackingError, PackingResult};
pub use crate::registers::{AlState, AlMixedState, SdoAbortCode};
pub use crate::config::MasterConfig;
pub use crate::pdo::{PdoValue, ValueKind};
pub use crate::device::DeviceType;
pub use crate::sdo::{Sdo, SdoValue, SdoAccess, EntryType, ObjectCode, MAX_STRING_LENGTH};
pub use crate::slave::{Slave, SyncManager, Pdo};
pub use crate::master::{Master, BusState, Diagnostics, SdoHandle};
pub use crate::engine::{MasterEngine, SdoRequest, RequestState};

/// version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
