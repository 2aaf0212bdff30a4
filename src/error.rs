//! definition of the general ethercat error type

use std::sync::Arc;
use core::fmt;
use crate::sdo::EntryType;

/**
    general object reporting an unexpected result regarding ethercat communication

    Its variant are meant to help finding the cause responsible for the problem and how to deal with it.

    [Self::Slave] variant should not be used without an appropriate type for `T`, `T` depend on the operation the slave reports for, and is usually an error code, or an enum.
*/
#[derive(Clone, Debug)]
pub enum EthercatError<T=()> {
    /// error caused by the master engine's communication support
    ///
    /// these errors are exterior to this library
    Io(Arc<std::io::Error>),

    /// the ethernet link of the master is down
    ///
    /// any access fails with this error until the link comes back, the operation can then be retried
    Link,

    /// a dictionary request is still in flight
    ///
    /// this is the expected steady state during a mailbox round-trip, the caller should poll again on a later cycle
    Busy,

    /// the last mailbox round-trip failed or timed out
    ///
    /// the request is resubmitted by the next poll
    Request(&'static str),

    /// error reported by a slave, its type depend on the operation returning this error
    ///
    /// these errors can generally be handled and fixed by retrying the operation or reconfiguring the slave
    Slave(T),

    /// the requested object is not in the slave's cached dictionary
    NotFound {index: u16, sub: u8},

    /// encoding or decoding of this entry type is not implemented
    Unsupported(EntryType),

    /// configuring the domain or activating the master failed, nothing of the attempted configuration was kept
    Config(&'static str),

    /// error reported by the master
    ///
    /// these errors can generally be handled and fixed by retrying the operation or using the master differently when the issue is in the user code
    Master(&'static str),

    /// error detected by the master in the ethercat communication
    ///
    /// these errors can generally not be fixed and the whole communication has to be restarted
    Protocol(&'static str),

    /// error is due to too much time elapsed, but does not compromise the communication
    ///
    /// these errors are generally contextual and the operation can be retried.
    Timeout(&'static str),
}

/// convenient alias to simplify return annotations
pub type EthercatResult<T=(), E=()> = core::result::Result<T, EthercatError<E>>;

impl<T> EthercatError<T> {
    /// true for errors that are expected to vanish by retrying the same operation later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Link | Self::Busy | Self::Request(_) | Self::Timeout(_))
    }
}

impl<T: fmt::Debug> fmt::Display for EthercatError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (src, msg) : (&str, String) = match self {
            Self::Io(value) =>        ("Io", value.to_string()),
            Self::Link =>             ("Link", String::from("link is down")),
            Self::Busy =>             ("Busy", String::from("request in progress")),
            Self::Request(value) =>   ("Request", value.to_string()),
            Self::Slave(value) =>     ("Slave", format!("{:?}", value)),
            Self::NotFound{index, sub} => ("NotFound", format!("no object {:#06x}:{:02x}", index, sub)),
            Self::Unsupported(ty) =>  ("Unsupported", format!("entry type {:?}", ty)),
            Self::Config(value) =>    ("Config", value.to_string()),
            Self::Master(value) =>    ("Master", value.to_string()),
            Self::Protocol(value) =>  ("Protocol", value.to_string()),
            Self::Timeout(value) =>   ("Timeout", value.to_string()),
        };

        f.debug_struct("EthercatError")
            .field("source", &src)
            .field("message", &msg)
            .finish()
    }
}

impl<T: fmt::Debug> std::error::Error for EthercatError<T> {}

impl<T> From<std::io::Error> for EthercatError<T> {
    fn from(src: std::io::Error) -> Self {
        EthercatError::Io(Arc::new(src))
    }
}

impl<T> From<crate::data::PackingError> for EthercatError<T> {
    fn from(src: crate::data::PackingError) -> Self {
        match src {
            crate::data::PackingError::BadSize(_, text) => EthercatError::Protocol(text),
        }
    }
}

// because rust doesn't allow specialization and already implements `From<T> for T`, we cannot write smart conversions for generic EthercatError<T>, so these are manual conversion methods
impl<E> EthercatError<E> {
    /// convert the error if the slave specific error type allows it
    pub fn into<F>(self) -> EthercatError<F>
    where F: From<E> {
        self.map(|e| F::from(e))
    }
    /// convert the error with a callback handling the case of slave-specific error
    pub fn map<F,T>(self, callback: F) -> EthercatError<T>
    where F: Fn(E) -> T
    {
        match self {
            EthercatError::Slave(value) => EthercatError::Slave(callback(value)),
            EthercatError::Io(e) => EthercatError::Io(e),
            EthercatError::Link => EthercatError::Link,
            EthercatError::Busy => EthercatError::Busy,
            EthercatError::Request(message) => EthercatError::Request(message),
            EthercatError::NotFound{index, sub} => EthercatError::NotFound{index, sub},
            EthercatError::Unsupported(ty) => EthercatError::Unsupported(ty),
            EthercatError::Config(message) => EthercatError::Config(message),
            EthercatError::Master(message) => EthercatError::Master(message),
            EthercatError::Protocol(message) => EthercatError::Protocol(message),
            EthercatError::Timeout(message) => EthercatError::Timeout(message),
        }
    }
    /// drop the slave-specific payload, reporting it as a failed request
    pub fn downgrade(self) -> EthercatError<()> {
        match self {
            EthercatError::Slave(_) => EthercatError::Request("slave aborted the request"),
            other => other.map(|_| ()),
        }
    }
}
impl EthercatError<()> {
    /// convert an error with no slave-specific type into an error with a slave-specific type
    ///
    /// an empty slave error cannot carry any payload, so it is reported as a master error
    pub fn upgrade<F>(self) -> EthercatError<F> {
        match self {
            EthercatError::Slave(()) => EthercatError::Master("slave error without details"),
            other => other.map(|_| unreachable!()),
        }
    }
}
