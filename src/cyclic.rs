/*!
    periodic execution of the process data exchange.

    [run] drives a started [Master] at a fixed period: every tick receives the inputs, calls the application task, then sends the outputs. The period is kept by a timerfd, so it does not drift with the time spent in the task.

    ```ignore
    master.start()?;
    cyclic::run(&mut master, |master| {
        let position = master.get_input(0, 1)?;
        master.set_output(0, 1, position + 10)?;
        Ok(ControlFlow::Continue(()))
    }).await?;
    ```
*/

use crate::{
    engine::MasterEngine,
    master::Master,
    error::{EthercatError, EthercatResult},
    };
use core::ops::ControlFlow;
use futures::stream::StreamExt;


/**
    run the cyclic exchange until the task breaks or an error occurs

    The period is taken from the master's configuration, and the current thread is raised to realtime priority if the configuration asks for it.
*/
pub async fn run<E, F>(master: &mut Master<E>, mut task: F) -> EthercatResult
where
    E: MasterEngine,
    F: FnMut(&mut Master<E>) -> EthercatResult<ControlFlow<()>>,
{
    if master.config().realtime {
        realtime_priority()?;
    }
    let mut interval = tokio_timerfd::Interval::new_interval(master.config().period)?;
    loop {
        interval.next().await
            .ok_or(EthercatError::Master("cycle timer stopped"))??;
        master.receive()?;
        let flow = task(master)?;
        master.send()?;
        if flow.is_break()  {break}
    }
    Ok(())
}

/// run the cyclic exchange in a tokio task, the master is given back when the task breaks
pub fn spawn<E, F>(mut master: Master<E>, task: F) -> tokio::task::JoinHandle<EthercatResult<Master<E>>>
where
    E: MasterEngine + Send + 'static,
    F: FnMut(&mut Master<E>) -> EthercatResult<ControlFlow<()>> + Send + 'static,
{
    tokio::spawn(async move {
        run(&mut master, task).await?;
        Ok(master)
    })
}

/// give the current thread the highest realtime priority with a FIFO scheduling
#[cfg(target_os = "linux")]
pub fn realtime_priority() -> EthercatResult {
    use thread_priority::*;
    set_thread_priority_and_policy(
        thread_native_id(),
        ThreadPriority::Max,
        ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        )
        .map_err(|err| {
            log::warn!("cannot raise thread priority: {:?}", err);
            EthercatError::Master("cannot raise thread priority")
        })
}

/// realtime priority is only available on linux
#[cfg(not(target_os = "linux"))]
pub fn realtime_priority() -> EthercatResult {
    log::warn!("realtime priority is not supported on this platform");
    Ok(())
}
