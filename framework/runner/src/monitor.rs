use grindstone_core::prelude::ShutdownListener;
use sysinfo::{Pid, ProcessRefreshKind, System};

/// Monitor the resource usage of the harness process itself and report high usage.
///
/// The harness shares a machine, and often a CPU, with the target under test. If the harness
/// burns a noticeable share of the cores then the contention it reports is partly its own, so
/// a warning is logged rather than letting a distorted run pass silently. The run itself is
/// not stopped.
///
/// The CPU usage for the process is collected every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL] and
/// checked. If it is above 10% with respect to the number of cores then a warning is logged.
pub(crate) fn start_monitor(mut shutdown_listener: ShutdownListener) {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu();
            let cpu_count = sys.cpus().len();

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_process_specifics(this_process_pid, ProcessRefreshKind::new().with_cpu());

                let Some(process) = sys.process(this_process_pid) else {
                    log::warn!("Failed to read the harness's own process info");
                    break;
                };

                let usage = (process.cpu_usage() / (cpu_count * 100) as f32) * 100.0;
                if usage > 10.0 {
                    log::warn!("High CPU usage detected. The harness is using {:.2}% of the CPU, with {} available cores. Contention results may be distorted", usage, cpu_count);
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            }
        })
        .expect("Failed to start monitor thread");
}
