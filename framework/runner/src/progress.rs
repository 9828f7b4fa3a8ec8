use std::cmp::min;
use std::fmt::Write;
use std::time::Duration;

use grindstone_core::prelude::ShutdownListener;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use tokio::time::Instant;

/// Displays a progress bar while load is being driven to show the user how long is left.
pub(crate) fn start_progress(load_window: Duration, mut shutdown_listener: ShutdownListener) {
    std::thread::Builder::new().name("progress".to_string()).spawn(move || {
        let start_time = Instant::now();
        let pb = ProgressBar::new(load_window.as_secs());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {load_window}]")
            .expect("Failed to set progress style")
            .with_key("load_window", {
                let hours = load_window.as_secs() / 3600;
                let minutes = (load_window.as_secs() % 3600) / 60;
                let seconds = load_window.as_secs() % 60;
                move |_state: &ProgressState, w: &mut dyn Write| write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds).expect("Could not write load_window")
            })
            .progress_chars("#>-"));

        loop {
            if shutdown_listener.should_shutdown() {
                log::trace!("Progress thread shutting down");
                pb.finish_and_clear();
                break;
            }

            let new = min(start_time.elapsed().as_secs(), load_window.as_secs());
            pb.set_position(new);
            std::thread::sleep(Duration::from_secs(1));
        }
    }).expect("Failed to start progress thread");
}
