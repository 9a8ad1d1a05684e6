use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub fn progress_bar(multi: &MultiProgress, len: usize, message: &'static str) -> ProgressBar {
    let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .expect("Invalid progress template")
        .progress_chars("=> ");
    multi.add(
        ProgressBar::new(len as u64)
            .with_style(style)
            .with_message(message),
    )
}

pub fn format_elapsed(elapsed: Duration) -> String {
    // Millisecond precision is plenty for a summary line.
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}
