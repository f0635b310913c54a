use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::bright_yellow;

/// Spinner on stderr that follows the published `loading` flag.
#[derive(Default)]
pub struct LoadingIndicator {
    pb: Option<ProgressBar>,
}

impl LoadingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, loading: bool) {
        match (loading, self.pb.take()) {
            (true, None) => {
                self.pb = Some(create_spinner(
                    bright_yellow("Fetching pipelines").to_string(),
                ));
            }
            (true, Some(pb)) => self.pb = Some(pb),
            (false, Some(pb)) => pb.finish_and_clear(),
            (false, None) => {}
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.pb.is_some()
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
