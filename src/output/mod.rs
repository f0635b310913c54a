mod progress;
mod render;
mod styling;
mod tables;

pub use progress::LoadingIndicator;
pub use render::Renderer;
pub use styling::{dim, magenta_bold};

/// Prints the pipedash banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("pipedash"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline status dashboard")
    );
}
