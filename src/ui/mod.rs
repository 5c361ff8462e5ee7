// Rendering task progress: per-container startup lines, the inline display
// that draws them, and a plain printer for non-interactive output.

mod display;
mod progress_line;
mod simple;
mod style;

pub use display::{StartupProgressDisplay, TerminalHandoff, show_until};
pub use progress_line::{ContainerStartupProgressLine, StartupStatus};
pub use simple::SimpleProgressPrinter;
