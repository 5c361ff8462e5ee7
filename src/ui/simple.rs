use std::io::Write;
use std::sync::Mutex;

use crossterm::style::Stylize;

use crate::execution::TaskObserver;
use crate::model::{Event, Step};

/// Plain line-per-milestone output for when there is no terminal to draw on.
pub struct SimpleProgressPrinter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> SimpleProgressPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn print(&self, line: String) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
    }
}

impl<W: Write + Send> TaskObserver for SimpleProgressPrinter<W> {
    fn on_step_starting(&self, step: &Step) {
        let line = match step {
            Step::BuildImage {
                build_directory, ..
            } => format!("Building image from {}...", build_directory.display()),
            Step::PullImage { image_name } => format!("Pulling {image_name}..."),
            Step::StartContainer { container, .. } => format!("Starting {}...", container.name),
            Step::RunContainer { container, .. } => {
                format!("Running {}...", container.name.as_str().bold())
            }
            _ => return,
        };
        self.print(line);
    }

    fn on_event_posted(&self, event: &Event) {
        let line = match event {
            Event::ImageBuilt {
                build_directory, ..
            } => format!("Built image from {}.", build_directory.display()),
            Event::ImagePulled { image } => format!("Pulled {}.", image.id),
            Event::ContainerBecameHealthy { container } => {
                format!("{} has started.", container.name)
            }
            _ => return,
        };
        self.print(line);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::docker::DockerImage;
    use crate::model::{Container, ImageSource};

    /// Writer whose contents stay readable after the printer takes it.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn prints_milestones_only() {
        let buffer = SharedBuffer::default();
        let printer = SimpleProgressPrinter::new(buffer.clone());
        let db = Arc::new(Container::new("db", ImageSource::PullImage("postgres".into())));

        printer.on_step_starting(&Step::PullImage {
            image_name: "postgres".into(),
        });
        printer.on_step_starting(&Step::CreateTaskNetwork);
        printer.on_event_posted(&Event::ImagePulled {
            image: DockerImage::new("postgres"),
        });
        printer.on_event_posted(&Event::TaskNetworkDeleted);
        printer.on_event_posted(&Event::ContainerBecameHealthy { container: db });

        assert_eq!(
            buffer.text(),
            "Pulling postgres...\nPulled postgres.\ndb has started.\n"
        );
    }
}
