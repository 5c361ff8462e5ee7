use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use ratatui::backend::CrosstermBackend;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};

use crate::execution::{EventBus, TaskObserver, TaskPlan};
use crate::model::{Container, Step};

use super::progress_line::ContainerStartupProgressLine;
use super::style::{name_style, status_color, status_icon};

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct HandoffState {
    requested: bool,
    released: bool,
}

/// Hands the terminal from the startup display to the task container.
///
/// When the task container is about to run, the executor thread blocks in
/// `on_step_starting` until the display has drawn its last frame and called
/// `release`.
#[derive(Debug)]
pub struct TerminalHandoff {
    task_container: Arc<Container>,
    state: Mutex<HandoffState>,
    changed: Condvar,
}

impl TerminalHandoff {
    pub fn new(task_container: Arc<Container>) -> Self {
        Self {
            task_container,
            state: Mutex::new(HandoffState::default()),
            changed: Condvar::new(),
        }
    }

    /// True once the task container is waiting to run.
    pub fn requested(&self) -> bool {
        self.lock().requested
    }

    /// Let the task container run. Later requests no longer wait.
    pub fn release(&self) {
        self.lock().released = true;
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, HandoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskObserver for TerminalHandoff {
    fn on_step_starting(&self, step: &Step) {
        let Step::RunContainer { container, .. } = step else {
            return;
        };
        if *container != self.task_container {
            return;
        }

        let mut state = self.lock();
        state.requested = true;
        self.changed.notify_all();
        while !state.released {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Releases the handoff when the display stops, including on error paths.
struct ReleaseOnDrop<'a>(&'a TerminalHandoff);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// One progress line per container in a plan, drawn together.
pub struct StartupProgressDisplay {
    lines: Vec<Arc<ContainerStartupProgressLine>>,
    handoff: Arc<TerminalHandoff>,
}

impl StartupProgressDisplay {
    pub fn new(plan: &TaskPlan) -> Self {
        let lines = plan
            .containers()
            .iter()
            .map(|container| {
                Arc::new(ContainerStartupProgressLine::new(
                    container.clone(),
                    plan.dependencies_of(container),
                ))
            })
            .collect();

        Self {
            lines,
            handoff: Arc::new(TerminalHandoff::new(plan.task_container().clone())),
        }
    }

    /// Subscribe every line to the bus.
    ///
    /// The handoff is not subscribed here. Subscribe `handoff()` only when
    /// `show_until` will run, or the task container waits forever.
    pub fn subscribe_to(&self, bus: &EventBus) {
        for line in &self.lines {
            bus.subscribe(line.clone());
        }
    }

    pub fn lines(&self) -> &[Arc<ContainerStartupProgressLine>] {
        &self.lines
    }

    pub fn handoff(&self) -> Arc<TerminalHandoff> {
        self.handoff.clone()
    }

    pub fn render_lines(&self) -> Vec<Line<'static>> {
        self.lines
            .iter()
            .map(|line| {
                let status = line.status();
                Line::from(vec![
                    Span::styled(
                        format!("{} ", status_icon(status)),
                        ratatui::style::Style::default().fg(status_color(status)),
                    ),
                    Span::styled(line.container().name.clone(), name_style()),
                    Span::raw(format!(": {}", line.describe())),
                ])
            })
            .collect()
    }

    pub fn draw(&self, frame: &mut Frame) {
        frame.render_widget(Paragraph::new(self.render_lines()), frame.area());
    }
}

/// Redraw the display in an inline viewport until `finished` returns true or
/// the task container is about to run, then leave the last frame in place and
/// release the handoff.
pub fn show_until(
    display: &StartupProgressDisplay,
    mut finished: impl FnMut() -> bool,
) -> Result<()> {
    let _release = ReleaseOnDrop(&display.handoff);
    let height = u16::try_from(display.lines().len()).unwrap_or(u16::MAX);
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::with_options(
        backend,
        TerminalOptions {
            viewport: Viewport::Inline(height),
        },
    )
    .context("failed to set up the progress display")?;

    loop {
        let done = finished() || display.handoff.requested();
        terminal.draw(|frame| display.draw(frame))?;
        if done {
            break;
        }
        std::thread::sleep(REFRESH_INTERVAL);
    }

    // Park the cursor below the last frame so container output starts on a fresh line.
    let area = terminal.get_frame().area();
    terminal.set_cursor_position((0, area.bottom().saturating_sub(1)))?;
    terminal.show_cursor()?;
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::docker::DockerContainer;
    use crate::execution::EventSink;
    use crate::model::{Event, ImageSource};
    use crate::ui::StartupStatus;

    fn plan() -> TaskPlan {
        let mut app = Container::new("app", ImageSource::BuildImage("/app".into()));
        app.dependencies = vec!["db".into()];
        let db = Container::new("db", ImageSource::PullImage("postgres:16".into()));
        TaskPlan::new("test", vec![Arc::new(db)], Arc::new(app))
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn renders_one_line_per_container() {
        let display = StartupProgressDisplay::new(&plan());
        let rendered: Vec<String> = display.render_lines().iter().map(text_of).collect();
        assert_eq!(
            rendered,
            vec![
                "─ db: ready to pull image".to_string(),
                "─ app: ready to build image".to_string(),
            ]
        );
    }

    #[test]
    fn lines_follow_the_bus() {
        let plan = plan();
        let display = StartupProgressDisplay::new(&plan);
        let bus = EventBus::new();
        display.subscribe_to(&bus);

        bus.post_event(Event::ContainerBecameHealthy {
            container: plan.containers()[0].clone(),
        });

        let rendered: Vec<String> = display.render_lines().iter().map(text_of).collect();
        assert_eq!(rendered[0], "✓ db: running");
        assert_eq!(display.lines()[0].status(), StartupStatus::Running);
        assert_ne!(display.lines()[1].status(), StartupStatus::Running);
    }

    fn run_step(container: &Arc<Container>) -> Step {
        Step::RunContainer {
            container: container.clone(),
            docker_container: DockerContainer::new(format!("{}-id", container.name)),
        }
    }

    #[test]
    fn task_container_waits_until_the_display_lets_go() {
        let plan = plan();
        let display = StartupProgressDisplay::new(&plan);
        let bus = Arc::new(EventBus::new());
        bus.subscribe(display.handoff());

        let (tx, rx) = mpsc::channel();
        let step = run_step(plan.task_container());
        let worker = {
            let bus = bus.clone();
            thread::spawn(move || {
                bus.notify_step_starting(&step);
                tx.send(()).unwrap();
            })
        };

        while !display.handoff().requested() {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        display.handoff().release();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn dependency_containers_do_not_wait() {
        let plan = plan();
        let display = StartupProgressDisplay::new(&plan);
        let bus = EventBus::new();
        bus.subscribe(display.handoff());

        bus.notify_step_starting(&run_step(&plan.containers()[0]));
        assert!(!display.handoff().requested());
    }

    #[test]
    fn released_handoff_no_longer_blocks() {
        let plan = plan();
        let display = StartupProgressDisplay::new(&plan);
        display.handoff().release();

        display.handoff().on_step_starting(&run_step(plan.task_container()));
        assert!(display.handoff().requested());
    }
}
