// Running a task: the plan, the per-step runner, the bus that carries its
// events and the executor that drives them in order.

mod executor;
mod plan;
mod runner;
mod sink;

pub use executor::{TaskExecutor, TaskOutcome};
pub use plan::TaskPlan;
pub use runner::StepRunner;
pub use sink::{EventBus, EventSink, TaskObserver};
