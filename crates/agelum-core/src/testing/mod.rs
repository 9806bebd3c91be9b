//! Browser tests: scenarios, their on-disk store, and executions.

pub mod execution;
pub mod scenario;
pub mod store;

pub use execution::{ExecutionResult, ExecutionStatus, FinishRequest, PreparedRun};
pub use scenario::{browser_args, StepAction, TestScenario, TestStep};
pub use store::{NewTest, TestIndexEntry, TestRecord};
