pub mod change_notifier;
pub mod concurrency_gate;
pub mod context;
pub mod context_assembler;
pub mod process_registry;
pub mod project_service;
pub mod ready_queue;
pub mod scheduler;
pub mod settings_service;
pub mod task_service;
pub mod task_state;
pub mod usage_gate;

pub use change_notifier::{ChangeKind, ChangeNotifier, ChangeSubscription, SyncSignal};
pub use concurrency_gate::{ConcurrencyGate, Permit};
pub use context::SchedulerContext;
pub use context_assembler::{ContextAssembler, PromptTemplates};
pub use process_registry::{CancelReason, ProcessRegistry};
pub use project_service::ProjectService;
pub use ready_queue::{eligible_tasks, next_eligible_task};
pub use scheduler::{Scheduler, TickReport};
pub use settings_service::{SchedulerSettings, SettingsService};
pub use task_service::{ActionOutcome, TaskService};
pub use task_state::{resolve_outcome, Resolution};
pub use usage_gate::{UsageGate, UsagePolicy};
