pub mod config;
pub mod project;
pub mod response;
pub mod setting;
pub mod task;
pub mod tree;
pub mod usage;

pub use config::{
    Config, DatabaseConfig, LogFormat, LoggingConfig, RotationPolicy, SchedulerConfig, UsageConfig,
};
pub use project::{Project, ScopeUpdate, Subproject};
pub use response::{HistoryEntry, TaskResponse};
pub use setting::{parse_bool, Setting, SettingKey, SettingSource};
pub use task::{PendingAction, Task, TaskAction, TaskScope, TaskStatus, TaskUpdate};
pub use tree::{ProjectNode, ProjectTree, SubprojectNode};
pub use usage::{ModelUsage, UsageReport};
