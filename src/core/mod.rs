//! 核心编排层：错误与恢复、状态投影、会话监管、组件装配、任务编排

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use builder::{AgentBuilder, AgentComponents};
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{create_agent, Command, Orchestrator, TaskStopper};
pub use recovery::{RecoveryEngine, LAST_ACTION_FAILED_PROMPT, MAX_STEPS_MESSAGE};
pub use session_supervisor::SessionSupervisor;
pub use state::{TaskPhase, TaskSnapshot, TaskStepState};
