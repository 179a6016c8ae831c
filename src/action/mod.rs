//! 动作层：词表、文本解析、描述与执行

pub mod describe;
pub mod executor;
pub mod parsed;
pub mod parser;
pub mod types;

pub use describe::{describe, describe_action, describe_parsed};
pub use executor::{cancellable_sleep, ActionExecutor, ExecutorTiming};
pub use parsed::{ParamValue, ParsedAction};
pub use parser::{
    extract_action_string, extract_response_parts, parse, parse_action, parse_action_params,
    parse_response, parse_to_parsed_action, to_absolute, LOGICAL_GRID,
};
pub use types::{Action, ActionType};
