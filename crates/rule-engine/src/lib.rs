//! JSON 规则引擎
//!
//! 提供可嵌入的规则评估能力，支持：
//! - 简化 / 结构化两种 JSON 规则格式的解析与导出
//! - 点号、下标与通配符路径解析
//! - AND/OR 短路求值与失败消息
//! - 自定义操作符与事实解析器
//!
//! ```
//! use rule_engine::{Engine, Rule};
//! use serde_json::json;
//!
//! let engine = Engine::new();
//! let rule = Rule::from_value(
//!     json!({"and": [{"fact": "homeWorld.name", "operator": "equals", "value": "Tatooine"}]}),
//!     &engine,
//! )
//! .unwrap();
//!
//! assert!(rule.evaluate(&json!({"homeWorld": {"name": "Tatooine"}})).unwrap().result);
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod observability;
pub mod operators;
pub mod parser;
pub mod path;

pub use builder::RuleBuilder;
pub use engine::{Engine, ResolverFn};
pub use error::{Result, RuleError};
pub use models::{Condition, Evaluation, Rule, RuleNode};
pub use operators::{BuiltinOperator, Operator, OperatorFn, Relation, ValueType};
pub use parser::{ConditionConfig, JsonFormat, NodeJson, RuleJson};
pub use path::Fact;
