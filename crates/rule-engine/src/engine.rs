//! 引擎：操作符与事实解析器注册表
//!
//! `Engine` 是对共享注册表的轻量句柄，克隆后指向同一份注册表；
//! 需要隔离的自定义操作符/解析器时，使用 [`Engine::new`] 新建一个引擎。
//!
//! 注册表应在启动时配置完成，之后作为只读数据供并发评估使用。
//! 评估进行中修改注册表不会造成内存不安全，但修改与评估的先后顺序
//! 由调用方自行保证（例如外部加锁）。

use crate::error::{Result, RuleError};
use crate::operators::{Operator, builtin_operators};
use crate::path::{self, Fact};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// 事实解析函数：`(数据, 路径) -> 事实值`
pub type ResolverFn = Arc<dyn Fn(&Value, &str) -> Result<Fact> + Send + Sync>;

/// 内置路径解析器
static PATH_RESOLVER: LazyLock<ResolverFn> = LazyLock::new(|| -> ResolverFn { Arc::new(resolve_path) });

fn resolve_path(data: &Value, fact: &str) -> Result<Fact> {
    Ok(path::resolve(data, fact))
}

#[derive(Default)]
struct Registry {
    operators: Vec<Operator>,
    default_resolver: Option<ResolverFn>,
    resolvers: HashMap<String, ResolverFn>,
}

/// 规则引擎
#[derive(Clone)]
pub struct Engine {
    registry: Arc<RwLock<Registry>>,
}

impl Engine {
    /// 创建预置全部内置操作符的引擎
    pub fn new() -> Self {
        Self::with_operators(builtin_operators())
    }

    /// 创建不含任何操作符的引擎
    pub fn empty() -> Self {
        Self::with_operators(Vec::new())
    }

    fn with_operators(operators: Vec<Operator>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry {
                operators,
                ..Default::default()
            })),
        }
    }

    /// 按名称精确查找操作符
    pub fn get_operator(&self, name: &str) -> Result<Operator> {
        self.registry
            .read()
            .operators
            .iter()
            .find(|op| op.name() == name)
            .cloned()
            .ok_or_else(|| RuleError::OperatorNotFound(name.to_string()))
    }

    pub fn has_operator(&self, name: &str) -> bool {
        self.registry
            .read()
            .operators
            .iter()
            .any(|op| op.name() == name)
    }

    /// 注册操作符，名称已存在时报错
    pub fn add_operator(&self, operator: Operator) -> Result<()> {
        let mut registry = self.registry.write();

        if registry.operators.iter().any(|op| op.name() == operator.name()) {
            return Err(RuleError::DuplicateOperator(operator.name().to_string()));
        }

        debug!(operator = operator.name(), "操作符已注册");
        registry.operators.push(operator);
        Ok(())
    }

    /// 移除操作符，不存在时忽略
    pub fn remove_operator(&self, name: &str) {
        let mut registry = self.registry.write();

        if let Some(index) = registry.operators.iter().position(|op| op.name() == name) {
            registry.operators.remove(index);
            debug!(operator = name, "操作符已移除");
        }
    }

    /// 按注册顺序列出操作符名称
    pub fn operator_names(&self) -> Vec<String> {
        self.registry
            .read()
            .operators
            .iter()
            .map(|op| op.name().to_string())
            .collect()
    }

    /// 设置默认解析器，未单独注册解析器的事实都使用它
    pub fn set_default_resolver<F>(&self, resolver: F)
    where
        F: Fn(&Value, &str) -> Result<Fact> + Send + Sync + 'static,
    {
        self.registry.write().default_resolver = Some(Arc::new(resolver));
        debug!("默认解析器已设置");
    }

    /// 清除默认解析器，回退到内置路径解析
    pub fn reset_default_resolver(&self) {
        self.registry.write().default_resolver = None;
        debug!("默认解析器已重置");
    }

    /// 为指定事实注册解析器
    pub fn add_resolver<F>(&self, fact: impl Into<String>, resolver: F)
    where
        F: Fn(&Value, &str) -> Result<Fact> + Send + Sync + 'static,
    {
        let fact = fact.into();
        debug!(fact = %fact, "解析器已注册");
        self.registry.write().resolvers.insert(fact, Arc::new(resolver));
    }

    /// 移除指定事实的解析器，不存在时忽略
    pub fn remove_resolver(&self, fact: &str) {
        if self.registry.write().resolvers.remove(fact).is_some() {
            debug!(fact = fact, "解析器已移除");
        }
    }

    /// 获取事实解析器
    ///
    /// 查找顺序：该事实的专属解析器 -> 默认解析器 -> 内置路径解析器。
    pub fn get_resolver(&self, fact: &str) -> ResolverFn {
        let registry = self.registry.read();

        registry
            .resolvers
            .get(fact)
            .or(registry.default_resolver.as_ref())
            .cloned()
            .unwrap_or_else(|| PATH_RESOLVER.clone())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Engine")
            .field("operators", &registry.operators.len())
            .field("default_resolver", &registry.default_resolver.is_some())
            .field("resolvers", &registry.resolvers.len())
            .finish()
    }
}
