//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 构建错误 ====================
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("条件缺少必填属性: \"{0}\"")]
    MissingProperty(&'static str),

    #[error("简化规则只能包含一个关系属性 (\"and\" / \"or\")")]
    ConflictingRelation,

    // ==================== 注册表错误 ====================
    #[error("操作符未找到: {0}")]
    OperatorNotFound(String),

    #[error("操作符已存在: {0}")]
    DuplicateOperator(String),

    // ==================== 操作符内部错误 ====================
    #[error("类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("无效的正则表达式 '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// 自定义操作符抛出的错误
    #[error("操作符执行失败: {0}")]
    Operator(String),

    /// 自定义解析器抛出的错误
    #[error("事实解析失败: {0}")]
    Resolver(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "RULE_PARSE_FAILED",
            Self::MissingProperty(_) => "MISSING_PROPERTY",
            Self::ConflictingRelation => "CONFLICTING_RELATION",
            Self::OperatorNotFound(_) => "OPERATOR_NOT_FOUND",
            Self::DuplicateOperator(_) => "DUPLICATE_OPERATOR",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::InvalidRegex { .. } => "INVALID_REGEX",
            Self::Operator(_) => "OPERATOR_FAILED",
            Self::Resolver(_) => "RESOLVER_FAILED",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    /// 是否为构建期错误（规则或条件构造时即失败）
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::ParseError(_)
                | Self::MissingProperty(_)
                | Self::ConflictingRelation
                | Self::JsonError(_)
        )
    }
}
