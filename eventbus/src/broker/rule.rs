/// Subscription 创建时自带的全量匹配规则名
pub const DEFAULT_RULE_NAME: &str = "$Default";

/// 规则过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleFilter {
    /// 匹配全部消息
    True,
    /// 按消息标签精确匹配
    Correlation { label: String },
}

impl RuleFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::True => true,
            Self::Correlation { label: expected } => expected == label,
        }
    }
}

/// Subscription 上的过滤规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescription {
    pub name: String,
    pub filter: RuleFilter,
}

impl RuleDescription {
    /// 以事件名同时作为规则名与匹配标签
    pub fn for_label(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            filter: RuleFilter::Correlation { label },
        }
    }

    pub fn default_rule() -> Self {
        Self {
            name: DEFAULT_RULE_NAME.to_string(),
            filter: RuleFilter::True,
        }
    }
}
