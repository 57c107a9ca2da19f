//! 事件总线配置
//!
//! 按以下顺序分层加载，后者覆盖前者：
//! 1. 内置默认值（TOML）；
//! 2. 可选的 TOML 配置文件；
//! 3. `EVENTBUS_` 前缀的环境变量，如 `EVENTBUS_TOPIC`、`EVENTBUS_SUBSCRIPTION_NAME`。
//!
use crate::error::{EventBusError, EventBusResult};
use bon::Builder;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

const DEFAULTS: &str = r#"
connection_string = "memory://local"
topic = "eventbus"
label_filtering = true
"#;

const ENV_PREFIX: &str = "EVENTBUS";

#[derive(Builder, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Broker 连接串，原样交给 `ClientFactory`
    #[builder(into)]
    pub connection_string: String,
    #[builder(into)]
    pub topic: String,
    /// 为空或缺省时仅能发布
    #[builder(into)]
    #[serde(default)]
    pub subscription_name: Option<String>,
    /// 是否按事件名在 Subscription 上维护过滤规则
    #[builder(default = true)]
    #[serde(default = "default_label_filtering")]
    pub label_filtering: bool,
}

fn default_label_filtering() -> bool {
    true
}

impl EventBusConfig {
    /// 加载配置：默认值 → 文件（若提供）→ 环境变量
    pub fn load(file: Option<&Path>) -> EventBusResult<Self> {
        Self::load_with(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(file: Option<&Path>, env: Environment) -> EventBusResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let cfg: Self = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> EventBusResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(EventBusError::config("connection_string must not be empty"));
        }
        if self.topic.trim().is_empty() {
            return Err(EventBusError::config("topic must not be empty"));
        }
        Ok(())
    }

    /// 配置了非空的 Subscription 名称
    pub fn is_subscriber(&self) -> bool {
        self.subscription().is_some()
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
