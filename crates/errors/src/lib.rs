use thiserror::Error;


#[derive(Debug, Error)]
pub enum TaskHubError {
    #[error("存储错误: {0}")]
    Store(String),
    #[error("消息投递失败: lane={lane} - {message}")]
    Transport { lane: String, message: String },
    #[error("缓存错误: {0}")]
    Cache(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type TaskHubResult<T> = Result<T, TaskHubError>;

impl TaskHubError {
    pub fn store_error<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }
    pub fn transport_error<L: Into<String>, S: Into<String>>(lane: L, msg: S) -> Self {
        Self::Transport {
            lane: lane.into(),
            message: msg.into(),
        }
    }
    pub fn cache_error<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 存储、传输与缓存故障都是外部协作方的暂时性问题，可以交给 Broker 重投
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskHubError::Store(_) | TaskHubError::Transport { .. } | TaskHubError::Cache(_)
        )
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskHubError::TaskNotFound { .. })
    }
}

impl From<serde_json::Error> for TaskHubError {
    fn from(err: serde_json::Error) -> Self {
        TaskHubError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for TaskHubError {
    fn from(err: anyhow::Error) -> Self {
        TaskHubError::Internal(err.to_string())
    }
}
