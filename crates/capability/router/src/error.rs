//! 存储层错误类型
//!
//! 封装底层存储后端的失败：锁中毒、连接失败、数据一致性问题。
//! 所有存储错误都是可恢复类，由路由任务本地处理。

#[derive(Debug)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}
