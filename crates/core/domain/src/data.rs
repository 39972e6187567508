//! 领域共享类型：标签值、数据类型、PLC 状态与健康信号。

/// 标签的数据类型（封闭枚举，映射编译期做穷尽检查）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
}

impl DataType {
    /// 类型名（小写，与 API 字符串互转）。
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::String => "string",
        }
    }

    /// 从 API 字符串解析类型名。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bool" => Some(DataType::Bool),
            "int" => Some(DataType::Int),
            "float" => Some(DataType::Float),
            "string" => Some(DataType::String),
            _ => None,
        }
    }

    /// 判断目标列类型能否接收本类型的值。
    ///
    /// 同类型总是兼容；int 值可写入 float 列（无损加宽），反向不允许。
    pub fn compatible_with(&self, column: DataType) -> bool {
        *self == column || (*self == DataType::Int && column == DataType::Float)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 标签采样值的数据变体。
#[derive(Debug, Clone, PartialEq)]
pub enum TagValueData {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
}

impl TagValueData {
    /// 值的实际数据类型。
    pub fn data_type(&self) -> DataType {
        match self {
            TagValueData::Bool(_) => DataType::Bool,
            TagValueData::I64(_) => DataType::Int,
            TagValueData::F64(_) => DataType::Float,
            TagValueData::String(_) => DataType::String,
        }
    }

    /// 按类型语义判断两次采样是否相同（monitor_changes 抑制用）。
    ///
    /// 浮点按位比较，NaN 的重复采样同样被视为未变化。
    pub fn same_value(&self, other: &TagValueData) -> bool {
        match (self, other) {
            (TagValueData::Bool(a), TagValueData::Bool(b)) => a == b,
            (TagValueData::I64(a), TagValueData::I64(b)) => a == b,
            (TagValueData::F64(a), TagValueData::F64(b)) => a.to_bits() == b.to_bits(),
            (TagValueData::String(a), TagValueData::String(b)) => a == b,
            _ => false,
        }
    }

    /// 字符串表示（存储只读回读与 WebSocket 帧用）。
    pub fn to_display_string(&self) -> String {
        match self {
            TagValueData::Bool(v) => v.to_string(),
            TagValueData::I64(v) => v.to_string(),
            TagValueData::F64(v) => v.to_string(),
            TagValueData::String(v) => v.clone(),
        }
    }
}

/// 一次成功采样产生的标签值事件。
#[derive(Debug, Clone)]
pub struct TagValue {
    pub plc_id: i64,
    pub tag_id: i64,
    pub ts_ms: i64,
    pub value: TagValueData,
}

/// 存储目标的类别：永久表（每实体一行）或时序表（追加 + 保留期）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Permanent,
    Timeseries,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Permanent => "permanent",
            StorageType::Timeseries => "timeseries",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "permanent" => Some(StorageType::Permanent),
            "timeseries" => Some(StorageType::Timeseries),
            _ => None,
        }
    }
}

/// PLC 连接状态分类。
///
/// 状态机：Unknown → Online ⇄ Offline/Error →（删除时）Removed。
/// 状态只由调度器健康信号与配置启停/删除驱动。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlcStatus {
    Unknown,
    Online,
    Offline,
    Error,
    Removed,
}

impl PlcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlcStatus::Unknown => "unknown",
            PlcStatus::Online => "online",
            PlcStatus::Offline => "offline",
            PlcStatus::Error => "error",
            PlcStatus::Removed => "removed",
        }
    }
}

/// 单次读取的结果分类（调度器 → 状态广播器）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Ok,
    Timeout,
    ConnectionLost,
}

/// PLC 级健康信号。
///
/// 每次标签读取都会上报一条；连续失败计数与状态迁移由广播器统一处理，
/// 保证同一 PLC 的状态变化有全序。
#[derive(Debug, Clone, Copy)]
pub struct HealthSignal {
    pub plc_id: i64,
    pub ts_ms: i64,
    pub outcome: ReadOutcome,
}

/// PLC 状态迁移事件（WSMessage 的内部形态）。
#[derive(Debug, Clone, Copy)]
pub struct StatusEvent {
    pub plc_id: i64,
    pub status: PlcStatus,
    pub ts_ms: i64,
}

/// 当前 epoch 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
