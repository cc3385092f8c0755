use std::fmt;

#[derive(Debug, Clone)]
pub enum AdServerError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
    EventQueue(String),
}

impl AdServerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            AdServerError::DatabaseConfig(_) => "E001",
            AdServerError::DatabaseConnection(_) => "E002",
            AdServerError::DatabaseOperation(_) => "E003",
            AdServerError::FileOperation(_) => "E004",
            AdServerError::Serialization(_) => "E005",
            AdServerError::EventQueue(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            AdServerError::DatabaseConfig(_) => "Database Configuration Error",
            AdServerError::DatabaseConnection(_) => "Database Connection Error",
            AdServerError::DatabaseOperation(_) => "Database Operation Error",
            AdServerError::FileOperation(_) => "File Operation Error",
            AdServerError::Serialization(_) => "Serialization Error",
            AdServerError::EventQueue(_) => "Event Queue Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            AdServerError::DatabaseConfig(msg)
            | AdServerError::DatabaseConnection(msg)
            | AdServerError::DatabaseOperation(msg)
            | AdServerError::FileOperation(msg)
            | AdServerError::Serialization(msg)
            | AdServerError::EventQueue(msg) => msg,
        }
    }

    /// 格式化为彩色输出（启动失败时打印到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for AdServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for AdServerError {}

// 便捷的构造函数
impl AdServerError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        AdServerError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        AdServerError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        AdServerError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        AdServerError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        AdServerError::Serialization(msg.into())
    }

    pub fn event_queue<T: Into<String>>(msg: T) -> Self {
        AdServerError::EventQueue(msg.into())
    }
}

impl From<sea_orm::DbErr> for AdServerError {
    fn from(err: sea_orm::DbErr) -> Self {
        AdServerError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for AdServerError {
    fn from(err: std::io::Error) -> Self {
        AdServerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for AdServerError {
    fn from(err: serde_json::Error) -> Self {
        AdServerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AdServerError::database_config("x").code(), "E001");
        assert_eq!(AdServerError::database_operation("x").code(), "E003");
        assert_eq!(AdServerError::event_queue("x").code(), "E006");
    }

    #[test]
    fn test_format_simple() {
        let err = AdServerError::event_queue("worker stopped");
        assert_eq!(err.format_simple(), "Event Queue Error: worker stopped");
        assert_eq!(err.to_string(), err.format_simple());
    }

    #[test]
    fn test_from_db_err() {
        let err: AdServerError = sea_orm::DbErr::Custom("boom".into()).into();
        assert!(matches!(err, AdServerError::DatabaseOperation(ref m) if m.contains("boom")));
    }
}
