//! # 统一错误处理模块
//!
//! 定义 Mushroom 的所有错误类型，使用 `thiserror` 派生。
//! 形状校验失败、缺失数据查询、标识符解析失败都归入同一个枚举，
//! 错误信息中带上出错的形状或标识符，便于直接定位问题。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// Mushroom 统一错误类型
#[derive(Error, Debug)]
pub enum MushroomError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 模型错误（构造时的形状校验）
    // ─────────────────────────────────────────────────────────────
    #[error("Band structure error: {0}")]
    BandStructure(String),

    #[error("Cell error: {0}")]
    Cell(String),

    #[error("DOS error: {0}")]
    Dos(String),

    #[error("Unit error: {0}")]
    Unit(String),

    // ─────────────────────────────────────────────────────────────
    // 查询缺失数据
    // ─────────────────────────────────────────────────────────────
    #[error("Data not available: {0}")]
    MissingData(String),

    // ─────────────────────────────────────────────────────────────
    // 标识符解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid {kind} identifier: '{token}'")]
    InvalidIdentifier { kind: String, token: String },

    #[error("Unknown {kind} label: '{label}'")]
    UnknownLabel { kind: String, label: String },

    #[error("{kind} index {index} out of range (0..{len})")]
    IndexOutOfRange {
        kind: String,
        index: i64,
        len: usize,
    },

    #[error("No {kind} labels available, select {kind} by index instead")]
    LabelsUnavailable { kind: String },

    // ─────────────────────────────────────────────────────────────
    // 功能与外部库
    // ─────────────────────────────────────────────────────────────
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Symmetry search failed: {0}")]
    Symmetry(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl MushroomError {
    /// 构造标识符解析错误
    pub fn invalid_identifier(kind: &str, token: impl Into<String>) -> Self {
        MushroomError::InvalidIdentifier {
            kind: kind.to_string(),
            token: token.into(),
        }
    }

    /// 构造索引越界错误
    pub fn out_of_range(kind: &str, index: i64, len: usize) -> Self {
        MushroomError::IndexOutOfRange {
            kind: kind.to_string(),
            index,
            len,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, MushroomError>;
