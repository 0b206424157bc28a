//! # 解析器模块
//!
//! 能带结构与晶胞的 JSON 文档、VASP POSCAR 以及 CSV 表格的读写。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `band/` 与 `models/` 数据模型
//! - 子模块: json, poscar, table

pub mod json;
pub mod poscar;
pub mod table;

pub use json::{parse_band_json, parse_cell_json, BandData, CellFactory};
pub use table::{read_band_table, write_band_table, write_dos_table, BandTable};

use crate::band::edges::EdgeOptions;
use crate::error::{MushroomError, Result};
use crate::models::cell::Cell;

use std::fs;
use std::path::Path;

/// 读取整个文本文件
pub fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(MushroomError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| MushroomError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 写出文本文件
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| MushroomError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn is_poscar(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    name.starts_with("POSCAR") || name.starts_with("CONTCAR") || ext.eq_ignore_ascii_case("vasp")
}

/// 读取能带结构 JSON 文档
pub fn read_band_file(path: &Path, options: EdgeOptions) -> Result<BandData> {
    let content = read_file(path)?;
    parse_band_json(&content, &path.display().to_string(), options)
}

/// 从文件路径推断格式并读取晶胞
pub fn read_cell_file(path: &Path) -> Result<Cell> {
    let content = read_file(path)?;
    let name = path.display().to_string();
    if is_json(path) {
        parse_cell_json(&content, &name)
    } else if is_poscar(path) {
        poscar::parse_poscar_content(&content, &name)
    } else {
        Err(MushroomError::ParseError {
            format: "cell".to_string(),
            path: name,
            reason: "Cannot determine format, expect *.json, *.vasp, POSCAR* or CONTCAR*"
                .to_string(),
        })
    }
}

/// 按扩展名写出晶胞：`.json` 为 JSON，其余为 POSCAR
pub fn write_cell_file(cell: &Cell, path: &Path) -> Result<()> {
    let content = if is_json(path) {
        cell.export_json()?
    } else {
        poscar::to_poscar_string(cell)
    };
    write_file(path, &content)
}
