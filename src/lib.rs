//! # Mushroom - 能带结构与晶胞分析工具箱
//!
//! 第一性原理计算后处理：能带边与带隙、跃迁能量、有效带隙、能带交叉消解、
//! 高斯展宽态密度，以及晶胞的构造、超胞、原胞与标准胞变换。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── band/      (能带结构、能带边、选择器、交叉消解、报告)
//!   ├── models/    (晶胞、对称性、态密度、单位)
//!   ├── parsers/   (JSON / POSCAR / CSV 读写)
//!   ├── batch/     (文件收集与并行执行)
//!   ├── cli/       (命令行参数定义)
//!   ├── commands/  (命令执行逻辑)
//!   ├── config.rs  (分析参数配置)
//!   ├── utils/     (输出、进度条、日志)
//!   └── error.rs   (错误处理)
//! ```

pub mod band;
pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod utils;

pub use band::{BandStructure, Selector};
pub use error::{MushroomError, Result};
pub use models::{Cell, DensityOfStates, EnergyUnit, LengthUnit};
