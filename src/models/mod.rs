//! # 数据模型模块
//!
//! 晶胞、态密度与单位换算。能带结构位于 `band/`。
//!
//! ## 依赖关系
//! - 被 `band/`, `parsers/` 和 `commands/` 使用
//! - 子模块: cell, dos, symmetry, unit

pub mod cell;
pub mod dos;
pub mod symmetry;
pub mod unit;

pub use cell::{Cell, CellOptions, CellRecord, CoordSys, ImageOrder, SdFlag};
pub use dos::{DensityOfStates, SpinChannel};
pub use symmetry::{SymmetryOperation, SymmetryOperations};
pub use unit::{EnergyUnit, LengthUnit};
