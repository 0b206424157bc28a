//! # 能带结构模块
//!
//! 能带数据模型、能带边定位、标识符解析、交叉消解与分析报告。
//!
//! ## 子模块
//! - `structure`: [`BandStructure`] 与构造器
//! - `edges`: 按占据数或本征值定位 VBM/CBM
//! - `selector`: 原子 / 投影子 / 能带选择器与 `vbm-1` 类标识
//! - `crossing`: 基于左右差商的能带交叉消解
//! - `report`: 带隙分析与跃迁能量文本

pub mod crossing;
pub mod edges;
pub mod report;
pub mod selector;
pub mod structure;

pub use crossing::{
    apply_swaps, left_right_derivative_band, resolve_band_crossing, resolve_band_crossing_2band,
    BandSwap, Derivative, DEFAULT_DERIV_THRES,
};
pub use edges::{BandEdges, EdgeMethod, EdgeOptions};
pub use report::{render_transitions, transition_energies, BandAnalysis, TransitionSpec};
pub use selector::{split_ap, split_apb, BandIdentifier, Selector};
pub use structure::{
    BandStructure, BandStructureBuilder, DosOptions, OccupationSource, OrbitalSelector,
    Projection, Transition,
};
