//! # cell 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/cell.rs`

use crate::models::cell::CoordSys;
use crate::models::unit::LengthUnit;

use clap::Args;
use std::path::PathBuf;

/// cell 子命令参数
#[derive(Args, Debug)]
pub struct CellArgs {
    /// Cell file (*.json, *.vasp, POSCAR*, CONTCAR*)
    pub input: PathBuf,

    /// Build a diagonal supercell
    #[arg(long, num_args = 3, value_names = ["N1", "N2", "N3"])]
    pub supercell: Option<Vec<i32>>,

    /// Group supercell atoms by translation block instead of by image
    #[arg(long, default_value_t = false)]
    pub block: bool,

    /// Convert to the primitive cell
    #[arg(long, default_value_t = false, conflicts_with = "standardize")]
    pub primitize: bool,

    /// Convert to the standardized conventional cell
    #[arg(long, default_value_t = false)]
    pub standardize: bool,

    /// Symmetry tolerance
    #[arg(long)]
    pub symprec: Option<f64>,

    /// Print symmetry operations
    #[arg(long, default_value_t = false)]
    pub symops: bool,

    /// Coordinate system of the output (D or C)
    #[arg(long)]
    pub coord: Option<CoordSys>,

    /// Length unit of the output (ang, au)
    #[arg(long)]
    pub unit: Option<LengthUnit>,

    /// Sort atoms of each element along an axis (1, 2 or 3)
    #[arg(long, value_name = "AXIS")]
    pub sort: Option<usize>,

    /// Sort in ascending order
    #[arg(long, default_value_t = false, requires = "sort")]
    pub reverse: bool,

    /// Center atoms along the given axes (0 = all)
    #[arg(long, num_args = 1.., value_name = "AXIS")]
    pub centering: Option<Vec<usize>>,

    /// Swap lattice vectors a and b if the lattice is left-handed
    #[arg(long, default_value_t = false)]
    pub right_handed: bool,

    /// Output file (*.json or POSCAR format)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
