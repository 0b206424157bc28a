//! # 晶体对称性
//!
//! 通过 `moyo` 空间群库求对称操作、原胞与标准胞。`moyo` 只在启用 `symmetry`
//! 特性时编译；未启用时对称操作只返回恒等操作，原胞与标准胞返回原晶胞副本，
//! 并记录警告。调用方应把"只有恒等操作"视为未检测，而不是低对称性的证据。
//!
//! ## 依赖关系
//! - 扩展 `models/cell.rs` 中的 [`Cell`]
//! - 使用 `moyo` (可选) 与 `nalgebra`

use crate::error::{MushroomError, Result};
use crate::models::cell::Cell;

use log::warn;
use serde::Serialize;

/// 分数坐标下的对称操作 `x' = R x + t`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymmetryOperation {
    pub rotation: [[i32; 3]; 3],
    pub translation: [f64; 3],
}

impl SymmetryOperation {
    pub fn identity() -> Self {
        Self {
            rotation: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            translation: [0.0; 3],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

/// 对称操作集合
#[derive(Debug, Clone, Serialize)]
pub struct SymmetryOperations {
    pub operations: Vec<SymmetryOperation>,
    /// 空间群号，未检测时为 `None`
    pub space_group: Option<i32>,
}

impl SymmetryOperations {
    /// 只含恒等操作的退化结果
    pub fn identity_only() -> Self {
        Self {
            operations: vec![SymmetryOperation::identity()],
            space_group: None,
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// 是否为未检测的退化结果
    pub fn is_degraded(&self) -> bool {
        self.space_group.is_none()
    }
}

fn check_symprec(symprec: f64) -> Result<()> {
    if symprec > 0.0 && symprec.is_finite() {
        Ok(())
    } else {
        Err(MushroomError::InvalidArgument(format!(
            "symprec must be positive, got {}",
            symprec
        )))
    }
}

#[cfg(feature = "symmetry")]
mod backend {
    use super::*;
    use crate::models::cell::{CellOptions, CoordSys};

    use log::{debug, info};
    use moyo::base::{AngleTolerance, Cell as MoyoCell, Lattice};
    use moyo::data::Setting;
    use moyo::MoyoDataset;

    /// 构造 moyo 晶胞。moyo 的基矢按列存放，原子种类编号从 1 开始
    fn to_moyo(cell: &Cell) -> Result<MoyoCell> {
        let lattice = Lattice::new(cell.latt().transpose());
        let positions = cell.frac_posi()?;
        let numbers = cell.type_index(1).into_iter().map(|i| i as i32).collect();
        Ok(MoyoCell::new(lattice, positions, numbers))
    }

    pub(super) fn dataset(cell: &Cell, symprec: f64) -> Result<MoyoDataset> {
        let moyo_cell = to_moyo(cell)?;
        MoyoDataset::new(
            &moyo_cell,
            symprec,
            AngleTolerance::Default,
            Setting::Spglib,
            true,
        )
        .map_err(|e| MushroomError::Symmetry(format!("symmetry search failed: {:?}", e)))
    }

    /// 把 moyo 晶胞转回 [`Cell`]，原子种类按原晶胞的类型表还原
    pub(super) fn from_moyo(cell: &Cell, other: &MoyoCell, comment: String) -> Result<Cell> {
        let types = cell.atom_types();
        let atms = other
            .numbers
            .iter()
            .map(|&n| {
                usize::try_from(n - 1)
                    .ok()
                    .and_then(|i| types.get(i).cloned())
                    .ok_or_else(|| {
                        MushroomError::Symmetry(format!("unknown atom type number {}", n))
                    })
            })
            .collect::<Result<Vec<String>>>()?;
        let options = CellOptions {
            unit: cell.unit(),
            coord_sys: CoordSys::Direct,
            comment: Some(comment),
            reference: cell.reference().map(str::to_string),
            ..CellOptions::default()
        };
        let mut out = Cell::from_parts(
            other.lattice.basis.transpose(),
            atms,
            other.positions.clone(),
            options,
        )?;
        if cell.coord_sys() == CoordSys::Cartesian {
            out.set_coord_sys(CoordSys::Cartesian)?;
        }
        Ok(out)
    }

    pub(super) fn symops(cell: &Cell, symprec: f64) -> Result<SymmetryOperations> {
        let ds = dataset(cell, symprec)?;
        info!("space group number: {}", ds.number);
        let operations = ds
            .operations
            .iter()
            .map(|op| SymmetryOperation {
                rotation: [0, 1, 2].map(|i| [0, 1, 2].map(|j| op.rotation[(i, j)])),
                translation: [op.translation[0], op.translation[1], op.translation[2]],
            })
            .collect::<Vec<_>>();
        debug!("found {} symmetry operations", operations.len());
        Ok(SymmetryOperations {
            operations,
            space_group: Some(ds.number),
        })
    }
}

impl Cell {
    /// 求对称操作
    pub fn get_symops(&self, symprec: f64) -> Result<SymmetryOperations> {
        check_symprec(symprec)?;
        #[cfg(feature = "symmetry")]
        {
            backend::symops(self, symprec)
        }
        #[cfg(not(feature = "symmetry"))]
        {
            warn!("symmetry backend unavailable, only identity operation is returned");
            Ok(SymmetryOperations::identity_only())
        }
    }

    /// 原胞，返回新实例
    pub fn primitize(&self, symprec: f64) -> Result<Cell> {
        check_symprec(symprec)?;
        #[cfg(feature = "symmetry")]
        {
            let ds = backend::dataset(self, symprec)?;
            backend::from_moyo(
                self,
                &ds.prim_std_cell,
                format!("Primitive cell of {}", self.comment()),
            )
        }
        #[cfg(not(feature = "symmetry"))]
        {
            warn!("symmetry backend unavailable, primitize returns a copy");
            Ok(self.clone())
        }
    }

    /// 标准胞，`to_primitive` 时返回标准原胞
    pub fn standardize(&self, symprec: f64, to_primitive: bool) -> Result<Cell> {
        check_symprec(symprec)?;
        #[cfg(feature = "symmetry")]
        {
            let ds = backend::dataset(self, symprec)?;
            let std = if to_primitive {
                &ds.prim_std_cell
            } else {
                &ds.std_cell
            };
            backend::from_moyo(
                self,
                std,
                format!("Standardized cell of {}", self.comment()),
            )
        }
        #[cfg(not(feature = "symmetry"))]
        {
            let _ = to_primitive;
            warn!("symmetry backend unavailable, standardize returns a copy");
            Ok(self.clone())
        }
    }
}
