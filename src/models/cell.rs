//! # 晶胞数据模型
//!
//! [`Cell`] 持有晶格矢量（行向量）、原子符号与原子坐标。坐标可以是分数坐标 (`D`)
//! 或笛卡尔坐标 (`C`)，长度单位为 Å 或 Bohr。
//!
//! 原子默认按首次出现的元素顺序分组排列，选择性动力学标记随原子一起移动。
//! 超胞、原胞、标准胞操作都返回新实例，不修改原晶胞。
//!
//! ## 依赖关系
//! - 被 `models/symmetry.rs`, `parsers/json.rs`, `commands/cell.rs` 使用
//! - 使用 `nalgebra` 做 3x3 矩阵运算

use crate::error::{MushroomError, Result};
use crate::models::unit::LengthUnit;

use log::{debug, info, warn};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// 每个原子三个方向的弛豫标记
pub type SdFlag = [bool; 3];

/// 坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum CoordSys {
    /// 分数坐标
    #[default]
    #[serde(rename = "D")]
    Direct,
    /// 笛卡尔坐标
    #[serde(rename = "C")]
    Cartesian,
}

impl fmt::Display for CoordSys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSys::Direct => write!(f, "D"),
            CoordSys::Cartesian => write!(f, "C"),
        }
    }
}

impl FromStr for CoordSys {
    type Err = MushroomError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "d" | "direct" | "frac" | "fractional" => Ok(CoordSys::Direct),
            "c" | "cart" | "cartesian" => Ok(CoordSys::Cartesian),
            _ => Err(MushroomError::Cell(format!(
                "Only support \"D\" direct or fractional and \"C\" Cartesian coordinate, got '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for CoordSys {
    type Error = MushroomError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// 超胞中原子的排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageOrder {
    /// 同一原胞原子的所有像相邻
    #[default]
    Consecutive,
    /// 按平移块分组，每块包含原胞全部原子
    Blocks,
}

/// 晶胞构造选项
#[derive(Debug, Clone, PartialEq)]
pub struct CellOptions {
    pub unit: LengthUnit,
    pub coord_sys: CoordSys,
    pub sort_atms: bool,
    pub select_dyn: BTreeMap<usize, SdFlag>,
    pub all_relax: bool,
    pub comment: Option<String>,
    pub reference: Option<String>,
}

impl Default for CellOptions {
    fn default() -> Self {
        Self {
            unit: LengthUnit::Ang,
            coord_sys: CoordSys::Direct,
            sort_atms: true,
            select_dyn: BTreeMap::new(),
            all_relax: true,
            comment: None,
            reference: None,
        }
    }
}

impl CellOptions {
    pub fn with_unit(mut self, unit: LengthUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_coord_sys(mut self, coord_sys: CoordSys) -> Self {
        self.coord_sys = coord_sys;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn unsorted(mut self) -> Self {
        self.sort_atms = false;
        self
    }
}

/// 晶胞的 JSON 表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub latt: [[f64; 3]; 3],
    pub atms: Vec<String>,
    pub posi: Vec<[f64; 3]>,
    #[serde(default)]
    pub unit: LengthUnit,
    #[serde(default)]
    pub coord_sys: CoordSys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_dyn: Option<BTreeMap<usize, SdFlag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_relax: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

pub(crate) fn matrix_from_rows(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    )
}

pub(crate) fn rows_of(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// 首字母大写，其余小写
fn capitalize(s: &str) -> String {
    let mut chars = s.trim().chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// 把轴编号展开为 1..=3 的列表，0 表示全部
pub fn axis_list(axes: &[usize]) -> Result<Vec<usize>> {
    let mut out = Vec::new();
    for &a in axes {
        match a {
            0 => return Ok(vec![1, 2, 3]),
            1..=3 => {
                if !out.contains(&a) {
                    out.push(a);
                }
            }
            _ => {
                return Err(MushroomError::InvalidArgument(format!(
                    "axis must be 0, 1, 2 or 3, got {}",
                    a
                )))
            }
        }
    }
    out.sort_unstable();
    Ok(out)
}

/// 由轴生成选择性动力学标记：列出的轴取 `relax`，其余取 `!relax`
pub fn select_dyn_flag_from_axis(axes: &[usize], relax: bool) -> Result<SdFlag> {
    let mut flag = [!relax; 3];
    for a in axis_list(axes)? {
        flag[a - 1] = !flag[a - 1];
    }
    Ok(flag)
}

/// 晶胞
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    latt: Matrix3<f64>,
    atms: Vec<String>,
    posi: Vec<Vector3<f64>>,
    coord_sys: CoordSys,
    unit: LengthUnit,
    select_dyn: BTreeMap<usize, SdFlag>,
    all_relax: bool,
    comment: String,
    reference: Option<String>,
}

impl Cell {
    /// 由晶格行向量、原子符号与坐标构造
    pub fn new<S: AsRef<str>>(
        latt: [[f64; 3]; 3],
        atms: &[S],
        posi: &[[f64; 3]],
        options: CellOptions,
    ) -> Result<Self> {
        let posi = posi.iter().map(|p| Vector3::new(p[0], p[1], p[2])).collect();
        let atms = atms.iter().map(|a| capitalize(a.as_ref())).collect();
        Self::from_parts(matrix_from_rows(latt), atms, posi, options)
    }

    pub(crate) fn from_parts(
        latt: Matrix3<f64>,
        atms: Vec<String>,
        posi: Vec<Vector3<f64>>,
        options: CellOptions,
    ) -> Result<Self> {
        debug!("check consistency\n> latt: {:?}\n> atms: {:?}", latt, atms);
        if atms.is_empty() {
            return Err(MushroomError::Cell("Invalid cell setup: no atoms".to_string()));
        }
        if posi.len() != atms.len() {
            return Err(MushroomError::Cell(format!(
                "Invalid cell setup: {} atoms but posi shape ({}, 3)",
                atms.len(),
                posi.len()
            )));
        }
        if latt.iter().any(|x| !x.is_finite()) || posi.iter().flatten().any(|x| !x.is_finite()) {
            return Err(MushroomError::Cell(
                "Invalid cell setup: non-finite lattice or position".to_string(),
            ));
        }
        let det = latt.determinant();
        if det.abs() < 1e-12 {
            return Err(MushroomError::Cell(format!(
                "Invalid cell setup: singular lattice vectors {:?}",
                rows_of(&latt)
            )));
        }
        if det < 0.0 {
            warn!("found left-handed system.");
        }
        if let Some(&ia) = options.select_dyn.keys().find(|&&ia| ia >= atms.len()) {
            return Err(MushroomError::out_of_range("atom", ia as i64, atms.len()));
        }

        let mut cell = Cell {
            latt,
            atms,
            posi,
            coord_sys: options.coord_sys,
            unit: options.unit,
            select_dyn: options.select_dyn,
            all_relax: options.all_relax,
            comment: options.comment.unwrap_or_else(|| "Default Cell class".to_string()),
            reference: options.reference,
        };
        if options.sort_atms {
            cell.sort_atms();
        }
        Ok(cell)
    }

    /// 由 JSON 记录构造
    pub fn from_record(record: CellRecord) -> Result<Self> {
        let options = CellOptions {
            unit: record.unit,
            coord_sys: record.coord_sys,
            sort_atms: true,
            select_dyn: record.select_dyn.unwrap_or_default(),
            all_relax: record.all_relax.unwrap_or(true),
            comment: record.comment,
            reference: record.reference,
        };
        Cell::new(record.latt, &record.atms, &record.posi, options)
    }

    /// 导出为 JSON 记录
    pub fn to_record(&self) -> CellRecord {
        CellRecord {
            latt: self.latt_rows(),
            atms: self.atms.clone(),
            posi: self.posi.iter().map(|p| [p.x, p.y, p.z]).collect(),
            unit: self.unit,
            coord_sys: self.coord_sys,
            select_dyn: (!self.select_dyn.is_empty()).then(|| self.select_dyn.clone()),
            all_relax: (!self.all_relax).then_some(false),
            comment: Some(self.comment.clone()),
            reference: self.reference.clone(),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    // ─────────────────────────────────────────────────────────────
    // 基本属性
    // ─────────────────────────────────────────────────────────────

    /// 晶格矢量，每行一个
    pub fn latt(&self) -> Matrix3<f64> {
        self.latt
    }

    pub fn latt_rows(&self) -> [[f64; 3]; 3] {
        rows_of(&self.latt)
    }

    pub fn atms(&self) -> &[String] {
        &self.atms
    }

    pub fn posi(&self) -> &[Vector3<f64>] {
        &self.posi
    }

    pub fn natm(&self) -> usize {
        self.atms.len()
    }

    pub fn coord_sys(&self) -> CoordSys {
        self.coord_sys
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// 按首次出现顺序列出元素
    pub fn atom_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for a in &self.atms {
            if !types.contains(a) {
                types.push(a.clone());
            }
        }
        types
    }

    /// 类型编号到元素符号
    pub fn type_mapping(&self) -> BTreeMap<usize, String> {
        self.atom_types().into_iter().enumerate().collect()
    }

    /// 每个原子的类型编号，从 `start` 开始
    pub fn type_index(&self, start: usize) -> Vec<usize> {
        let types = self.atom_types();
        self.atms
            .iter()
            .map(|a| types.iter().position(|t| t == a).unwrap_or(0) + start)
            .collect()
    }

    /// 元素符号为 `symbol` 的原子索引
    pub fn get_sym_index(&self, symbol: &str) -> Vec<usize> {
        self.atms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == symbol)
            .map(|(i, _)| i)
            .collect()
    }

    /// 元素符号及各自原子数，保持首次出现顺序
    pub fn get_sym_nat(&self) -> (Vec<String>, Vec<usize>) {
        let syms = self.atom_types();
        let nats = syms
            .iter()
            .map(|s| self.atms.iter().filter(|a| *a == s).count())
            .collect();
        (syms, nats)
    }

    // ─────────────────────────────────────────────────────────────
    // 晶格几何
    // ─────────────────────────────────────────────────────────────

    /// 晶格矢量的混合积，左手系为负
    pub fn signed_volume(&self) -> f64 {
        self.latt.determinant()
    }

    pub fn vol(&self) -> f64 {
        self.signed_volume().abs()
    }

    pub fn is_left_handed(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// 交换 a、b 两个晶格矢量使其成为右手系。已是右手系时返回 `false`
    pub fn make_right_handed(&mut self) -> bool {
        if !self.is_left_handed() {
            return false;
        }
        self.latt.swap_rows(0, 1);
        if self.coord_sys == CoordSys::Direct {
            for p in self.posi.iter_mut() {
                p.swap_rows(0, 1);
            }
            for flag in self.select_dyn.values_mut() {
                flag.swap(0, 1);
            }
        }
        info!("swapped lattice vectors a and b to get a right-handed system");
        true
    }

    /// 晶格矢量长度
    pub fn alen(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.latt.row(i).norm())
    }

    /// 晶格常数 a, b, c, alpha, beta, gamma（角度单位：度）
    pub fn latt_consts(&self) -> [f64; 6] {
        let alen = self.alen();
        let mut consts = [alen[0], alen[1], alen[2], 0.0, 0.0, 0.0];
        for i in 0..3 {
            let j = (i + 1) % 3;
            let k = (i + 2) % 3;
            let cos = self.latt.row(j).dot(&self.latt.row(k)) / alen[j] / alen[k];
            consts[3 + i] = cos.clamp(-1.0, 1.0).acos().to_degrees();
        }
        consts
    }

    /// 倒格矢，`a_i · b_j = 2π δ_ij`，每行一个
    pub fn recp_latt(&self) -> Matrix3<f64> {
        let det = self.signed_volume();
        let mut b = Matrix3::<f64>::zeros();
        for i in 0..3 {
            let j = (i + 1) % 3;
            let k = (i + 2) % 3;
            let aj: Vector3<f64> = self.latt.row(j).transpose();
            let ak: Vector3<f64> = self.latt.row(k).transpose();
            let row = aj.cross(&ak) / det * 2.0 * PI;
            b.set_row(i, &row.transpose());
        }
        b
    }

    /// 以 2π 为单位的倒格矢
    pub fn recp_latt_2pi(&self) -> Matrix3<f64> {
        self.recp_latt() / (2.0 * PI)
    }

    /// 倒格矢长度
    pub fn blen(&self) -> [f64; 3] {
        let b = self.recp_latt();
        [0, 1, 2].map(|i| b.row(i).norm())
    }

    // ─────────────────────────────────────────────────────────────
    // 坐标与单位
    // ─────────────────────────────────────────────────────────────

    fn inv_latt(&self) -> Result<Matrix3<f64>> {
        self.latt.try_inverse().ok_or_else(|| {
            MushroomError::Cell(format!("singular lattice vectors {:?}", self.latt_rows()))
        })
    }

    /// 切换坐标系：`posi_cart = posi_frac · latt`
    pub fn set_coord_sys(&mut self, sys: CoordSys) -> Result<()> {
        if sys == self.coord_sys {
            return Ok(());
        }
        // 行向量右乘矩阵 M 等价于列向量左乘 M^T
        let conv = match sys {
            CoordSys::Cartesian => self.latt.transpose(),
            CoordSys::Direct => self.inv_latt()?.transpose(),
        };
        for p in self.posi.iter_mut() {
            *p = conv * *p;
        }
        self.coord_sys = sys;
        Ok(())
    }

    /// 分数坐标副本，不改变当前坐标系
    pub fn frac_posi(&self) -> Result<Vec<Vector3<f64>>> {
        match self.coord_sys {
            CoordSys::Direct => Ok(self.posi.clone()),
            CoordSys::Cartesian => {
                let conv = self.inv_latt()?.transpose();
                Ok(self.posi.iter().map(|p| conv * p).collect())
            }
        }
    }

    /// 切换长度单位。笛卡尔坐标随晶格一起缩放
    pub fn set_unit(&mut self, unit: LengthUnit) {
        if unit == self.unit {
            return;
        }
        let factor = LengthUnit::factor(self.unit, unit);
        self.latt *= factor;
        if self.coord_sys == CoordSys::Cartesian {
            for p in self.posi.iter_mut() {
                *p *= factor;
            }
        }
        self.unit = unit;
    }

    /// 把晶格放大 `scale` 倍
    pub fn scale(&mut self, scale: f64) -> Result<()> {
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(MushroomError::InvalidArgument(format!(
                "scale must be positive real, got {}",
                scale
            )));
        }
        self.latt *= scale;
        if self.coord_sys == CoordSys::Cartesian {
            for p in self.posi.iter_mut() {
                *p *= scale;
            }
        }
        Ok(())
    }

    /// 把所有原子移入 (0,0,0) 晶胞，分数坐标落在 [0, 1)
    pub fn move_atoms_to_first_lattice(&mut self) -> Result<()> {
        let was = self.coord_sys;
        self.set_coord_sys(CoordSys::Direct)?;
        for p in self.posi.iter_mut() {
            *p = p.map(|x| x - x.floor());
        }
        self.set_coord_sys(was)
    }

    /// 原子的几何中心（分数坐标）
    ///
    /// 某一分量为 0 的原子在该方向上与其周期像平均，贡献 0.5。
    pub fn center(&self) -> Result<Vector3<f64>> {
        let sum = self
            .frac_posi()?
            .iter()
            .map(|p| p.map(|x| x - x.floor()).map(|x| if x == 0.0 { 0.5 } else { x }))
            .fold(Vector3::zeros(), |acc, p| acc + p);
        Ok(sum / self.natm() as f64)
    }

    /// 沿指定轴把原子中心移到晶胞中央，多用于表面模型
    pub fn centering(&mut self, axes: &[usize]) -> Result<()> {
        let axes = axis_list(axes)?;
        let was = self.coord_sys;
        self.set_coord_sys(CoordSys::Direct)?;
        let center = self.center()?;
        let mut shift = Vector3::repeat(0.5) - center;
        for i in 0..3 {
            if !axes.contains(&(i + 1)) {
                shift[i] = 0.0;
            }
        }
        for p in self.posi.iter_mut() {
            *p += shift;
        }
        self.set_coord_sys(was)
    }

    // ─────────────────────────────────────────────────────────────
    // 排序
    // ─────────────────────────────────────────────────────────────

    /// 交换两个原子的全部位置相关信息，不改变几何
    fn switch_two_atoms(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.posi.swap(i, j);
        self.atms.swap(i, j);
        let fi = self.select_dyn.remove(&i);
        let fj = self.select_dyn.remove(&j);
        if let Some(f) = fi {
            self.select_dyn.insert(j, f);
        }
        if let Some(f) = fj {
            self.select_dyn.insert(i, f);
        }
    }

    /// 对 `indices` 中的原子按 `key` 做稳定的插入排序，返回排序后位置到原索引的映射
    fn bubble_sort_atoms<K: PartialOrd + Copy>(
        &mut self,
        key: &[K],
        indices: &[usize],
        reverse: bool,
    ) -> Vec<usize> {
        let mut mapping = indices.to_vec();
        let mut k: Vec<K> = indices.iter().map(|&i| key[i]).collect();
        for i in 1..indices.len() {
            let mut j = i;
            while j > 0 {
                let (l, r) = (j - 1, j);
                let out_of_order = if reverse { k[r] > k[l] } else { k[r] < k[l] };
                if !out_of_order {
                    break;
                }
                self.switch_two_atoms(indices[l], indices[r]);
                k.swap(l, r);
                mapping.swap(l, r);
                j -= 1;
            }
        }
        mapping
    }

    /// 按元素首次出现顺序分组，返回新位置到原索引的映射
    pub fn sort_atms(&mut self) -> Vec<usize> {
        let key = self.type_index(0);
        let indices: Vec<usize> = (0..self.natm()).collect();
        self.bubble_sort_atoms(&key, &indices, false)
    }

    /// 在每种元素内部按某一轴坐标排序
    ///
    /// 默认坐标大的原子在前，`reverse` 时相反。
    pub fn sort_posi(&mut self, axis: usize, reverse: bool) -> Result<()> {
        if !(1..=3).contains(&axis) {
            return Err(MushroomError::InvalidArgument(format!(
                "axis must be 1, 2 or 3, got {}",
                axis
            )));
        }
        let keys: Vec<f64> = self.posi.iter().map(|p| p[axis - 1]).collect();
        for at in self.atom_types() {
            let ind = self.get_sym_index(&at);
            self.bubble_sort_atoms(&keys, &ind, !reverse);
        }
        Ok(())
    }

    /// 添加原子，坐标以当前坐标系表示
    pub fn add_atom(
        &mut self,
        atom: &str,
        coord: [f64; 3],
        select_dyn: Option<SdFlag>,
        sort_atms: bool,
    ) -> Result<()> {
        if coord.iter().any(|x| !x.is_finite()) {
            return Err(MushroomError::Cell(format!("Invalid coordinate: {:?}", coord)));
        }
        if let Some(flag) = select_dyn {
            self.select_dyn.insert(self.natm(), flag);
        }
        self.posi.push(Vector3::new(coord[0], coord[1], coord[2]));
        self.atms.push(capitalize(atom));
        self.move_atoms_to_first_lattice()?;
        if sort_atms {
            self.sort_atms();
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 选择性动力学
    // ─────────────────────────────────────────────────────────────

    /// 是否需要写出选择性动力学标记
    pub fn use_select_dyn(&self) -> bool {
        !(self.all_relax && self.select_dyn.is_empty())
    }

    pub fn fix_all(&mut self) {
        self.select_dyn.clear();
        self.all_relax = false;
    }

    pub fn relax_all(&mut self) {
        self.select_dyn.clear();
        self.all_relax = true;
    }

    fn set_flags(&mut self, indices: &[usize], axes: &[usize], relax: bool) -> Result<()> {
        let flag = select_dyn_flag_from_axis(axes, relax)?;
        for &ia in indices {
            if ia >= self.natm() {
                warn!("atom index {} out of range, skipped", ia);
                continue;
            }
            self.select_dyn.insert(ia, flag);
        }
        Ok(())
    }

    /// 固定指定原子沿 `axes` 的坐标，其余方向弛豫
    pub fn set_fix(&mut self, indices: &[usize], axes: &[usize]) -> Result<()> {
        self.set_flags(indices, axes, false)
    }

    /// 弛豫指定原子沿 `axes` 的坐标，其余方向固定
    pub fn set_relax(&mut self, indices: &[usize], axes: &[usize]) -> Result<()> {
        self.set_flags(indices, axes, true)
    }

    /// 单个原子的标记，未单独设置时取全局标记
    pub fn sd_flag(&self, ia: usize) -> Result<SdFlag> {
        if ia >= self.natm() {
            return Err(MushroomError::out_of_range("atom", ia as i64, self.natm()));
        }
        Ok(self
            .select_dyn
            .get(&ia)
            .copied()
            .unwrap_or([self.all_relax; 3]))
    }

    /// 全部原子的标记
    pub fn sd_flags(&self) -> Vec<SdFlag> {
        (0..self.natm())
            .map(|ia| {
                self.select_dyn
                    .get(&ia)
                    .copied()
                    .unwrap_or([self.all_relax; 3])
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // 超胞
    // ─────────────────────────────────────────────────────────────

    /// 由对角扩胞系数生成超胞
    pub fn supercell(
        &self,
        n1: i32,
        n2: i32,
        n3: i32,
        order: ImageOrder,
        sort_atms: bool,
    ) -> Result<(Cell, Vec<usize>)> {
        self.get_supercell([[n1, 0, 0], [0, n2, 0], [0, 0, n3]], order, sort_atms)
    }

    /// 由整数变换矩阵生成超胞，返回超胞与新原子到原胞原子的索引映射
    ///
    /// 只支持对角矩阵。选择性动力学标记不会带入超胞。
    pub fn get_supercell(
        &self,
        transform: [[i32; 3]; 3],
        order: ImageOrder,
        sort_atms: bool,
    ) -> Result<(Cell, Vec<usize>)> {
        let t = matrix_from_rows(transform.map(|row| row.map(f64::from)));
        info!("Super cell transformation matrix: {:?}", transform);
        let multi = t.determinant().round().abs() as usize;
        if multi == 0 {
            return Err(MushroomError::InvalidArgument(
                "encounter zero expansion".to_string(),
            ));
        }
        let off_diagonal = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .any(|(i, j)| i != j && transform[i][j] != 0);
        if off_diagonal {
            return Err(MushroomError::NotImplemented(
                "Supercell generation with non-diagonal transformation matrix".to_string(),
            ));
        }
        let n = [transform[0][0], transform[1][1], transform[2][2]];
        if n.iter().any(|&x| x <= 0) {
            return Err(MushroomError::InvalidArgument(format!(
                "supercell expansion factors must be positive, got {:?}",
                n
            )));
        }
        let n = n.map(|x| x as usize);
        let nf = Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);

        // 原胞原子在超胞中的分数坐标
        let posi: Vec<Vector3<f64>> = self
            .frac_posi()?
            .iter()
            .map(|p| p.component_div(&nf))
            .collect();

        // 第一个方向变化最快
        let mut shifts = Vec::with_capacity(multi);
        for i3 in 0..n[2] {
            for i2 in 0..n[1] {
                for i1 in 0..n[0] {
                    shifts.push(Vector3::new(i1 as f64, i2 as f64, i3 as f64).component_div(&nf));
                }
            }
        }

        let natm = self.natm();
        let total = natm * multi;
        let mut scatms = vec![String::new(); total];
        let mut scposi = vec![Vector3::zeros(); total];
        let mut mapping = vec![0usize; total];
        for (k, shift) in shifts.iter().enumerate() {
            for j in 0..natm {
                let inew = match order {
                    ImageOrder::Consecutive => j * multi + k,
                    ImageOrder::Blocks => k * natm + j,
                };
                scatms[inew] = self.atms[j].clone();
                scposi[inew] = posi[j] + shift;
                mapping[inew] = j;
            }
        }

        let options = CellOptions {
            unit: self.unit,
            coord_sys: CoordSys::Direct,
            sort_atms: false,
            comment: Some(format!("Super cell of {}", self.comment)),
            reference: self.reference.clone(),
            ..CellOptions::default()
        };
        let mut sc = Cell::from_parts(t * self.latt, scatms, scposi, options)?;
        if sort_atms {
            let new_to_old = sc.sort_atms();
            mapping = new_to_old.iter().map(|&i| mapping[i]).collect();
        }
        if self.coord_sys == CoordSys::Cartesian {
            sc.set_coord_sys(CoordSys::Cartesian)?;
        }
        Ok((sc, mapping))
    }

    // ─────────────────────────────────────────────────────────────
    // 原型结构
    // ─────────────────────────────────────────────────────────────

    fn cubic(a: f64) -> [[f64; 3]; 3] {
        [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]
    }

    fn fcc_primitive(a: f64) -> [[f64; 3]; 3] {
        [[0.0, a / 2.0, a / 2.0], [a / 2.0, 0.0, a / 2.0], [a / 2.0, a / 2.0, 0.0]]
    }

    fn prototype(
        latt: [[f64; 3]; 3],
        atms: &[&str],
        posi: &[[f64; 3]],
        mut options: CellOptions,
        comment: String,
    ) -> Result<Self> {
        options.coord_sys = CoordSys::Direct;
        if options.comment.is_none() {
            options.comment = Some(comment);
        }
        Cell::new(latt, atms, posi, options)
    }

    /// 简单立方
    pub fn bravais_cp(atom: &str, a: f64, options: CellOptions) -> Result<Self> {
        Self::prototype(
            Self::cubic(a),
            &[atom],
            &[[0.0, 0.0, 0.0]],
            options,
            format!("Simple cubic lattice {}", atom),
        )
    }

    /// 体心立方
    pub fn bravais_ci(atom: &str, a: f64, primitive: bool, options: CellOptions) -> Result<Self> {
        let comment = format!("BCC {}", atom);
        if primitive {
            let h = a / 2.0;
            let latt = [[-h, h, h], [h, -h, h], [h, h, -h]];
            Self::prototype(latt, &[atom], &[[0.0, 0.0, 0.0]], options, comment)
        } else {
            Self::prototype(
                Self::cubic(a),
                &[atom, atom],
                &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
                options,
                comment,
            )
        }
    }

    /// 面心立方
    pub fn bravais_cf(atom: &str, a: f64, primitive: bool, options: CellOptions) -> Result<Self> {
        let comment = format!("FCC {}", atom);
        if primitive {
            Self::prototype(
                Self::fcc_primitive(a),
                &[atom],
                &[[0.0, 0.0, 0.0]],
                options,
                comment,
            )
        } else {
            Self::prototype(
                Self::cubic(a),
                &[atom; 4],
                &[[0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0]],
                options,
                comment,
            )
        }
    }

    /// 闪锌矿（空间群 216），`atom1` 在顶点，`atom2` 在四面体间隙
    pub fn zincblende(
        atom1: &str,
        atom2: &str,
        a: f64,
        primitive: bool,
        options: CellOptions,
    ) -> Result<Self> {
        let comment = format!("Zincblende {}{}", atom1, atom2);
        if primitive {
            Self::prototype(
                Self::fcc_primitive(a),
                &[atom1, atom2],
                &[[0.0, 0.0, 0.0], [0.25, 0.25, 0.25]],
                options,
                comment,
            )
        } else {
            Self::prototype(
                Self::cubic(a),
                &[atom1, atom1, atom1, atom1, atom2, atom2, atom2, atom2],
                &[
                    [0.0, 0.0, 0.0],
                    [0.0, 0.5, 0.5],
                    [0.5, 0.0, 0.5],
                    [0.5, 0.5, 0.0],
                    [0.25, 0.25, 0.25],
                    [0.25, 0.75, 0.75],
                    [0.75, 0.25, 0.75],
                    [0.75, 0.75, 0.25],
                ],
                options,
                comment,
            )
        }
    }

    /// 金刚石（空间群 227）
    pub fn diamond(atom: &str, a: f64, primitive: bool, mut options: CellOptions) -> Result<Self> {
        if options.comment.is_none() {
            options.comment = Some(format!("Diamond {}", atom));
        }
        Self::zincblende(atom, atom, a, primitive, options)
    }

    /// 岩盐结构
    pub fn rocksalt(
        atom1: &str,
        atom2: &str,
        a: f64,
        primitive: bool,
        options: CellOptions,
    ) -> Result<Self> {
        let comment = format!("Rocksalt {}{}", atom1, atom2);
        if primitive {
            Self::prototype(
                Self::fcc_primitive(a),
                &[atom1, atom2],
                &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
                options,
                comment,
            )
        } else {
            Self::prototype(
                Self::cubic(a),
                &[atom1, atom1, atom1, atom1, atom2, atom2, atom2, atom2],
                &[
                    [0.0, 0.0, 0.0],
                    [0.0, 0.5, 0.5],
                    [0.5, 0.0, 0.5],
                    [0.5, 0.5, 0.0],
                    [0.5, 0.0, 0.0],
                    [0.0, 0.5, 0.0],
                    [0.0, 0.0, 0.5],
                    [0.5, 0.5, 0.5],
                ],
                options,
                comment,
            )
        }
    }
}
