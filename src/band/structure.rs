//! # 能带结构数据模型
//!
//! [`BandStructure`] 持有本征值 `[nspins, nkpts, nbands]`、占据数、k 点权重以及可选的
//! 投影系数 `[nspins, nkpts, nbands, natms, nprjs]`。所有形状在构造时校验。
//!
//! 能带边在占据数可用时立即计算并保存（不做惰性缓存），因此实例构造完成后可以在线程间共享只读访问。
//!
//! ## 依赖关系
//! - 被 `band/report.rs`, `commands/`, `parsers/` 使用
//! - 使用 `band/edges.rs` 定位能带边
//! - 使用 `band/selector.rs` 解析原子 / 投影子 / 能带选择
//! - 使用 `models/dos.rs` 生成态密度

use super::edges::{BandEdges, EdgeOptions};
use super::selector::{dedup_preserve_order, resolve_labels, BandIdentifier, Selector};
use crate::error::{MushroomError, Result};
use crate::models::dos::DensityOfStates;
use crate::models::unit::EnergyUnit;

use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, Array3, Array4, Array5, Axis};

/// 投影信息
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pwav: Array5<f64>,
    atms: Option<Vec<String>>,
    prjs: Option<Vec<String>>,
}

impl Projection {
    pub fn pwav(&self) -> &Array5<f64> {
        &self.pwav
    }

    pub fn atms(&self) -> Option<&[String]> {
        self.atms.as_deref()
    }

    pub fn prjs(&self) -> Option<&[String]> {
        self.prjs.as_deref()
    }

    pub fn natms(&self) -> usize {
        self.pwav.dim().3
    }

    pub fn nprjs(&self) -> usize {
        self.pwav.dim().4
    }
}

/// 占据数来源，用于 [`BandStructure::reset_occupations`]
#[derive(Debug, Clone)]
pub enum OccupationSource {
    /// 直接给定占据数
    Occupations(Array3<f64>),
    /// 零温下由费米能确定：本征值不高于费米能的态占据
    Fermi(f64, EnergyUnit),
    /// 每个通道最低的 n 个态占据
    States(usize),
}

/// 轨道投影选择：原子与投影子
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrbitalSelector {
    pub atm: Selector,
    pub prj: Selector,
}

impl OrbitalSelector {
    pub fn new(atm: Selector, prj: Selector) -> Self {
        Self { atm, prj }
    }
}

/// 一次跃迁的能量与所涉及的索引
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub energy: f64,
    pub ivk: usize,
    pub ick: usize,
    pub ivb: usize,
    pub icb: usize,
}

/// 高斯展宽态密度参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DosOptions {
    pub emin: Option<f64>,
    pub emax: Option<f64>,
    pub nedos: usize,
    pub sigma: f64,
}

impl Default for DosOptions {
    fn default() -> Self {
        Self {
            emin: None,
            emax: None,
            nedos: 3000,
            sigma: 0.05,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 构造器
// ─────────────────────────────────────────────────────────────

/// [`BandStructure`] 构造器
#[derive(Debug, Clone)]
pub struct BandStructureBuilder {
    eigen: Array3<f64>,
    occ: Option<Array3<f64>>,
    weight: Option<Array1<f64>>,
    efermi: Option<f64>,
    unit: EnergyUnit,
    pwav: Option<Array5<f64>>,
    atms: Option<Vec<String>>,
    prjs: Option<Vec<String>>,
    options: EdgeOptions,
}

impl BandStructureBuilder {
    pub fn occ(mut self, occ: Array3<f64>) -> Self {
        self.occ = Some(occ);
        self
    }

    pub fn weight(mut self, weight: Array1<f64>) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn efermi(mut self, efermi: f64) -> Self {
        self.efermi = Some(efermi);
        self
    }

    pub fn unit(mut self, unit: EnergyUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn projection(
        mut self,
        pwav: Array5<f64>,
        atms: Option<Vec<String>>,
        prjs: Option<Vec<String>>,
    ) -> Self {
        self.pwav = Some(pwav);
        self.atms = atms;
        self.prjs = prjs;
        self
    }

    /// 只设置原子 / 投影子标签，没有投影系数时会被忽略
    pub fn projection_labels(
        mut self,
        atms: Option<Vec<String>>,
        prjs: Option<Vec<String>>,
    ) -> Self {
        self.atms = atms;
        self.prjs = prjs;
        self
    }

    pub fn edge_options(mut self, options: EdgeOptions) -> Self {
        self.options = options;
        self
    }

    /// 校验形状并构造
    pub fn build(self) -> Result<BandStructure> {
        let (nspins, nkpts, nbands) = self.eigen.dim();
        if nspins != 1 && nspins != 2 {
            return Err(MushroomError::BandStructure(format!(
                "nspins must be 1 or 2, got eigen shape {:?}",
                self.eigen.shape()
            )));
        }
        if nkpts == 0 || nbands == 0 {
            return Err(MushroomError::BandStructure(format!(
                "empty eigen array, shape {:?}",
                self.eigen.shape()
            )));
        }

        let mut weight = match self.weight {
            Some(w) => {
                if w.len() != nkpts {
                    return Err(MushroomError::BandStructure(format!(
                        "inconsistent weight/eigen shapes: ({},) vs {:?}",
                        w.len(),
                        self.eigen.shape()
                    )));
                }
                if w.iter().any(|&x| x < 0.0 || !x.is_finite()) {
                    return Err(MushroomError::BandStructure(
                        "k-point weights must be finite and non-negative".to_string(),
                    ));
                }
                w
            }
            None => Array1::ones(nkpts),
        };
        // 能带计算的 k 点权重可能全为零
        if weight.sum().abs() < 1e-12 {
            weight.fill(1.0);
        }

        let mut bs = BandStructure {
            eigen: self.eigen,
            occ: None,
            weight,
            unit: self.unit,
            efermi: self.efermi,
            proj: None,
            options: self.options,
            edges: None,
        };

        info!(
            "Read band structure. nspins = {}, nkpts = {}, nbands = {}",
            nspins, nkpts, nbands
        );

        match (self.occ, self.efermi) {
            (Some(occ), _) => bs.set_occupations(occ)?,
            (None, Some(ef)) => {
                let occ = bs.occupations_from_fermi(ef);
                bs.set_occupations(occ)?;
            }
            (None, None) => {}
        }

        match self.pwav {
            Some(pwav) => bs.set_projection(pwav, self.atms, self.prjs)?,
            None => {
                if self.atms.is_some() || self.prjs.is_some() {
                    warn!("atom/projector labels given without partial waves, ignored");
                }
            }
        }

        Ok(bs)
    }
}

// ─────────────────────────────────────────────────────────────
// 能带结构
// ─────────────────────────────────────────────────────────────

/// 能带结构
#[derive(Debug, Clone)]
pub struct BandStructure {
    eigen: Array3<f64>,
    occ: Option<Array3<f64>>,
    weight: Array1<f64>,
    unit: EnergyUnit,
    efermi: Option<f64>,
    proj: Option<Projection>,
    options: EdgeOptions,
    edges: Option<BandEdges>,
}

impl BandStructure {
    /// 以本征值开始构造
    pub fn builder(eigen: Array3<f64>) -> BandStructureBuilder {
        BandStructureBuilder {
            eigen,
            occ: None,
            weight: None,
            efermi: None,
            unit: EnergyUnit::Ev,
            pwav: None,
            atms: None,
            prjs: None,
            options: EdgeOptions::default(),
        }
    }

    // ── 维度与原始数据 ──

    pub fn nspins(&self) -> usize {
        self.eigen.dim().0
    }

    pub fn nkpts(&self) -> usize {
        self.eigen.dim().1
    }

    pub fn nbands(&self) -> usize {
        self.eigen.dim().2
    }

    /// 自旋 × k 点通道数
    pub fn nstates(&self) -> usize {
        self.nspins() * self.nkpts()
    }

    pub fn eigen(&self) -> &Array3<f64> {
        &self.eigen
    }

    pub fn occ(&self) -> Option<&Array3<f64>> {
        self.occ.as_ref()
    }

    pub fn weight(&self) -> &Array1<f64> {
        &self.weight
    }

    pub fn unit(&self) -> EnergyUnit {
        self.unit
    }

    pub fn edge_options(&self) -> &EdgeOptions {
        &self.options
    }

    /// 费米能；未显式给定时取 VBM，两者都不可用时为 `None`
    pub fn efermi(&self) -> Option<f64> {
        self.efermi.or_else(|| self.edges.as_ref().map(|e| e.vbm))
    }

    /// 电子数：k 点加权的占据数之和
    pub fn nelect(&self) -> Option<f64> {
        let occ = self.occ.as_ref()?;
        let wsum = self.weight.sum();
        let per_kpt = occ.sum_axis(Axis(2));
        Some(per_kpt.dot(&self.weight).sum() / wsum)
    }

    /// 每条能带在 k 上的能量范围，形状 `[nspins, nbands, 2]`
    pub fn band_width(&self) -> Array3<f64> {
        let (nspins, _, nbands) = self.eigen.dim();
        let mut width = Array3::<f64>::zeros((nspins, nbands, 2));
        for is in 0..nspins {
            for ib in 0..nbands {
                let col = self.eigen.slice(s![is, .., ib]);
                width[[is, ib, 0]] = col.fold(f64::INFINITY, |a, &b| a.min(b));
                width[[is, ib, 1]] = col.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            }
        }
        width
    }

    // ── 占据数 ──

    fn occupations_from_fermi(&self, efermi: f64) -> Array3<f64> {
        self.eigen.mapv(|e| if e <= efermi { 1.0 } else { 0.0 })
    }

    fn check_occ_shape(&self, occ: &Array3<f64>) -> Result<()> {
        if occ.dim() != self.eigen.dim() {
            return Err(MushroomError::BandStructure(format!(
                "inconsistent eigen/occ shapes: {:?}, {:?}",
                self.eigen.shape(),
                occ.shape()
            )));
        }
        Ok(())
    }

    /// 附加占据数，只允许一次
    pub fn set_occupations(&mut self, occ: Array3<f64>) -> Result<()> {
        if self.occ.is_some() {
            return Err(MushroomError::BandStructure(
                "occupations are already set, use reset_occupations instead".to_string(),
            ));
        }
        self.check_occ_shape(&occ)?;
        self.occ = Some(occ);
        self.compute_band_edges(true)
    }

    /// 重新设置占据数并重新计算能带边
    pub fn reset_occupations(&mut self, source: OccupationSource) -> Result<()> {
        let occ = match source {
            OccupationSource::Occupations(occ) => {
                self.check_occ_shape(&occ)?;
                occ
            }
            OccupationSource::Fermi(ef, unit) => {
                self.occupations_from_fermi(unit.convert(ef, self.unit))
            }
            OccupationSource::States(n) => {
                if n > self.nbands() {
                    return Err(MushroomError::out_of_range(
                        "occupied states",
                        n as i64,
                        self.nbands() + 1,
                    ));
                }
                let mut occ = Array3::<f64>::zeros(self.eigen.dim());
                occ.slice_mut(s![.., .., ..n]).fill(1.0);
                occ
            }
        };
        info!("occupation (re)set, recompute band edges");
        self.occ = Some(occ);
        self.compute_band_edges(true)
    }

    // ── 投影 ──

    /// 附加投影系数，校验前三维与本征值一致、标签数目与后两维一致
    pub fn set_projection(
        &mut self,
        pwav: Array5<f64>,
        atms: Option<Vec<String>>,
        prjs: Option<Vec<String>>,
    ) -> Result<()> {
        let (ns, nk, nb, natms, nprjs) = pwav.dim();
        if (ns, nk, nb) != self.eigen.dim() {
            return Err(MushroomError::BandStructure(format!(
                "inconsistent eigen/pwav shapes: {:?}, {:?}",
                self.eigen.shape(),
                pwav.shape()
            )));
        }
        if let Some(a) = &atms {
            if a.len() != natms {
                return Err(MushroomError::BandStructure(format!(
                    "{} atom labels for {} atoms in pwav",
                    a.len(),
                    natms
                )));
            }
        }
        if let Some(p) = &prjs {
            if p.len() != nprjs {
                return Err(MushroomError::BandStructure(format!(
                    "{} projector labels for {} projectors in pwav",
                    p.len(),
                    nprjs
                )));
            }
        }
        self.proj = Some(Projection { pwav, atms, prjs });
        Ok(())
    }

    pub fn has_proj(&self) -> bool {
        self.proj.is_some()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.proj.as_ref()
    }

    fn require_proj(&self) -> Result<&Projection> {
        self.proj
            .as_ref()
            .ok_or_else(|| MushroomError::MissingData("partial wave is not parsed".to_string()))
    }

    // ── 能带边 ──

    /// 计算能带边。已计算且 `reload == false` 时不做任何事
    pub fn compute_band_edges(&mut self, reload: bool) -> Result<()> {
        if self.edges.is_some() && !reload {
            return Ok(());
        }
        let occ = self.occ.as_ref().ok_or_else(|| {
            MushroomError::MissingData(
                "need occupation numbers before computing band edges".to_string(),
            )
        })?;
        let mut options = self.options;
        options.degenerate_threshold =
            EnergyUnit::Ev.convert(self.options.degenerate_threshold, self.unit);
        let edges = BandEdges::compute(&self.eigen, occ, &options);
        debug!("is_metal? {}", edges.is_metal);
        self.edges = Some(edges);
        Ok(())
    }

    /// 切换能带边定位方式并重新计算
    pub fn set_edge_options(&mut self, options: EdgeOptions) -> Result<()> {
        self.options = options;
        if self.occ.is_some() {
            self.compute_band_edges(true)?;
        }
        Ok(())
    }

    /// 已计算的能带边
    pub fn edges(&self) -> Result<&BandEdges> {
        self.edges.as_ref().ok_or_else(|| {
            MushroomError::MissingData(
                "band edges unavailable, occupation numbers are required".to_string(),
            )
        })
    }

    pub fn is_metal(&self) -> Result<bool> {
        Ok(self.edges()?.is_metal)
    }

    pub fn has_infty_cbm(&self) -> Result<bool> {
        Ok(self.edges()?.has_infty_cbm)
    }

    pub fn vbm(&self) -> Result<f64> {
        Ok(self.edges()?.vbm)
    }

    pub fn cbm(&self) -> Result<f64> {
        Ok(self.edges()?.cbm)
    }

    /// 全局 VBM 的 `(ispin, ikpt, iband)`
    pub fn ivbm(&self) -> Result<(usize, usize, usize)> {
        Ok(self.edges()?.ivbm)
    }

    /// 全局 CBM 的 `(ispin, ikpt, iband)`
    pub fn icbm(&self) -> Result<(usize, usize, usize)> {
        Ok(self.edges()?.icbm)
    }

    pub fn vbm_sp(&self) -> Result<&Array1<f64>> {
        Ok(&self.edges()?.vbm_sp)
    }

    pub fn cbm_sp(&self) -> Result<&Array1<f64>> {
        Ok(&self.edges()?.cbm_sp)
    }

    pub fn vbm_sp_kp(&self) -> Result<&Array2<f64>> {
        Ok(&self.edges()?.vbm_sp_kp)
    }

    pub fn cbm_sp_kp(&self) -> Result<&Array2<f64>> {
        Ok(&self.edges()?.cbm_sp_kp)
    }

    pub fn ivbm_sp_kp(&self) -> Result<&Array2<usize>> {
        Ok(&self.edges()?.ivbm_sp_kp)
    }

    pub fn icbm_sp_kp(&self) -> Result<&Array2<usize>> {
        Ok(&self.edges()?.icbm_sp_kp)
    }

    // ── 带隙 ──

    /// 每个自旋 × k 点通道上的直接带隙，金属可为负
    pub fn direct_gaps(&self) -> Result<Array2<f64>> {
        let e = self.edges()?;
        Ok(&e.cbm_sp_kp - &e.vbm_sp_kp)
    }

    /// 每个自旋通道的最小直接带隙，对 k 点取最小值
    ///
    /// k 点权重加权平均见 [`BandStructure::kavg_gap`]
    pub fn direct_gap_sp(&self) -> Result<Array1<f64>> {
        let gaps = self.direct_gaps()?;
        Ok(gaps.map_axis(Axis(1), |row| row.fold(f64::INFINITY, |a, &b| a.min(b))))
    }

    /// 最小直接带隙
    pub fn direct_gap(&self) -> Result<f64> {
        Ok(self
            .direct_gap_sp()?
            .fold(f64::INFINITY, |a, &b| a.min(b)))
    }

    /// VBM 所在 k 点的直接带隙
    pub fn direct_gap_vbm(&self) -> Result<f64> {
        let (is, ik, _) = self.ivbm()?;
        Ok(self.direct_gaps()?[[is, ik]])
    }

    /// CBM 所在 k 点的直接带隙
    pub fn direct_gap_cbm(&self) -> Result<f64> {
        let (is, ik, _) = self.icbm()?;
        Ok(self.direct_gaps()?[[is, ik]])
    }

    /// 每个自旋通道的基本带隙；金属时为负
    pub fn fund_gap_sp(&self) -> Result<Array1<f64>> {
        let e = self.edges()?;
        Ok(&e.cbm_sp - &e.vbm_sp)
    }

    pub fn fund_gap(&self) -> Result<f64> {
        let e = self.edges()?;
        Ok(e.cbm - e.vbm)
    }

    /// 是否为直接带隙材料
    pub fn is_gap_direct(&self) -> Result<bool> {
        let direct = self.direct_gap()?;
        Ok(self.fund_gap_sp()?.iter().all(|&g| g >= direct - 1e-12))
    }

    /// 每个自旋通道基本带隙对应的 `(ikpt_vbm, ikpt_cbm)`
    pub fn fund_trans(&self) -> Result<Vec<(usize, usize)>> {
        let e = self.edges()?;
        Ok(e.ivbm_sp
            .iter()
            .zip(e.icbm_sp.iter())
            .map(|(v, c)| (v.0, c.0))
            .collect())
    }

    /// 全局基本带隙对应的 `((ispin, ikpt), (ispin, ikpt))`
    pub fn fund_trans_global(&self) -> Result<((usize, usize), (usize, usize))> {
        let e = self.edges()?;
        Ok(((e.ivbm.0, e.ivbm.1), (e.icbm.0, e.icbm.1)))
    }

    /// k 点加权平均的直接带隙，每个自旋一个值
    ///
    /// 与 [`BandStructure::direct_gap_sp`] 不同，此处按权重求均值而非取最小
    pub fn kavg_gap(&self) -> Result<Array1<f64>> {
        let gaps = self.direct_gaps()?;
        Ok(gaps.dot(&self.weight) / self.weight.sum())
    }

    // ── 能带索引 ──

    /// 解析单个能带标识
    pub fn resolve_band(&self, iden: &BandIdentifier) -> Result<usize> {
        if !iden.is_symbolic() {
            return iden.resolve(0, 0, self.nbands());
        }
        let e = self.edges.as_ref().ok_or_else(|| {
            MushroomError::MissingData(format!(
                "band identifier '{}' needs band edges, occupation numbers are required",
                iden
            ))
        })?;
        iden.resolve(e.ivbm.2, e.icbm.2, self.nbands())
    }

    /// 把能带标识字符串（整数、`vbm`、`cbm-2` 等）转换为绝对索引
    pub fn get_band_indices<S: AsRef<str>>(&self, idens: &[S]) -> Result<Vec<usize>> {
        idens
            .iter()
            .map(|s| {
                let iden: BandIdentifier = s.as_ref().parse()?;
                self.resolve_band(&iden)
            })
            .collect()
    }

    /// 把能带选择器转换为索引列表
    pub fn resolve_bands(&self, selector: &Selector) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        self.collect_bands(selector, &mut out)?;
        Ok(dedup_preserve_order(out))
    }

    fn collect_bands(&self, selector: &Selector, out: &mut Vec<usize>) -> Result<()> {
        match selector {
            Selector::All => out.extend(0..self.nbands()),
            Selector::Index(i) => out.push(self.resolve_band(&BandIdentifier::Index(*i))?),
            Selector::Label(s) => out.push(self.resolve_band(&s.parse()?)?),
            Selector::List(items) => {
                for item in items {
                    self.collect_bands(item, out)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_atms(&self, proj: &Projection, atm: &Selector) -> Result<Vec<usize>> {
        resolve_labels(atm, proj.atms(), proj.natms(), "atom")
    }

    fn resolve_prjs(&self, proj: &Projection, prj: &Selector) -> Result<Vec<usize>> {
        resolve_labels(prj, proj.prjs(), proj.nprjs(), "projector")
    }

    /// 选定能带的本征值，形状 `[nspins, nkpts, nb]`
    pub fn get_eigen(&self, bands: &Selector) -> Result<Array3<f64>> {
        let indices = self.resolve_bands(bands)?;
        Ok(self.eigen.select(Axis(2), &indices))
    }

    /// 对选定原子与投影子求和的投影系数，形状 `[nspins, nkpts, nb]`
    pub fn get_pwav(&self, atm: &Selector, prj: &Selector, bands: &Selector) -> Result<Array3<f64>> {
        let proj = self.require_proj()?;
        let atm_ids = self.resolve_atms(proj, atm)?;
        let prj_ids = self.resolve_prjs(proj, prj)?;
        let band_ids = self.resolve_bands(bands)?;
        if band_ids.is_empty() {
            return Err(MushroomError::InvalidArgument("no band is specified".to_string()));
        }
        debug!(
            "extracting pwav for bands {:?}, atms {:?}, prjs {:?}",
            band_ids, atm_ids, prj_ids
        );

        let (nspins, nkpts, _) = self.eigen.dim();
        let mut coeff = Array3::<f64>::zeros((nspins, nkpts, band_ids.len()));
        for ((is, ik, j), c) in coeff.indexed_iter_mut() {
            let ib = band_ids[j];
            *c = atm_ids
                .iter()
                .flat_map(|&ia| prj_ids.iter().map(move |&ip| (ia, ip)))
                .map(|(ia, ip)| proj.pwav[[is, ik, ib, ia, ip]])
                .sum();
        }
        Ok(coeff)
    }

    /// 有效带隙：`1 / Σ|c_v c_c / Eg(s,k)|`，无重叠时为 +∞
    ///
    /// `ivb` / `icb` 缺省时使用全局 VBM / CBM 所在能带。
    pub fn effective_gap(
        &self,
        ivb: Option<usize>,
        icb: Option<usize>,
        vb: &OrbitalSelector,
        cb: &OrbitalSelector,
    ) -> Result<f64> {
        if !self.has_proj() {
            return Err(MushroomError::MissingData(
                "unable to compute effective gap, since no partial wave is parsed. try kavg_gap"
                    .to_string(),
            ));
        }
        let e = self.edges()?;
        let ivb = ivb.unwrap_or(e.ivbm.2);
        let icb = icb.unwrap_or(e.icbm.2);
        let vb_coef = self.get_pwav(&vb.atm, &vb.prj, &Selector::Index(ivb))?;
        let cb_coef = self.get_pwav(&cb.atm, &cb.prj, &Selector::Index(icb))?;
        let gaps = self.direct_gaps()?;

        let mut inv = 0.0;
        for ((is, ik), g) in gaps.indexed_iter() {
            inv += (vb_coef[[is, ik, 0]] * cb_coef[[is, ik, 0]] / g).abs();
        }
        if inv.abs() < 1e-8 {
            return Ok(f64::INFINITY);
        }
        Ok(1.0 / inv)
    }

    /// 给定通道上的跃迁能量
    ///
    /// k 点缺省时，价带取该能带能量最高的 k 点，导带取能量最低的 k 点；
    /// 能带缺省时取 VBM / CBM。
    pub fn get_transition(
        &self,
        ivk: Option<usize>,
        ick: Option<usize>,
        ivb: Option<BandIdentifier>,
        icb: Option<BandIdentifier>,
        ispin: usize,
    ) -> Result<Transition> {
        if ispin >= self.nspins() {
            return Err(MushroomError::out_of_range("spin", ispin as i64, self.nspins()));
        }
        let ivb = self.resolve_band(&ivb.unwrap_or(BandIdentifier::Vbm(0)))?;
        let icb = self.resolve_band(&icb.unwrap_or(BandIdentifier::Cbm(0)))?;
        let nk = self.nkpts();

        let vb_line = self.eigen.slice(s![ispin, .., ivb]);
        let cb_line = self.eigen.slice(s![ispin, .., icb]);
        let ivk = match ivk {
            Some(k) if k >= nk => return Err(MushroomError::out_of_range("kpoint", k as i64, nk)),
            Some(k) => k,
            None => argmax(vb_line.iter().copied()),
        };
        let ick = match ick {
            Some(k) if k >= nk => return Err(MushroomError::out_of_range("kpoint", k as i64, nk)),
            Some(k) => k,
            None => argmin(cb_line.iter().copied()),
        };

        Ok(Transition {
            energy: cb_line[ick] - vb_line[ivk],
            ivk,
            ick,
            ivb,
            icb,
        })
    }

    // ── 单位与变换 ──

    /// 切换能量单位，本征值、费米能与能带边一起缩放
    pub fn set_unit(&mut self, unit: EnergyUnit) {
        if unit == self.unit {
            return;
        }
        let factor = EnergyUnit::factor(self.unit, unit);
        self.eigen.mapv_inplace(|x| x * factor);
        if let Some(ef) = self.efermi.as_mut() {
            *ef *= factor;
        }
        if let Some(edges) = self.edges.as_mut() {
            edges.scale(factor);
        }
        self.unit = unit;
    }

    fn rebuilt(&self, eigen: Array3<f64>, efermi: Option<f64>) -> Result<BandStructure> {
        let mut builder = BandStructure::builder(eigen)
            .weight(self.weight.clone())
            .unit(self.unit)
            .edge_options(self.options);
        if let Some(occ) = &self.occ {
            builder = builder.occ(occ.clone());
        }
        if let Some(ef) = efermi {
            builder = builder.efermi(ef);
        }
        if let Some(p) = &self.proj {
            builder = builder.projection(p.pwav.clone(), p.atms.clone(), p.prjs.clone());
        }
        builder.build()
    }

    /// 剪刀算符：CBM 所在能带及以上整体平移，返回新实例
    pub fn apply_scissor(&self, scissor: f64, force_metal: bool) -> Result<BandStructure> {
        let gap = self.fund_gap()?;
        if gap < 0.0 {
            return Err(MushroomError::NotImplemented(
                "scissor operator for metals".to_string(),
            ));
        }
        if gap + scissor < 0.0 && !force_metal {
            return Err(MushroomError::InvalidArgument(format!(
                "scissor {} closes the gap {}, pass force_metal to apply anyway",
                scissor, gap
            )));
        }
        let icb = self.icbm()?.2;
        let mut eigen = self.eigen.clone();
        eigen
            .slice_mut(s![.., .., icb..])
            .mapv_inplace(|x| x + scissor);
        self.rebuilt(eigen, self.efermi)
    }

    /// 整体平移所有能量
    pub fn shifted(&self, delta: f64) -> Result<BandStructure> {
        let eigen = self.eigen.mapv(|x| x + delta);
        self.rebuilt(eigen, self.efermi.map(|ef| ef + delta))
    }

    /// 与另一能带结构的本征值之差
    ///
    /// `other` 的能带数不得少于自身，多出的能带忽略。结果的费米能被清除。
    pub fn difference(&self, other: &BandStructure) -> Result<BandStructure> {
        if other.nspins() != self.nspins() || other.nkpts() != self.nkpts() {
            return Err(MushroomError::BandStructure(format!(
                "incompatible shapes for difference: {:?} - {:?}",
                self.eigen.shape(),
                other.eigen.shape()
            )));
        }
        if other.nbands() < self.nbands() {
            return Err(MushroomError::BandStructure(format!(
                "subtrahend should have no fewer bands, but {} < {}",
                other.nbands(),
                self.nbands()
            )));
        }
        let factor = EnergyUnit::factor(other.unit, self.unit);
        let nb = self.nbands();
        let sub = other.eigen.slice(s![.., .., ..nb]).mapv(|x| x * factor);
        let eigen = &self.eigen - &sub;
        self.rebuilt(eigen, None)
    }

    /// 去掉开头与末尾的若干能带
    pub fn prune_bands(&mut self, from_start: usize, from_end: usize) -> Result<()> {
        if from_start == 0 && from_end == 0 {
            return Ok(());
        }
        let nb = self.nbands();
        if from_start + from_end >= nb {
            return Err(MushroomError::InvalidArgument(format!(
                "cannot remove {} + {} bands from {}",
                from_start, from_end, nb
            )));
        }
        let ed = nb - from_end;
        self.eigen = self.eigen.slice(s![.., .., from_start..ed]).to_owned();
        if let Some(occ) = self.occ.as_mut() {
            *occ = occ.slice(s![.., .., from_start..ed]).to_owned();
        }
        if let Some(p) = self.proj.as_mut() {
            p.pwav = p.pwav.slice(s![.., .., from_start..ed, .., ..]).to_owned();
        }
        if self.occ.is_some() {
            self.compute_band_edges(true)?;
        }
        Ok(())
    }

    /// 高斯展宽得到态密度，k 点按权重归一
    pub fn get_dos(&self, opts: &DosOptions) -> Result<DensityOfStates> {
        if opts.nedos < 2 {
            return Err(MushroomError::InvalidArgument(format!(
                "nedos must be at least 2, got {}",
                opts.nedos
            )));
        }
        let sigma = opts.sigma.abs();
        if sigma == 0.0 || !sigma.is_finite() {
            return Err(MushroomError::InvalidArgument(
                "smearing width must be positive".to_string(),
            ));
        }
        let emin = opts
            .emin
            .unwrap_or_else(|| self.eigen.fold(f64::INFINITY, |a, &b| a.min(b)));
        let emax = opts
            .emax
            .unwrap_or_else(|| self.eigen.fold(f64::NEG_INFINITY, |a, &b| a.max(b)));
        if emax < emin {
            return Err(MushroomError::InvalidArgument(format!(
                "emax {} below emin {}",
                emax, emin
            )));
        }

        let egrid = Array1::linspace(emin - 10.0 * sigma, emax + 10.0 * sigma, opts.nedos);
        let (nspins, nkpts, nbands) = self.eigen.dim();
        let wk = &self.weight / self.weight.sum();
        let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());

        let mut tdos = Array2::<f64>::zeros((nspins, opts.nedos));
        let mut pdos = self
            .proj
            .as_ref()
            .map(|p| Array4::<f64>::zeros((nspins, opts.nedos, p.natms(), p.nprjs())));

        for (ie, &x) in egrid.iter().enumerate() {
            for is in 0..nspins {
                for ik in 0..nkpts {
                    for ib in 0..nbands {
                        let d = (self.eigen[[is, ik, ib]] - x) / sigma;
                        let g = wk[ik] * norm * (-0.5 * d * d).exp();
                        tdos[[is, ie]] += g;
                        if let (Some(pdos), Some(p)) = (pdos.as_mut(), self.proj.as_ref()) {
                            let mut slot = pdos.slice_mut(s![is, ie, .., ..]);
                            slot.scaled_add(g, &p.pwav.slice(s![is, ik, ib, .., ..]));
                        }
                    }
                }
            }
        }

        let mut dos = DensityOfStates::new(egrid, tdos, self.efermi(), self.unit)?;
        if let (Some(pdos), Some(p)) = (pdos, self.proj.as_ref()) {
            dos.set_pdos(pdos, p.atms.clone(), p.prjs.clone())?;
        }
        Ok(dos)
    }
}

fn argmax(it: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, x) in it.enumerate() {
        if x > best.1 {
            best = (i, x);
        }
    }
    best.0
}

fn argmin(it: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::INFINITY);
    for (i, x) in it.enumerate() {
        if x < best.1 {
            best = (i, x);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::edges::EdgeMethod;
    use ndarray::{array, Array};

    /// 下半部分能带占据、上半部分空，带隙均匀为 `gap`
    fn uniform_gap(nspins: usize, nkpts: usize, nbands: usize, gap: f64) -> BandStructure {
        let half = nbands / 2;
        let eigen = Array3::from_shape_fn((nspins, nkpts, nbands), |(_, _, ib)| {
            if ib < half {
                -((half - ib) as f64)
            } else {
                (ib - half) as f64 + gap - 1.0
            }
        });
        let occ = Array3::from_shape_fn((nspins, nkpts, nbands), |(_, _, ib)| {
            if ib < half {
                1.0
            } else {
                0.0
            }
        });
        BandStructure::builder(eigen).occ(occ).build().unwrap()
    }

    fn with_proj() -> BandStructure {
        // nspins=1, nkpts=2, nbands=2, natms=2, nprjs=2
        let eigen = array![[[-1.0, 1.0], [-0.5, 1.5]]];
        let occ = array![[[1.0, 0.0], [1.0, 0.0]]];
        let pwav = Array::from_shape_fn((1, 2, 2, 2, 2), |(_, ik, ib, ia, ip)| {
            0.1 * (1 + ik + ib + ia * 2 + ip) as f64
        });
        BandStructure::builder(eigen)
            .occ(occ)
            .projection(
                pwav,
                Some(vec!["Si".to_string(), "O".to_string()]),
                Some(vec!["s".to_string(), "p".to_string()]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_shape_invariants() {
        for &(ns, nk, nb) in &[(1, 1, 2), (2, 3, 4), (1, 5, 6)] {
            let eigen = Array3::<f64>::zeros((ns, nk, nb));
            let occ = Array3::<f64>::zeros((ns, nk, nb));
            let weight = Array1::<f64>::ones(nk);
            assert!(BandStructure::builder(eigen.clone())
                .occ(occ)
                .weight(weight)
                .build()
                .is_ok());

            let bad_occ = Array3::<f64>::zeros((ns, nk, nb + 1));
            assert!(BandStructure::builder(eigen.clone()).occ(bad_occ).build().is_err());
            let bad_occ = Array3::<f64>::zeros((ns, nk + 1, nb));
            assert!(BandStructure::builder(eigen.clone()).occ(bad_occ).build().is_err());
            let bad_weight = Array1::<f64>::ones(nk + 1);
            assert!(BandStructure::builder(eigen).weight(bad_weight).build().is_err());
        }
        let three_spins = Array3::<f64>::zeros((3, 1, 2));
        assert!(BandStructure::builder(three_spins).build().is_err());
    }

    #[test]
    fn test_projection_shape_checked() {
        let eigen = Array3::<f64>::zeros((1, 2, 3));
        let pwav = Array5::<f64>::zeros((1, 2, 4, 1, 1));
        assert!(BandStructure::builder(eigen.clone())
            .projection(pwav, None, None)
            .build()
            .is_err());
        let pwav = Array5::<f64>::zeros((1, 2, 3, 2, 1));
        assert!(BandStructure::builder(eigen)
            .projection(pwav, Some(vec!["C".to_string()]), None)
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_weight_renormalized() {
        let eigen = Array3::<f64>::zeros((1, 3, 2));
        let bs = BandStructure::builder(eigen)
            .weight(Array1::zeros(3))
            .build()
            .unwrap();
        assert_eq!(bs.weight(), &Array1::<f64>::ones(3));
    }

    #[test]
    fn test_uniform_gap_semiconductor() {
        let gap = 1.3;
        for method in [EdgeMethod::Occupation, EdgeMethod::Eigenvalue] {
            let mut bs = uniform_gap(2, 4, 6, gap);
            bs.set_edge_options(EdgeOptions {
                method,
                ..EdgeOptions::default()
            })
            .unwrap();
            assert!(!bs.is_metal().unwrap());
            assert!((bs.fund_gap().unwrap() - gap).abs() < 1e-10);
            assert!(bs.direct_gaps().unwrap().iter().all(|g| (g - gap).abs() < 1e-10));
            assert!((bs.direct_gap().unwrap() - gap).abs() < 1e-10);
            assert!(bs.is_gap_direct().unwrap());
            for g in bs.kavg_gap().unwrap().iter() {
                assert!((g - gap).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_kavg_gap_is_weighted_mean() {
        // 两个 k 点的直接带隙为 2 与 4，权重 1:3
        let eigen = array![[[-1.0, 1.0], [-1.0, 3.0]]];
        let occ = array![[[1.0, 0.0], [1.0, 0.0]]];
        let bs = BandStructure::builder(eigen)
            .occ(occ)
            .weight(array![1.0, 3.0])
            .build()
            .unwrap();
        assert!((bs.direct_gap_sp().unwrap()[0] - 2.0).abs() < 1e-12);
        assert!((bs.direct_gap().unwrap() - 2.0).abs() < 1e-12);
        assert!((bs.kavg_gap().unwrap()[0] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_metal_detection() {
        let eigen = array![[[-1.0, 0.1, 1.0], [-1.0, -0.1, 1.0]]];
        let occ = array![[[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]];
        let bs = BandStructure::builder(eigen).occ(occ).build().unwrap();
        assert!(bs.is_metal().unwrap());
    }

    #[test]
    fn test_band_indices() {
        let eigen = array![[[1.0, 2.0, 3.0], [11.0, 22.0, 33.0]]];
        let occ = array![[[1.0, 1.0, 0.0], [1.0, 1.0, 0.0]]];
        let bs = BandStructure::builder(eigen)
            .occ(occ)
            .weight(array![1.0, 4.0])
            .efermi(1.0)
            .build()
            .unwrap();
        assert_eq!(bs.get_band_indices(&["vbm"]).unwrap(), vec![1]);
        assert_eq!(bs.get_band_indices(&["vbm-1", "cbm"]).unwrap(), vec![0, 2]);
        assert_eq!(bs.get_band_indices(&["vbm"]).unwrap()[0], bs.ivbm().unwrap().2);
        assert!(bs.get_band_indices(&["vbm-2"]).is_err());
        assert!(bs.get_band_indices(&["cbm+1"]).is_err());
        assert!(bs.get_band_indices(&["3"]).is_err());
        assert!(bs.get_band_indices(&["vbn"]).is_err());
    }

    #[test]
    fn test_symbolic_needs_occupations() {
        let eigen = array![[[1.0, 2.0, 3.0]]];
        let bs = BandStructure::builder(eigen).build().unwrap();
        assert!(matches!(
            bs.get_band_indices(&["vbm"]),
            Err(MushroomError::MissingData(_))
        ));
        assert_eq!(bs.get_band_indices(&["2"]).unwrap(), vec![2]);
        assert!(bs.vbm().is_err());
        assert!(bs.efermi().is_none());
    }

    #[test]
    fn test_occupations_from_fermi() {
        let eigen = array![[[-1.0, 0.5, 2.0]]];
        let bs = BandStructure::builder(eigen).efermi(0.6).build().unwrap();
        assert_eq!(bs.occ().unwrap(), &array![[[1.0, 1.0, 0.0]]]);
        assert_eq!(bs.ivbm().unwrap().2, 1);
    }

    #[test]
    fn test_set_occupations_once() {
        let eigen = array![[[-1.0, 1.0]]];
        let mut bs = BandStructure::builder(eigen).build().unwrap();
        bs.set_occupations(array![[[1.0, 0.0]]]).unwrap();
        assert!(bs.set_occupations(array![[[1.0, 1.0]]]).is_err());
        assert!((bs.fund_gap().unwrap() - 2.0).abs() < 1e-12);

        bs.reset_occupations(OccupationSource::States(0)).unwrap();
        bs.reset_occupations(OccupationSource::Fermi(1.5, EnergyUnit::Ev))
            .unwrap();
        assert!(bs.has_infty_cbm().unwrap());
        assert!(bs
            .reset_occupations(OccupationSource::Occupations(array![[[1.0]]]))
            .is_err());
    }

    #[test]
    fn test_efermi_defaults_to_vbm() {
        let bs = uniform_gap(1, 2, 4, 1.0);
        assert!((bs.efermi().unwrap() - bs.vbm().unwrap()).abs() < 1e-12);
        assert!((bs.nelect().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_unit_round_trip() {
        let eigen = array![[[-1.0, 0.3, 2.0], [-0.8, 0.5, 2.5]]];
        let occ = array![[[1.0, 1.0, 0.0], [1.0, 1.0, 0.0]]];
        let mut bs = BandStructure::builder(eigen.clone())
            .occ(occ)
            .efermi(0.4)
            .build()
            .unwrap();
        let gap = bs.fund_gap().unwrap();
        bs.set_unit(EnergyUnit::Ry);
        assert!((bs.fund_gap().unwrap() - gap * crate::models::unit::EV2RY).abs() < 1e-10);
        bs.set_unit(EnergyUnit::Ev);
        assert!(bs
            .eigen()
            .iter()
            .zip(eigen.iter())
            .all(|(a, b)| (a - b).abs() < 1e-10));
        assert!((bs.efermi().unwrap() - 0.4).abs() < 1e-10);
        assert!((bs.fund_gap().unwrap() - gap).abs() < 1e-10);
    }

    #[test]
    fn test_pwav_aggregation_matches_raw_sum() {
        let bs = with_proj();
        let total = bs.get_pwav(&Selector::All, &Selector::All, &Selector::All).unwrap();
        let raw = bs.projection().unwrap().pwav().sum_axis(Axis(4)).sum_axis(Axis(3));
        assert_eq!(total.shape(), raw.shape());
        assert!(total.iter().zip(raw.iter()).all(|(a, b)| (a - b).abs() < 1e-12));
    }

    #[test]
    fn test_pwav_selection() {
        let bs = with_proj();
        // Si:p 在 vbm 上：0.1 * (1 + ik + 0 + 0 + 1)
        let c = bs
            .get_pwav(&Selector::from("Si"), &Selector::from("p"), &Selector::from("vbm"))
            .unwrap();
        assert_eq!(c.shape(), &[1, 2, 1]);
        assert!((c[[0, 0, 0]] - 0.2).abs() < 1e-12);
        assert!((c[[0, 1, 0]] - 0.3).abs() < 1e-12);
        assert!(bs
            .get_pwav(&Selector::from("C"), &Selector::All, &Selector::All)
            .is_err());
    }

    #[test]
    fn test_pwav_requires_labels_for_strings() {
        let eigen = array![[[-1.0, 1.0]]];
        let pwav = Array5::<f64>::ones((1, 1, 2, 1, 1));
        let bs = BandStructure::builder(eigen)
            .projection(pwav, None, None)
            .build()
            .unwrap();
        assert!(bs
            .get_pwav(&Selector::from("Si"), &Selector::All, &Selector::All)
            .is_err());
        assert!(bs
            .get_pwav(&Selector::Index(0), &Selector::Index(0), &Selector::Index(1))
            .is_ok());
        let bare = BandStructure::builder(array![[[0.0]]]).build().unwrap();
        assert!(bare
            .get_pwav(&Selector::All, &Selector::All, &Selector::All)
            .is_err());
    }

    #[test]
    fn test_effective_gap() {
        let bs = with_proj();
        let all = OrbitalSelector::default();
        let eg = bs.effective_gap(None, None, &all, &all).unwrap();
        // vb 总系数: k0 = 0.1*(1+2+3+4)=1.0, k1 = 1.4; cb: k0 = 1.4, k1 = 1.8
        // 直接带隙: 2.0, 2.0
        let inv = 1.0 * 1.4 / 2.0 + 1.4 * 1.8 / 2.0;
        assert!((eg - 1.0 / inv).abs() < 1e-10);

        let eigen = array![[[-1.0, 1.0]]];
        let pwav = Array5::<f64>::zeros((1, 1, 2, 1, 1));
        let bs = BandStructure::builder(eigen)
            .occ(array![[[1.0, 0.0]]])
            .projection(pwav, None, None)
            .build()
            .unwrap();
        assert!(bs.effective_gap(None, None, &all, &all).unwrap().is_infinite());

        let noproj = uniform_gap(1, 1, 2, 1.0);
        assert!(noproj.effective_gap(None, None, &all, &all).is_err());
    }

    #[test]
    fn test_transition_and_fund_trans() {
        // 间接带隙：VBM 在 k0，CBM 在 k2
        let eigen = array![[[-1.0, 0.0, 2.0], [-1.2, -0.3, 1.5], [-1.5, -0.6, 1.0]]];
        let occ = Array3::from_shape_fn((1, 3, 3), |(_, _, ib)| if ib < 2 { 1.0 } else { 0.0 });
        let bs = BandStructure::builder(eigen).occ(occ).build().unwrap();
        assert_eq!(bs.fund_trans().unwrap(), vec![(0, 2)]);
        assert_eq!(bs.fund_trans_global().unwrap(), ((0, 0), (0, 2)));
        assert!(!bs.is_gap_direct().unwrap());
        assert!((bs.direct_gap_vbm().unwrap() - 2.0).abs() < 1e-12);
        assert!((bs.direct_gap_cbm().unwrap() - 1.6).abs() < 1e-12);

        let t = bs.get_transition(None, None, None, None, 0).unwrap();
        assert_eq!((t.ivk, t.ick, t.ivb, t.icb), (0, 2, 1, 2));
        assert!((t.energy - 1.0).abs() < 1e-12);

        let t = bs
            .get_transition(Some(1), Some(1), Some(BandIdentifier::Vbm(-1)), None, 0)
            .unwrap();
        assert!((t.energy - 2.7).abs() < 1e-12);
        assert!(bs.get_transition(Some(3), None, None, None, 0).is_err());
        assert!(bs.get_transition(None, None, None, None, 1).is_err());
    }

    #[test]
    fn test_scissor_shift_prune() {
        let bs = uniform_gap(1, 2, 4, 1.0);
        let sc = bs.apply_scissor(0.5, false).unwrap();
        assert!((sc.fund_gap().unwrap() - 1.5).abs() < 1e-10);
        assert!(bs.apply_scissor(-2.0, false).is_err());

        let shifted = bs.shifted(0.25).unwrap();
        assert!((shifted.vbm().unwrap() - bs.vbm().unwrap() - 0.25).abs() < 1e-12);

        let diff = shifted.difference(&bs).unwrap();
        assert!(diff.eigen().iter().all(|x| (x - 0.25).abs() < 1e-12));

        let mut pruned = bs.clone();
        pruned.prune_bands(1, 1).unwrap();
        assert_eq!(pruned.nbands(), 2);
        assert_eq!(pruned.ivbm().unwrap().2, 0);
        assert!((pruned.fund_gap().unwrap() - 1.0).abs() < 1e-10);
        assert!(pruned.prune_bands(1, 1).is_err());
    }

    #[test]
    fn test_band_width() {
        let eigen = array![[[-1.0, 1.0], [-0.98, 1.3], [-0.99, 1.1]]];
        let bs = BandStructure::builder(eigen).build().unwrap();
        let w = bs.band_width();
        assert_eq!(w.shape(), &[1, 2, 2]);
        assert!((w[[0, 0, 1]] - w[[0, 0, 0]] - 0.02).abs() < 1e-12);
        assert!((w[[0, 1, 0]] - 1.0).abs() < 1e-12);
        assert!((w[[0, 1, 1]] - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_dos_normalization() {
        let bs = uniform_gap(1, 2, 4, 1.0);
        let dos = bs
            .get_dos(&DosOptions {
                nedos: 4000,
                sigma: 0.05,
                ..DosOptions::default()
            })
            .unwrap();
        let de = dos.egrid()[1] - dos.egrid()[0];
        let integral: f64 = dos.tdos().row(0).sum() * de;
        assert!((integral - 4.0).abs() < 1e-3);

        let pbs = with_proj();
        let pdos = pbs.get_dos(&DosOptions::default()).unwrap();
        assert!(pdos.has_pdos());
        let summed = pdos.get_pdos(None, &Selector::All, &Selector::All).unwrap();
        // 投影系数之和不为 1，pdos 与 tdos 不必相等，但必须非负
        assert!(summed.iter().all(|&x| x >= 0.0));
    }
}
