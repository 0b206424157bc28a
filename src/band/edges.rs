//! # 能带边
//!
//! 根据本征值与占据数确定每个自旋 × k 点通道的价带顶 (VBM) 与导带底 (CBM)，
//! 再归约到每个自旋与全局。
//!
//! 两种定位方式：
//! - [`EdgeMethod::Occupation`]：数占据数超过 `1 - ε` 的能带，VB 索引为数目减一
//! - [`EdgeMethod::Eigenvalue`]：在已占据能带中找能量最高者、在未占据能带中找能量最低者，
//!   简并时 VB 取较大索引、CB 取较小索引，适用于占据最高的能带不是能量最高的情形
//!
//! 两种方式的金属判据相同：各通道的价带索引不一致即为金属。
//!
//! ## 依赖关系
//! - 被 `band/structure.rs` 使用
//! - 使用 `ndarray`, `log`

use log::{debug, warn};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

/// 占据判据阈值：occ > 1 - THRES_OCC 视为占据
pub const THRES_OCC: f64 = 1.0e-3;
/// 简并判据阈值 (eV)
pub const THRES_DEGENERATE: f64 = 5.0e-4;

/// 能带边定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMethod {
    /// 只按占据能带数目定位
    Occupation,
    /// 按本征值在占据 / 未占据能带中搜索
    #[default]
    Eigenvalue,
}

/// 能带边计算参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeOptions {
    pub method: EdgeMethod,
    /// 占据判据 ε
    pub occ_threshold: f64,
    /// 简并判据，以当前能量单位表示
    pub degenerate_threshold: f64,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            method: EdgeMethod::default(),
            occ_threshold: THRES_OCC,
            degenerate_threshold: THRES_DEGENERATE,
        }
    }
}

/// 能带边及其索引
///
/// `ivbm_sp` / `icbm_sp` 为 `(ikpt, iband)`，`ivbm` / `icbm` 为 `(ispin, ikpt, iband)`。
#[derive(Debug, Clone, PartialEq)]
pub struct BandEdges {
    pub ivbm_sp_kp: Array2<usize>,
    pub icbm_sp_kp: Array2<usize>,
    pub vbm_sp_kp: Array2<f64>,
    pub cbm_sp_kp: Array2<f64>,
    pub ivbm_sp: Vec<(usize, usize)>,
    pub icbm_sp: Vec<(usize, usize)>,
    pub vbm_sp: Array1<f64>,
    pub cbm_sp: Array1<f64>,
    pub ivbm: (usize, usize, usize),
    pub icbm: (usize, usize, usize),
    pub vbm: f64,
    pub cbm: f64,
    pub is_metal: bool,
    /// 至少一个通道因能带数不足而把 CBM 设为 +∞
    pub has_infty_cbm: bool,
}

impl BandEdges {
    /// 按给定方式计算能带边
    pub fn compute(eigen: &Array3<f64>, occ: &Array3<f64>, options: &EdgeOptions) -> Self {
        match options.method {
            EdgeMethod::Occupation => Self::by_occupation(eigen, occ, options.occ_threshold),
            EdgeMethod::Eigenvalue => Self::by_eigenvalue(
                eigen,
                occ,
                options.occ_threshold,
                options.degenerate_threshold,
            ),
        }
    }

    /// 按占据能带数目定位
    pub fn by_occupation(eigen: &Array3<f64>, occ: &Array3<f64>, occ_threshold: f64) -> Self {
        let (nspins, nkpts, nbands) = eigen.dim();
        let mut nocc = Array2::<usize>::zeros((nspins, nkpts));
        let mut ivbm_sp_kp = Array2::<usize>::zeros((nspins, nkpts));
        let mut icbm_sp_kp = Array2::<usize>::zeros((nspins, nkpts));
        let mut vbm_sp_kp = Array2::<f64>::zeros((nspins, nkpts));
        let mut cbm_sp_kp = Array2::<f64>::zeros((nspins, nkpts));
        let mut has_infty_cbm = false;

        for is in 0..nspins {
            for ik in 0..nkpts {
                let n = (0..nbands)
                    .filter(|&ib| occ[[is, ik, ib]] > 1.0 - occ_threshold)
                    .count();
                nocc[[is, ik]] = n;

                if n == 0 {
                    // 该通道没有占据能带
                    vbm_sp_kp[[is, ik]] = f64::NEG_INFINITY;
                    cbm_sp_kp[[is, ik]] = eigen[[is, ik, 0]];
                    continue;
                }

                let vb = n - 1;
                ivbm_sp_kp[[is, ik]] = vb;
                vbm_sp_kp[[is, ik]] = eigen[[is, ik, vb]];
                if vb == nbands - 1 {
                    has_infty_cbm = true;
                    warn!(
                        "VBM index for spin-kpt channel ({},{}) equals nbands. CBM for this channel set to infinity",
                        is + 1,
                        ik + 1
                    );
                    icbm_sp_kp[[is, ik]] = nbands - 1;
                    cbm_sp_kp[[is, ik]] = f64::INFINITY;
                } else {
                    icbm_sp_kp[[is, ik]] = vb + 1;
                    cbm_sp_kp[[is, ik]] = eigen[[is, ik, vb + 1]];
                }
            }
            debug!("HOMO index of spin {}: {:?}", is + 1, ivbm_sp_kp.row(is).to_vec());
        }
        if has_infty_cbm {
            warn!("nbands {} is too small to get CB", nbands);
        }

        let is_metal = is_non_uniform(nocc.iter().copied());
        Self::reduce(
            ivbm_sp_kp,
            icbm_sp_kp,
            vbm_sp_kp,
            cbm_sp_kp,
            is_metal,
            has_infty_cbm,
        )
    }

    /// 按本征值定位
    pub fn by_eigenvalue(
        eigen: &Array3<f64>,
        occ: &Array3<f64>,
        occ_threshold: f64,
        degenerate_threshold: f64,
    ) -> Self {
        let (nspins, nkpts, nbands) = eigen.dim();
        let mut ivbm_sp_kp = Array2::<usize>::zeros((nspins, nkpts));
        let mut icbm_sp_kp = Array2::<usize>::zeros((nspins, nkpts));
        let mut vbm_sp_kp = Array2::<f64>::from_elem((nspins, nkpts), f64::NEG_INFINITY);
        let mut cbm_sp_kp = Array2::<f64>::from_elem((nspins, nkpts), f64::INFINITY);
        let mut has_infty_cbm = false;

        for is in 0..nspins {
            for ik in 0..nkpts {
                let mut found_cb = false;
                for ib in 0..nbands {
                    let e = eigen[[is, ik, ib]];
                    let vbm = vbm_sp_kp[[is, ik]];
                    if occ[[is, ik, ib]] > 1.0 - occ_threshold
                        && (e > vbm || (e - vbm).abs() < degenerate_threshold)
                    {
                        vbm_sp_kp[[is, ik]] = e;
                        ivbm_sp_kp[[is, ik]] = ib;
                    }
                }
                for ib in (0..nbands).rev() {
                    let e = eigen[[is, ik, ib]];
                    let cbm = cbm_sp_kp[[is, ik]];
                    if occ[[is, ik, ib]] <= 1.0 - occ_threshold
                        && (e < cbm || (e - cbm).abs() < degenerate_threshold)
                    {
                        cbm_sp_kp[[is, ik]] = e;
                        icbm_sp_kp[[is, ik]] = ib;
                        found_cb = true;
                    }
                }
                if !found_cb {
                    has_infty_cbm = true;
                    icbm_sp_kp[[is, ik]] = nbands - 1;
                    warn!(
                        "no empty band in spin-kpt channel ({},{}). CBM for this channel set to infinity",
                        is + 1,
                        ik + 1
                    );
                }
            }
            debug!("VBM of spin {}: {:?}", is + 1, ivbm_sp_kp.row(is).to_vec());
            debug!("CBM of spin {}: {:?}", is + 1, icbm_sp_kp.row(is).to_vec());
        }

        let is_metal = is_non_uniform(ivbm_sp_kp.iter().copied());
        Self::reduce(
            ivbm_sp_kp,
            icbm_sp_kp,
            vbm_sp_kp,
            cbm_sp_kp,
            is_metal,
            has_infty_cbm,
        )
    }

    /// 自旋与全局归约：VBM 取 k 上最大值，CBM 取 k 上最小值，并列时取第一个
    fn reduce(
        ivbm_sp_kp: Array2<usize>,
        icbm_sp_kp: Array2<usize>,
        vbm_sp_kp: Array2<f64>,
        cbm_sp_kp: Array2<f64>,
        is_metal: bool,
        has_infty_cbm: bool,
    ) -> Self {
        let (nspins, nkpts) = vbm_sp_kp.dim();
        let mut ivbm_sp = Vec::with_capacity(nspins);
        let mut icbm_sp = Vec::with_capacity(nspins);
        let mut vbm_sp = Array1::<f64>::zeros(nspins);
        let mut cbm_sp = Array1::<f64>::zeros(nspins);

        for is in 0..nspins {
            let mut ikv = 0;
            let mut ikc = 0;
            for ik in 1..nkpts {
                if vbm_sp_kp[[is, ik]] > vbm_sp_kp[[is, ikv]] {
                    ikv = ik;
                }
                if cbm_sp_kp[[is, ik]] < cbm_sp_kp[[is, ikc]] {
                    ikc = ik;
                }
            }
            ivbm_sp.push((ikv, ivbm_sp_kp[[is, ikv]]));
            icbm_sp.push((ikc, icbm_sp_kp[[is, ikc]]));
            vbm_sp[is] = vbm_sp_kp[[is, ikv]];
            cbm_sp[is] = cbm_sp_kp[[is, ikc]];
        }

        let mut isv = 0;
        let mut isc = 0;
        for is in 1..nspins {
            if vbm_sp[is] > vbm_sp[isv] {
                isv = is;
            }
            if cbm_sp[is] < cbm_sp[isc] {
                isc = is;
            }
        }
        let ivbm = (isv, ivbm_sp[isv].0, ivbm_sp[isv].1);
        let icbm = (isc, icbm_sp[isc].0, icbm_sp[isc].1);
        debug!("global VBM: {:?} {}", ivbm, vbm_sp[isv]);
        debug!("global CBM: {:?} {}", icbm, cbm_sp[isc]);

        Self {
            vbm: vbm_sp[isv],
            cbm: cbm_sp[isc],
            ivbm_sp_kp,
            icbm_sp_kp,
            vbm_sp_kp,
            cbm_sp_kp,
            ivbm_sp,
            icbm_sp,
            vbm_sp,
            cbm_sp,
            ivbm,
            icbm,
            is_metal,
            has_infty_cbm,
        }
    }

    /// 单位换算时整体缩放能量
    pub(crate) fn scale(&mut self, factor: f64) {
        self.vbm_sp_kp.mapv_inplace(|x| x * factor);
        self.cbm_sp_kp.mapv_inplace(|x| x * factor);
        self.vbm_sp.mapv_inplace(|x| x * factor);
        self.cbm_sp.mapv_inplace(|x| x * factor);
        self.vbm *= factor;
        self.cbm *= factor;
    }
}

fn is_non_uniform(mut it: impl Iterator<Item = usize>) -> bool {
    match it.next() {
        Some(first) => it.any(|x| x != first),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_occupation_semiconductor() {
        let eigen = array![[[-2.0, -1.0, 1.0, 2.0], [-2.5, -0.5, 0.8, 2.2]]];
        let occ = array![[[1.0, 1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0]]];
        let e = BandEdges::by_occupation(&eigen, &occ, THRES_OCC);
        assert!(!e.is_metal);
        assert!(!e.has_infty_cbm);
        assert_eq!(e.ivbm, (0, 1, 1));
        assert_eq!(e.icbm, (0, 1, 2));
        assert!((e.vbm + 0.5).abs() < 1e-12);
        assert!((e.cbm - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_occupation_metal_and_infinite_cbm() {
        let eigen = array![[[-1.0, 0.5], [-1.0, 0.2]]];
        let occ = array![[[1.0, 0.0], [1.0, 1.0]]];
        let e = BandEdges::by_occupation(&eigen, &occ, THRES_OCC);
        assert!(e.is_metal);
        assert!(e.has_infty_cbm);
        assert_eq!(e.icbm_sp_kp[[0, 1]], 1);
        assert!(e.cbm_sp_kp[[0, 1]].is_infinite());
    }

    #[test]
    fn test_eigenvalue_picks_true_maximum() {
        // 第 1 条占据能带能量高于第 2 条
        let eigen = array![[[-1.0, 0.3, -0.2, 1.0]]];
        let occ = array![[[1.0, 1.0, 1.0, 0.0]]];
        let by_occ = BandEdges::by_occupation(&eigen, &occ, THRES_OCC);
        assert_eq!(by_occ.ivbm.2, 2);
        let by_eig = BandEdges::by_eigenvalue(&eigen, &occ, THRES_OCC, THRES_DEGENERATE);
        assert_eq!(by_eig.ivbm.2, 1);
        assert!((by_eig.vbm - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_eigenvalue_degenerate_indices() {
        let eigen = array![[[-1.0, 0.0, 0.0, 1.0, 1.0]]];
        let occ = array![[[1.0, 1.0, 1.0, 0.0, 0.0]]];
        let e = BandEdges::by_eigenvalue(&eigen, &occ, THRES_OCC, THRES_DEGENERATE);
        assert_eq!(e.ivbm.2, 2);
        assert_eq!(e.icbm.2, 3);
    }

    #[test]
    fn test_spin_reduction() {
        let eigen = array![[[-1.0, 1.0], [-0.8, 1.2]], [[-0.5, 0.9], [-0.7, 0.7]]];
        let occ = array![[[1.0, 0.0], [1.0, 0.0]], [[1.0, 0.0], [1.0, 0.0]]];
        let e = BandEdges::by_occupation(&eigen, &occ, THRES_OCC);
        assert_eq!(e.ivbm_sp, vec![(1, 0), (0, 0)]);
        assert_eq!(e.icbm_sp, vec![(0, 1), (1, 1)]);
        assert_eq!(e.ivbm, (1, 0, 0));
        assert_eq!(e.icbm, (1, 1, 1));
        assert!((e.cbm - e.vbm - 1.2).abs() < 1e-12);
    }
}
