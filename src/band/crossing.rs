//! # 能带交叉消解
//!
//! 本征值求解器在每个 k 点按能量排序输出，能带在路径上真正交叉时会被错误地"弹开"。
//! 这里用交叉点两侧的单侧差商判断是否应当交换两条能带在该点之后的取值。
//!
//! 判据：在内点 `i`，取左侧最近的不同 k 点 `l` 与右侧最近的不同 k 点 `r`，
//! - 带内失配 `|R_A - L_A| + |R_B - L_B|`
//! - 交叉失配 `|R_AB - L_A| + |R_BA - L_B|`，其中 `R_AB = (B[r] - A[r-1]) / (kx[r] - kx[i])`
//!
//! 当带内失配不小于交叉失配加阈值时，交换 `i` 之后的全部取值。
//!
//! 多带时按 `(a, b)` 字典序逐对检查，每次交换后从头重新扫描该点，单点最多交换 `m²` 次。
//!
//! ## 依赖关系
//! - 被 `commands/resolve.rs` 使用
//! - 使用 `ndarray` 处理 `[nk, nbands, ...]` 数组

use crate::error::{MushroomError, Result};

use log::{debug, info, warn};
use ndarray::{Array2, ArrayBase, ArrayView1, ArrayViewMut1, Axis, DataMut, Dimension};

/// 默认导数阈值
pub const DEFAULT_DERIV_THRES: f64 = 5.0;

/// 某一采样点的左右差商，路径端点处缺失的一侧为 `None`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative {
    pub left: Option<f64>,
    pub right: Option<f64>,
}

/// 一次交换：`index` 之后（不含）的 `bands.0` 与 `bands.1` 互换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSwap {
    pub index: usize,
    pub bands: (usize, usize),
}

fn validate_kx(kx: &[f64], deriv_thres: f64) -> Result<()> {
    if kx.windows(2).any(|w| w[1] < w[0]) {
        return Err(MushroomError::InvalidArgument(
            "kx must be non-decreasing along the path".to_string(),
        ));
    }
    if !(deriv_thres > 0.0 && deriv_thres.is_finite()) {
        return Err(MushroomError::InvalidArgument(format!(
            "derivative threshold must be positive, got {}",
            deriv_thres
        )));
    }
    Ok(())
}

/// 左侧最后一个与 `kx[i]` 不同的点
fn left_neighbour(kx: &[f64], i: usize) -> Option<usize> {
    (0..i).rev().find(|&j| kx[j] != kx[i])
}

/// 右侧第一个与 `kx[i]` 不同的点
fn right_neighbour(kx: &[f64], i: usize) -> Option<usize> {
    (i + 1..kx.len()).find(|&j| kx[j] != kx[i])
}

/// 需要检查交叉的内点及其左右相邻点
///
/// 与下一点 k 相同的点（路径拼接处）不作为交叉点。
fn scan_points(kx: &[f64]) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    let nk = kx.len();
    (1..nk.saturating_sub(1)).filter_map(move |i| {
        if kx[i + 1] == kx[i] {
            debug!("k-point {} repeated, skip crossing check", i);
            return None;
        }
        Some((i, left_neighbour(kx, i)?, right_neighbour(kx, i)?))
    })
}

/// 每个采样点的左右差商
///
/// 重复的 k 点在选取相邻点时被跳过。
pub fn left_right_derivative_band(kx: &[f64], band: &[f64]) -> Result<Vec<Derivative>> {
    if kx.len() != band.len() {
        return Err(MushroomError::InvalidArgument(format!(
            "inconsistent lengths of kx and band: {} vs {}",
            kx.len(),
            band.len()
        )));
    }
    let derivs = (0..kx.len())
        .map(|i| Derivative {
            left: left_neighbour(kx, i).map(|l| (band[l + 1] - band[l]) / (kx[i] - kx[l])),
            right: right_neighbour(kx, i).map(|r| (band[r] - band[r - 1]) / (kx[r] - kx[i])),
        })
        .collect();
    Ok(derivs)
}

/// 点 `i` 处 a、b 两带的 `(带内失配, 交叉失配)`
fn mismatch(
    kx: &[f64],
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
    (i, l, r): (usize, usize, usize),
) -> (f64, f64) {
    let dl = kx[i] - kx[l];
    let dr = kx[r] - kx[i];

    let la = (a[l + 1] - a[l]) / dl;
    let lb = (b[l + 1] - b[l]) / dl;
    let ra = (a[r] - a[r - 1]) / dr;
    let rb = (b[r] - b[r - 1]) / dr;
    let rab = (b[r] - a[r - 1]) / dr;
    let rba = (a[r] - b[r - 1]) / dr;

    let in_band = (ra - la).abs() + (rb - lb).abs();
    let cross = (rab - la).abs() + (rba - lb).abs();
    (in_band, cross)
}

fn swap_tail(mut a: ArrayViewMut1<f64>, mut b: ArrayViewMut1<f64>, from: usize) {
    for k in from..a.len() {
        std::mem::swap(&mut a[k], &mut b[k]);
    }
}

/// 消解两条能带间的交叉，原地修改，返回发生交换的采样点
pub fn resolve_band_crossing_2band(
    kx: &[f64],
    band1: &mut [f64],
    band2: &mut [f64],
    deriv_thres: f64,
) -> Result<Vec<usize>> {
    if kx.len() != band1.len() || kx.len() != band2.len() {
        return Err(MushroomError::InvalidArgument(format!(
            "inconsistent lengths: kx {}, band1 {}, band2 {}",
            kx.len(),
            band1.len(),
            band2.len()
        )));
    }
    validate_kx(kx, deriv_thres)?;

    let mut crossings = Vec::new();
    for point in scan_points(kx) {
        let (in_band, cross) = mismatch(
            kx,
            ArrayView1::from(&band1[..]),
            ArrayView1::from(&band2[..]),
            point,
        );
        if in_band < cross + deriv_thres {
            continue;
        }
        let i = point.0;
        info!(
            "deriv. diff: inband {:.4} >= crossband {:.4} + {}, crossing at {}",
            in_band, cross, deriv_thres, i
        );
        swap_tail(
            ArrayViewMut1::from(&mut band1[..]),
            ArrayViewMut1::from(&mut band2[..]),
            i + 1,
        );
        crossings.push(i);
    }
    Ok(crossings)
}

/// 消解多条能带间的交叉
///
/// `bands` 形状为 `[nk, nbands]`，原地修改。返回的交换记录可用
/// [`apply_swaps`] 作用到占据数、投影等伴随数据上。
pub fn resolve_band_crossing(
    kx: &[f64],
    bands: &mut Array2<f64>,
    deriv_thres: f64,
) -> Result<Vec<BandSwap>> {
    let (nk, nbands) = bands.dim();
    if nk != kx.len() {
        return Err(MushroomError::InvalidArgument(format!(
            "inconsistent shape of bands and kx: {:?} vs ({},)",
            bands.shape(),
            kx.len()
        )));
    }
    if nbands < 2 {
        return Err(MushroomError::InvalidArgument(format!(
            "at least 2 bands are needed to resolve crossing, got {}",
            nbands
        )));
    }
    validate_kx(kx, deriv_thres)?;

    let max_swaps = nbands * nbands;
    let mut swaps = Vec::new();
    for point in scan_points(kx) {
        let i = point.0;
        let mut nswaps = 0;
        'rescan: loop {
            for a in 0..nbands {
                for b in a + 1..nbands {
                    let (in_band, cross) =
                        mismatch(kx, bands.column(a), bands.column(b), point);
                    if in_band < cross + deriv_thres {
                        continue;
                    }
                    info!(
                        "deriv. diff: inband {:.4} >= crossband {:.4} + {}, crossing of bands ({}, {}) at {}",
                        in_band, cross, deriv_thres, a, b, i
                    );
                    let (col_a, col_b) = bands.multi_slice_mut((
                        ndarray::s![.., a],
                        ndarray::s![.., b],
                    ));
                    swap_tail(col_a, col_b, i + 1);
                    swaps.push(BandSwap {
                        index: i,
                        bands: (a, b),
                    });
                    nswaps += 1;
                    if nswaps >= max_swaps {
                        warn!(
                            "reached {} swaps at k-point {}, stop resolving this point",
                            max_swaps, i
                        );
                        break 'rescan;
                    }
                    continue 'rescan;
                }
            }
            break;
        }
    }
    debug!("multi-band resolve done, {} swaps", swaps.len());
    Ok(swaps)
}

/// 把交换记录重放到伴随数据上，数据的前两维为 `[nk, nbands]`
pub fn apply_swaps<A, S, D>(values: &mut ArrayBase<S, D>, swaps: &[BandSwap]) -> Result<()>
where
    A: Clone,
    S: DataMut<Elem = A>,
    D: Dimension,
{
    if values.ndim() < 2 {
        return Err(MushroomError::InvalidArgument(format!(
            "companion data must be at least 2-dim (nk, nbands, ...), got {:?}",
            values.shape()
        )));
    }
    let nk = values.shape()[0];
    let nbands = values.shape()[1];
    let mut view = values.view_mut().into_dyn();
    for sw in swaps {
        let (a, b) = sw.bands;
        if a >= nbands || b >= nbands {
            return Err(MushroomError::out_of_range(
                "band",
                a.max(b) as i64,
                nbands,
            ));
        }
        for ik in sw.index + 1..nk {
            let mut row = view.index_axis_mut(Axis(0), ik);
            let va = row.index_axis(Axis(0), a).to_owned();
            let vb = row.index_axis(Axis(0), b).to_owned();
            row.index_axis_mut(Axis(0), a).assign(&vb);
            row.index_axis_mut(Axis(0), b).assign(&va);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn kpath() -> Vec<f64> {
        (0..12).map(|i| 0.1 * i as f64).collect()
    }

    /// 两条直线在 0.4 与 0.5 之间交叉，求解器按能量排序后输出的结果
    fn sorted_crossing() -> (Vec<f64>, Vec<f64>) {
        let band1 = vec![9.0, 7.0, 5.0, 3.0, 1.0, 1.0, 3.0, 5.0, 7.0, 9.0, 11.0, 13.0];
        let band2: Vec<f64> = band1.iter().map(|x| -x).collect();
        (band1, band2)
    }

    #[test]
    fn test_derivative_endpoints() {
        let kx = kpath();
        let (band1, _) = sorted_crossing();
        let d = left_right_derivative_band(&kx, &band1).unwrap();
        assert!(d[0].left.is_none());
        assert!(d[11].right.is_none());
        assert!((d[1].left.unwrap() + 20.0).abs() < 1e-8);
        assert!((d[5].right.unwrap() - 20.0).abs() < 1e-8);
        assert!(left_right_derivative_band(&kx, &band1[..5]).is_err());
    }

    #[test]
    fn test_derivative_skips_repeated_kpoint() {
        let kx = vec![0.0, 0.5, 0.5, 1.0];
        let band = vec![0.0, 1.0, 1.0, 3.0];
        let d = left_right_derivative_band(&kx, &band).unwrap();
        // 点 1 的右侧邻点为 3，差商 (3 - 1) / 0.5
        assert!((d[1].right.unwrap() - 4.0).abs() < 1e-10);
        // 点 2 的左侧邻点为 0，差商 (1 - 0) / 0.5
        assert!((d[2].left.unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_resolve_2band() {
        let kx = kpath();
        let (mut band1, mut band2) = sorted_crossing();
        let crossings =
            resolve_band_crossing_2band(&kx, &mut band1, &mut band2, DEFAULT_DERIV_THRES).unwrap();
        assert_eq!(crossings, vec![4]);
        for (i, k) in kx.iter().enumerate() {
            assert!((band1[i] - (9.0 - 20.0 * k)).abs() < 1e-8);
            assert!((band2[i] - (-9.0 + 20.0 * k)).abs() < 1e-8);
        }
    }

    #[test]
    fn test_no_crossing_unchanged() {
        let kx = kpath();
        let mut band1: Vec<f64> = kx.iter().map(|k| 1.0 + k * k).collect();
        let mut band2: Vec<f64> = kx.iter().map(|k| -1.0 - 2.0 * k).collect();
        let (orig1, orig2) = (band1.clone(), band2.clone());
        let crossings =
            resolve_band_crossing_2band(&kx, &mut band1, &mut band2, DEFAULT_DERIV_THRES).unwrap();
        assert!(crossings.is_empty());
        assert_eq!(band1, orig1);
        assert_eq!(band2, orig2);
    }

    #[test]
    fn test_resolve_multiband_with_spectator() {
        let kx = kpath();
        let (band1, band2) = sorted_crossing();
        let mut bands = Array2::<f64>::zeros((12, 3));
        for i in 0..12 {
            bands[[i, 0]] = band2[i];
            bands[[i, 1]] = band1[i];
            bands[[i, 2]] = 30.0 + kx[i];
        }
        let swaps = resolve_band_crossing(&kx, &mut bands, DEFAULT_DERIV_THRES).unwrap();
        assert_eq!(
            swaps,
            vec![BandSwap {
                index: 4,
                bands: (0, 1)
            }]
        );
        for (i, k) in kx.iter().enumerate() {
            assert!((bands[[i, 0]] - (-9.0 + 20.0 * k)).abs() < 1e-8);
            assert!((bands[[i, 1]] - (9.0 - 20.0 * k)).abs() < 1e-8);
            assert!((bands[[i, 2]] - (30.0 + k)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_triple_crossing_terminates() {
        // 三条直线交于同一点附近
        let kx = kpath();
        let slopes = [-20.0, 0.0, 20.0];
        let mut bands = Array2::<f64>::zeros((12, 3));
        for (i, k) in kx.iter().enumerate() {
            let mut e: Vec<f64> = slopes.iter().map(|s| s * (k - 0.45)).collect();
            e.sort_by(|a, b| a.total_cmp(b));
            for (ib, v) in e.into_iter().enumerate() {
                bands[[i, ib]] = v;
            }
        }
        let swaps = resolve_band_crossing(&kx, &mut bands, DEFAULT_DERIV_THRES).unwrap();
        assert!(!swaps.is_empty());
        assert!(swaps.len() <= 9 * kx.len());
        // 交换后每条带在两端的斜率一致
        for ib in 0..3 {
            let col = bands.column(ib);
            let head = (col[1] - col[0]) / 0.1;
            let tail = (col[11] - col[10]) / 0.1;
            assert!((head - tail).abs() < 1e-6);
        }
    }

    #[test]
    fn test_apply_swaps_to_companions() {
        let swaps = vec![BandSwap {
            index: 1,
            bands: (0, 1),
        }];
        let mut occ = Array2::from_shape_fn((4, 2), |(_, ib)| ib as f64);
        apply_swaps(&mut occ, &swaps).unwrap();
        assert_eq!(occ.column(0).to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(occ.column(1).to_vec(), vec![1.0, 1.0, 0.0, 0.0]);

        let mut pwav = Array3::from_shape_fn((4, 2, 2), |(_, ib, ip)| (10 * ib + ip) as f64);
        apply_swaps(&mut pwav, &swaps).unwrap();
        assert_eq!(pwav[[3, 0, 1]], 11.0);
        assert_eq!(pwav[[1, 0, 1]], 1.0);

        let mut flat = Array1::<f64>::zeros(4);
        assert!(apply_swaps(&mut flat, &swaps).is_err());
        let bad = vec![BandSwap {
            index: 0,
            bands: (0, 5),
        }];
        assert!(apply_swaps(&mut occ, &bad).is_err());
    }

    #[test]
    fn test_invalid_input() {
        let kx = vec![0.0, 0.2, 0.1];
        let mut b1 = vec![0.0; 3];
        let mut b2 = vec![1.0; 3];
        assert!(resolve_band_crossing_2band(&kx, &mut b1, &mut b2, 5.0).is_err());
        let kx = vec![0.0, 0.1, 0.2];
        assert!(resolve_band_crossing_2band(&kx, &mut b1, &mut b2, 0.0).is_err());
        let mut one = Array2::<f64>::zeros((3, 1));
        assert!(resolve_band_crossing(&kx, &mut one, 5.0).is_err());
    }
}
