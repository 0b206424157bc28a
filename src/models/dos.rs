//! # 态密度数据模型
//!
//! 能量网格 `egrid [nedos]`、总态密度 `tdos [nspins, nedos]` 与可选的投影态密度
//! `pdos [nspins, nedos, natms, nprjs]`。原子 / 投影子选择与能带结构共用 [`Selector`]。
//!
//! ## 依赖关系
//! - 被 `band/structure.rs` (展宽生成) 与 `commands/dos.rs` 使用
//! - 使用 `band/selector.rs` 解析原子与投影子

use crate::band::selector::{resolve_labels, Selector};
use crate::error::{MushroomError, Result};
use crate::models::unit::EnergyUnit;

use log::debug;
use ndarray::{s, Array1, Array2, Array4, Axis};

/// 总态密度的自旋通道选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpinChannel {
    /// 所有通道
    #[default]
    All,
    /// 所有通道，自旋向下取负，便于作图
    AllReversed,
    /// 单个通道
    Index(usize),
    /// 各通道之和
    Sum,
}

/// 态密度
#[derive(Debug, Clone)]
pub struct DensityOfStates {
    egrid: Array1<f64>,
    tdos: Array2<f64>,
    efermi: f64,
    unit: EnergyUnit,
    pdos: Option<Array4<f64>>,
    atms: Option<Vec<String>>,
    prjs: Option<Vec<String>>,
}

impl DensityOfStates {
    /// 构造并校验形状。未给定费米能时取 0
    pub fn new(
        egrid: Array1<f64>,
        tdos: Array2<f64>,
        efermi: Option<f64>,
        unit: EnergyUnit,
    ) -> Result<Self> {
        let (nspins, nedos) = tdos.dim();
        if nedos != egrid.len() || !(nspins == 1 || nspins == 2) {
            return Err(MushroomError::Dos(format!(
                "Inconsistent shape, egrid {:?} vs tdos {:?}",
                egrid.shape(),
                tdos.shape()
            )));
        }
        Ok(Self {
            egrid,
            tdos,
            efermi: efermi.unwrap_or(0.0),
            unit,
            pdos: None,
            atms: None,
            prjs: None,
        })
    }

    /// 附加投影态密度
    pub fn set_pdos(
        &mut self,
        pdos: Array4<f64>,
        atms: Option<Vec<String>>,
        prjs: Option<Vec<String>>,
    ) -> Result<()> {
        let (ns, ne, natms, nprjs) = pdos.dim();
        if (ns, ne) != self.tdos.dim() {
            return Err(MushroomError::Dos(format!("bad pdos shape: {:?}", pdos.shape())));
        }
        if atms.as_ref().is_some_and(|a| a.len() != natms) {
            return Err(MushroomError::Dos(format!(
                "inconsistent atms input {:?}",
                atms
            )));
        }
        if prjs.as_ref().is_some_and(|p| p.len() != nprjs) {
            return Err(MushroomError::Dos(format!(
                "inconsistent prjs input {:?}",
                prjs
            )));
        }
        self.pdos = Some(pdos);
        self.atms = atms;
        self.prjs = prjs;
        Ok(())
    }

    pub fn nspins(&self) -> usize {
        self.tdos.nrows()
    }

    pub fn nedos(&self) -> usize {
        self.egrid.len()
    }

    pub fn egrid(&self) -> &Array1<f64> {
        &self.egrid
    }

    pub fn tdos(&self) -> &Array2<f64> {
        &self.tdos
    }

    pub fn efermi(&self) -> f64 {
        self.efermi
    }

    pub fn unit(&self) -> EnergyUnit {
        self.unit
    }

    pub fn has_pdos(&self) -> bool {
        self.pdos.is_some()
    }

    pub fn atms(&self) -> Option<&[String]> {
        self.atms.as_deref()
    }

    pub fn prjs(&self) -> Option<&[String]> {
        self.prjs.as_deref()
    }

    /// 切换能量单位。态密度按 1/能量 缩放，积分不变
    pub fn set_unit(&mut self, unit: EnergyUnit) {
        if unit == self.unit {
            return;
        }
        let factor = EnergyUnit::factor(self.unit, unit);
        self.egrid.mapv_inplace(|x| x * factor);
        self.efermi *= factor;
        self.tdos.mapv_inplace(|x| x / factor);
        if let Some(p) = self.pdos.as_mut() {
            p.mapv_inplace(|x| x / factor);
        }
        self.unit = unit;
    }

    /// 总态密度，每行一个通道
    pub fn get_tdos(&self, spin: SpinChannel) -> Result<Array2<f64>> {
        match spin {
            SpinChannel::All => Ok(self.tdos.clone()),
            SpinChannel::AllReversed => {
                let mut t = self.tdos.clone();
                if self.nspins() == 2 {
                    t.row_mut(1).mapv_inplace(|x| -x);
                }
                Ok(t)
            }
            SpinChannel::Index(i) if i < self.nspins() => {
                Ok(self.tdos.slice(s![i..i + 1, ..]).to_owned())
            }
            SpinChannel::Index(i) => Err(MushroomError::out_of_range(
                "spin",
                i as i64,
                self.nspins(),
            )),
            SpinChannel::Sum => Ok(self.tdos.sum_axis(Axis(0)).insert_axis(Axis(0))),
        }
    }

    /// 对选定原子与投影子求和的投影态密度
    ///
    /// `ispin` 为 `None` 时对自旋求和。
    pub fn get_pdos(
        &self,
        ispin: Option<usize>,
        atm: &Selector,
        prj: &Selector,
    ) -> Result<Array1<f64>> {
        let pdos = self
            .pdos
            .as_ref()
            .ok_or_else(|| MushroomError::MissingData("projected dos is not parsed".to_string()))?;
        let (nspins, nedos, natms, nprjs) = pdos.dim();
        let atm_ids = resolve_labels(atm, self.atms(), natms, "atom")?;
        let prj_ids = resolve_labels(prj, self.prjs(), nprjs, "projector")?;
        debug!("extracting pdos for atms {:?} prjs {:?}", atm_ids, prj_ids);

        let spins: Vec<usize> = match ispin {
            Some(i) if i < nspins => vec![i],
            Some(i) => return Err(MushroomError::out_of_range("spin", i as i64, nspins)),
            None => (0..nspins).collect(),
        };

        let mut out = Array1::<f64>::zeros(nedos);
        for &is in &spins {
            for &ia in &atm_ids {
                for &ip in &prj_ids {
                    out += &pdos.slice(s![is, .., ia, ip]);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_spin() -> DensityOfStates {
        let egrid = array![-1.0, 0.0, 1.0];
        let tdos = array![[1.0, 2.0, 3.0], [0.5, 1.0, 1.5]];
        let mut dos = DensityOfStates::new(egrid, tdos, Some(0.2), EnergyUnit::Ev).unwrap();
        let pdos = Array4::from_shape_fn((2, 3, 2, 2), |(is, ie, ia, ip)| {
            (1 + is + ie + 2 * ia + ip) as f64
        });
        dos.set_pdos(
            pdos,
            Some(vec!["Ga".to_string(), "As".to_string()]),
            Some(vec!["s".to_string(), "p".to_string()]),
        )
        .unwrap();
        dos
    }

    #[test]
    fn test_shape_check() {
        let egrid = array![0.0, 1.0];
        assert!(DensityOfStates::new(egrid.clone(), Array2::zeros((1, 3)), None, EnergyUnit::Ev).is_err());
        assert!(DensityOfStates::new(egrid.clone(), Array2::zeros((3, 2)), None, EnergyUnit::Ev).is_err());
        let mut dos = DensityOfStates::new(egrid, Array2::zeros((1, 2)), None, EnergyUnit::Ev).unwrap();
        assert_eq!(dos.efermi(), 0.0);
        assert!(dos.set_pdos(Array4::zeros((1, 3, 1, 1)), None, None).is_err());
        assert!(dos
            .set_pdos(Array4::zeros((1, 2, 2, 1)), Some(vec!["C".to_string()]), None)
            .is_err());
    }

    #[test]
    fn test_tdos_channels() {
        let dos = two_spin();
        assert_eq!(dos.get_tdos(SpinChannel::All).unwrap().shape(), &[2, 3]);
        let rev = dos.get_tdos(SpinChannel::AllReversed).unwrap();
        assert!((rev[[1, 2]] + 1.5).abs() < 1e-12);
        let sum = dos.get_tdos(SpinChannel::Sum).unwrap();
        assert!((sum[[0, 1]] - 3.0).abs() < 1e-12);
        let dn = dos.get_tdos(SpinChannel::Index(1)).unwrap();
        assert_eq!(dn.row(0).to_vec(), vec![0.5, 1.0, 1.5]);
        assert!(dos.get_tdos(SpinChannel::Index(2)).is_err());
    }

    #[test]
    fn test_pdos_selection() {
        let dos = two_spin();
        // As:p 自旋向上: 1 + 0 + ie + 2 + 1
        let p = dos.get_pdos(Some(0), &Selector::from("As"), &Selector::from("p")).unwrap();
        assert_eq!(p.to_vec(), vec![4.0, 5.0, 6.0]);
        let both = dos.get_pdos(None, &Selector::from("As"), &Selector::from("p")).unwrap();
        assert_eq!(both.to_vec(), vec![9.0, 11.0, 13.0]);
        assert!(dos.get_pdos(None, &Selector::from("In"), &Selector::All).is_err());
        assert!(dos.get_pdos(Some(2), &Selector::All, &Selector::All).is_err());
    }

    #[test]
    fn test_set_unit_keeps_integral() {
        let mut dos = two_spin();
        let before = dos.tdos().row(0).sum() * (dos.egrid()[1] - dos.egrid()[0]);
        dos.set_unit(EnergyUnit::Ry);
        let after = dos.tdos().row(0).sum() * (dos.egrid()[1] - dos.egrid()[0]);
        assert!((before - after).abs() < 1e-10);
        assert!((dos.efermi() - 0.2 * crate::models::unit::EV2RY).abs() < 1e-12);
    }
}
