//! # 选择器与标识符语法
//!
//! 原子、投影子、能带的选择统一用 [`Selector`] 表示，每个领域各有一个解析函数
//! 把选择器转换为具体的索引列表：
//! - 原子 / 投影子：[`resolve_labels`]，标签只能在提供了标签表时使用
//! - 能带：[`BandIdentifier`]，整数索引或 `[vc]bm([+-]\d+)?` 形式的符号标识
//!
//! 另外提供 CLI 使用的复合字符串解析：`"atom:proj:band"` 与 `"atom:proj"`。
//!
//! ## 依赖关系
//! - 被 `band/structure.rs`, `models/dos.rs`, `commands/` 使用
//! - 使用 `regex` 匹配能带标识语法

use crate::error::{MushroomError, Result};

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// 能带符号标识的语法
pub const BAND_IDEN_PATTERN: &str = r"^([vc])bm(?:([+-])(\d+))?$";

/// 原子 / 投影子 / 能带选择器
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// 全部
    #[default]
    All,
    /// 单个索引
    Index(usize),
    /// 标签（元素符号、轨道名或能带符号标识）
    Label(String),
    /// 多个选择器的并集
    List(Vec<Selector>),
}

impl Selector {
    /// 解析逗号分隔的列表，空字符串表示全部
    ///
    /// 能解析为非负整数的记号作为索引，其余作为标签。
    pub fn parse_list(s: &str) -> Selector {
        let tokens: Vec<Selector> = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| match t.parse::<usize>() {
                Ok(i) => Selector::Index(i),
                Err(_) => Selector::Label(t.to_string()),
            })
            .collect();
        match tokens.len() {
            0 => Selector::All,
            1 => tokens.into_iter().next().unwrap_or_default(),
            _ => Selector::List(tokens),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl From<usize> for Selector {
    fn from(i: usize) -> Self {
        Selector::Index(i)
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::Label(s.to_string())
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::Label(s)
    }
}

impl<T: Into<Selector>> From<Vec<T>> for Selector {
    fn from(v: Vec<T>) -> Self {
        Selector::List(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Index(i) => write!(f, "{}", i),
            Selector::Label(s) => write!(f, "{}", s),
            Selector::List(v) => {
                let parts: Vec<String> = v.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// 去重并保持首次出现的顺序
pub(crate) fn dedup_preserve_order(indices: Vec<usize>) -> Vec<usize> {
    let mut seen = Vec::with_capacity(indices.len());
    for i in indices {
        if !seen.contains(&i) {
            seen.push(i);
        }
    }
    seen
}

/// 把原子或投影子选择器解析为索引列表
///
/// `labels` 为 `None` 时拒绝按标签选择；越界索引与未知标签都会报错。
pub fn resolve_labels(
    selector: &Selector,
    labels: Option<&[String]>,
    len: usize,
    kind: &str,
) -> Result<Vec<usize>> {
    let mut out = Vec::new();
    collect_labels(selector, labels, len, kind, &mut out)?;
    Ok(dedup_preserve_order(out))
}

fn collect_labels(
    selector: &Selector,
    labels: Option<&[String]>,
    len: usize,
    kind: &str,
    out: &mut Vec<usize>,
) -> Result<()> {
    match selector {
        Selector::All => out.extend(0..len),
        Selector::Index(i) => {
            if *i >= len {
                return Err(MushroomError::out_of_range(kind, *i as i64, len));
            }
            out.push(*i);
        }
        Selector::Label(name) => {
            let labels = labels.ok_or_else(|| MushroomError::LabelsUnavailable {
                kind: kind.to_string(),
            })?;
            let before = out.len();
            out.extend(
                labels
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| *l == name)
                    .map(|(i, _)| i),
            );
            if out.len() == before {
                return Err(MushroomError::UnknownLabel {
                    kind: kind.to_string(),
                    label: name.clone(),
                });
            }
        }
        Selector::List(items) => {
            for item in items {
                collect_labels(item, labels, len, kind, out)?;
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 能带标识
// ─────────────────────────────────────────────────────────────

/// 编译一次的能带标识正则
fn band_iden_regex() -> Result<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BAND_IDEN_PATTERN).ok())
        .as_ref()
        .ok_or_else(|| MushroomError::Other(format!("invalid pattern '{}'", BAND_IDEN_PATTERN)))
}

/// 能带标识：绝对索引，或相对 VBM / CBM 的偏移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandIdentifier {
    Index(usize),
    Vbm(i64),
    Cbm(i64),
}

impl BandIdentifier {
    /// 是否需要能带边才能解析
    pub fn is_symbolic(&self) -> bool {
        !matches!(self, BandIdentifier::Index(_))
    }

    /// 给定全局 VBM/CBM 所在能带，解析为绝对索引
    pub fn resolve(&self, ivbm: usize, icbm: usize, nbands: usize) -> Result<usize> {
        let out_of_range = |index: i64| MushroomError::IndexOutOfRange {
            kind: format!("band ({})", self),
            index,
            len: nbands,
        };
        let (base, off) = match *self {
            BandIdentifier::Index(i) if i < nbands => return Ok(i),
            BandIdentifier::Index(i) => {
                return Err(out_of_range(i64::try_from(i).unwrap_or(i64::MAX)))
            }
            BandIdentifier::Vbm(off) => (ivbm, off),
            BandIdentifier::Cbm(off) => (icbm, off),
        };
        // 偏移量不小于能带数时必然越界
        if off.unsigned_abs() >= nbands as u64 {
            return Err(out_of_range(off));
        }
        let ib = i64::try_from(base)
            .ok()
            .and_then(|b| b.checked_add(off))
            .ok_or_else(|| out_of_range(off))?;
        if ib < 0 || ib >= nbands as i64 {
            return Err(out_of_range(ib));
        }
        Ok(ib as usize)
    }
}

impl FromStr for BandIdentifier {
    type Err = MushroomError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(i) = s.parse::<usize>() {
            return Ok(BandIdentifier::Index(i));
        }
        let caps = band_iden_regex()?
            .captures(s)
            .ok_or_else(|| MushroomError::invalid_identifier("band", s))?;

        let offset = match (caps.get(2), caps.get(3)) {
            (Some(sign), Some(n)) => {
                let n: i64 = n
                    .as_str()
                    .parse()
                    .map_err(|_| MushroomError::invalid_identifier("band", s))?;
                if sign.as_str() == "-" {
                    -n
                } else {
                    n
                }
            }
            _ => 0,
        };

        match caps.get(1).map(|m| m.as_str()) {
            Some("v") => Ok(BandIdentifier::Vbm(offset)),
            Some("c") => Ok(BandIdentifier::Cbm(offset)),
            _ => Err(MushroomError::invalid_identifier("band", s)),
        }
    }
}

impl fmt::Display for BandIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, off) = match *self {
            BandIdentifier::Index(i) => return write!(f, "{}", i),
            BandIdentifier::Vbm(off) => ("vbm", off),
            BandIdentifier::Cbm(off) => ("cbm", off),
        };
        match off {
            0 => write!(f, "{}", name),
            o if o > 0 => write!(f, "{}+{}", name, o),
            o => write!(f, "{}{}", name, o),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 复合字符串
// ─────────────────────────────────────────────────────────────

fn split_colon_string(s: &str, ncomp: usize, kind: &str) -> Result<Vec<Selector>> {
    if s.chars().any(char::is_whitespace) {
        return Err(MushroomError::InvalidIdentifier {
            kind: format!("{} (whitespace not allowed)", kind),
            token: s.to_string(),
        });
    }
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != ncomp {
        return Err(MushroomError::InvalidIdentifier {
            kind: format!("{} (expect {} colons)", kind, ncomp - 1),
            token: s.to_string(),
        });
    }
    Ok(parts.into_iter().map(Selector::parse_list).collect())
}

/// 拆分 `"atom:projector:band"` 字符串
///
/// 例如 `"Fe:d:vbm"`、`"0,1:px,py:cbm,cbm+1"`。空分量表示全部。
pub fn split_apb(apb: &str) -> Result<(Selector, Selector, Selector)> {
    let mut v = split_colon_string(apb, 3, "atom:projector:band")?.into_iter();
    match (v.next(), v.next(), v.next()) {
        (Some(a), Some(p), Some(b)) => Ok((a, p, b)),
        _ => Err(MushroomError::invalid_identifier("atom:projector:band", apb)),
    }
}

/// 拆分 `"atom:projector"` 字符串
pub fn split_ap(ap: &str) -> Result<(Selector, Selector)> {
    let mut v = split_colon_string(ap, 2, "atom:projector")?.into_iter();
    match (v.next(), v.next()) {
        (Some(a), Some(p)) => Ok((a, p)),
        _ => Err(MushroomError::invalid_identifier("atom:projector", ap)),
    }
}
