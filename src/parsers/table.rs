//! # CSV 表格读写
//!
//! - 能带路径表：第一列为 k 路径坐标 `kx`，其余每列一条能带，首行为表头
//! - 态密度表：第一列为能量，其后为总态密度与投影态密度
//!
//! ## 依赖关系
//! - 被 `commands/resolve.rs`, `commands/dos.rs` 使用
//! - 使用 `csv` crate

use crate::error::{MushroomError, Result};

use log::info;
use ndarray::{Array1, Array2};
use std::io::{Read, Write};
use std::path::Path;

/// 能带路径表
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    pub kx: Vec<f64>,
    /// `[nkpts, nbands]`
    pub bands: Array2<f64>,
    /// 能带列名，不含 `kx`
    pub headers: Vec<String>,
}

fn table_error(path: &str, reason: impl Into<String>) -> MushroomError {
    MushroomError::ParseError {
        format: "csv".to_string(),
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// 从任意读取器解析能带路径表
pub fn read_band_table_from<R: Read>(reader: R, path: &str) -> Result<BandTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let header = rdr.headers()?.clone();
    if header.len() < 3 {
        return Err(table_error(
            path,
            format!("need kx and at least 2 band columns, got {} columns", header.len()),
        ));
    }
    let headers: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    let nb = headers.len();

    let mut kx = Vec::new();
    let mut flat = Vec::new();
    for (irow, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() != nb + 1 {
            return Err(table_error(
                path,
                format!("row {} has {} columns, expect {}", irow + 1, record.len(), nb + 1),
            ));
        }
        for (icol, field) in record.iter().enumerate() {
            let x: f64 = field.parse().map_err(|_| {
                table_error(
                    path,
                    format!("invalid number '{}' at row {} column {}", field, irow + 1, icol + 1),
                )
            })?;
            if icol == 0 {
                kx.push(x);
            } else {
                flat.push(x);
            }
        }
    }

    let bands = Array2::from_shape_vec((kx.len(), nb), flat)
        .map_err(|e| table_error(path, e.to_string()))?;
    Ok(BandTable { kx, bands, headers })
}

/// 读取能带路径表文件
pub fn read_band_table(path: &Path) -> Result<BandTable> {
    let file = std::fs::File::open(path).map_err(|e| MushroomError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let table = read_band_table_from(file, &path.display().to_string())?;
    info!(
        "Read band table {}: nkpts = {}, nbands = {}",
        path.display(),
        table.kx.len(),
        table.headers.len()
    );
    Ok(table)
}

/// 写出能带路径表
pub fn write_band_table_to<W: Write>(writer: W, table: &BandTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["kx".to_string()];
    header.extend(table.headers.iter().cloned());
    wtr.write_record(&header)?;
    for (ik, row) in table.bands.rows().into_iter().enumerate() {
        let mut record = vec![format!("{:.10}", table.kx[ik])];
        record.extend(row.iter().map(|e| format!("{:.10}", e)));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| MushroomError::FileWriteError {
        path: "<csv>".to_string(),
        source: e,
    })?;
    Ok(())
}

pub fn write_band_table(path: &Path, table: &BandTable) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| MushroomError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    write_band_table_to(file, table)
}

/// 写出态密度表，`columns` 每项为列名与数据，长度须与能量网格一致
pub fn write_dos_table(
    path: &Path,
    egrid: &Array1<f64>,
    columns: &[(String, Array1<f64>)],
) -> Result<()> {
    if let Some((name, col)) = columns.iter().find(|(_, c)| c.len() != egrid.len()) {
        return Err(MushroomError::Dos(format!(
            "column '{}' has {} points, egrid has {}",
            name,
            col.len(),
            egrid.len()
        )));
    }
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["energy".to_string()];
    header.extend(columns.iter().map(|(n, _)| n.clone()));
    wtr.write_record(&header)?;
    for (ie, e) in egrid.iter().enumerate() {
        let mut record = vec![format!("{:.6}", e)];
        record.extend(columns.iter().map(|(_, c)| format!("{:.8}", c[ie])));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| MushroomError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_band_table() {
        let content = "kx, b1, b2\n# path start\n0.0, 1.0, 2.0\n0.1, 1.1, 1.9\n";
        let table = read_band_table_from(content.as_bytes(), "mem").unwrap();
        assert_eq!(table.kx, vec![0.0, 0.1]);
        assert_eq!(table.headers, vec!["b1", "b2"]);
        assert_eq!(table.bands[[1, 1]], 1.9);
    }

    #[test]
    fn test_bad_tables() {
        let too_few = "kx,b1\n0.0,1.0\n";
        assert!(read_band_table_from(too_few.as_bytes(), "mem").is_err());
        let bad_number = "kx,b1,b2\n0.0,abc,1.0\n";
        let err = read_band_table_from(bad_number.as_bytes(), "mem").unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_write_band_table() {
        let table = BandTable {
            kx: vec![0.0, 0.5],
            bands: Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
            headers: vec!["b1".to_string(), "b2".to_string()],
        };
        let mut buf = Vec::new();
        write_band_table_to(&mut buf, &table).unwrap();
        let back = read_band_table_from(buf.as_slice(), "mem").unwrap();
        assert_eq!(back, table);
    }
}
