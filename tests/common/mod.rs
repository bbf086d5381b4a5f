#![allow(dead_code)]

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::path::{Path, PathBuf};

pub enum Value {
    Text(String),
    Number(f64),
    Date(u16, u8, u8),
    Blank,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Blank)
    }
}

/// Write one sheet: a title in A1, `headers` on row `header_row`, `rows` below.
/// Empty header names are left blank.
pub fn write_sheet(path: &Path, header_row: u32, headers: &[&str], rows: Vec<Vec<Value>>) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    if header_row > 0 {
        sheet.write_string(0, 0, "Laporan Dinas Kesehatan").unwrap();
    }
    for (col, name) in headers.iter().enumerate() {
        if !name.is_empty() {
            sheet.write_string(header_row, col as u16, *name).unwrap();
        }
    }
    for (r, row) in rows.into_iter().enumerate() {
        let r = header_row + 1 + r as u32;
        for (c, value) in row.into_iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Text(s) => {
                    sheet.write_string(r, c, s).unwrap();
                }
                Value::Number(v) => {
                    sheet.write_number(r, c, v).unwrap();
                }
                Value::Date(y, m, d) => {
                    let dt = ExcelDateTime::from_ymd(y, m, d).unwrap();
                    sheet.write_datetime_with_format(r, c, &dt, &date).unwrap();
                }
                Value::Blank => {}
            }
        }
    }
    workbook.save(path).unwrap();
}

pub const BRIDGING_HEADERS: [&str; 6] = [
    "nama_pasien",
    "tgl_hasil_diagnosis",
    "SITK",
    "umur",
    "person_kecamatan",
    "jenis_kelamin_id",
];

/// Bridging export for May 2024: one row per day, SITK set where given.
pub fn bridging_workbook(dir: &Path, days: &[u8], sitk: &[Option<&str>]) -> PathBuf {
    let path = dir.join("bridging.xlsx");
    let rows = days
        .iter()
        .zip(sitk)
        .enumerate()
        .map(|(i, (day, sitk))| {
            vec![
                Value::from(format!("Pasien {}", i).as_str()),
                Value::Date(2024, 5, *day),
                Value::from(*sitk),
                Value::from(18.0 + (i as f64) * 6.0),
                Value::from(if i % 2 == 0 { "Cibeunying" } else { "Coblong" }),
                Value::from(if i % 3 == 0 { "P" } else { "L" }),
            ]
        })
        .collect();
    write_sheet(&path, 0, &BRIDGING_HEADERS, rows);
    path
}

pub const KADER_HEADERS: [&str; 8] = [
    "No",
    "Tanggal Hasil Pemeriksaan Dahak",
    "Tipe Pasien",
    "Kader",
    "Usia",
    "Jenis Kelamin",
    "Kecamatan",
    "Hasil Pengobatan",
];

pub struct KaderRow {
    pub date: &'static str,
    pub patient_type: &'static str,
    pub kader: &'static str,
    pub age: &'static str,
    pub gender: &'static str,
    pub district: &'static str,
    pub outcome: &'static str,
}

/// Kader register with six title rows above the header.
pub fn kader_workbook(dir: &Path, rows: &[KaderRow]) -> PathBuf {
    let path = dir.join("kader.xlsx");
    let cells = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            vec![
                Value::from((i + 1) as f64),
                Value::from(r.date),
                Value::from(r.patient_type),
                Value::from(r.kader),
                Value::from(r.age),
                Value::from(r.gender),
                Value::from(r.district),
                Value::from(r.outcome),
            ]
        })
        .collect();
    write_sheet(&path, 6, &KADER_HEADERS, cells);
    path
}

pub fn kader_rows() -> Vec<KaderRow> {
    vec![
        KaderRow {
            date: "2024-01-15",
            patient_type: "Baru",
            kader: "Siti",
            age: "34 Thn",
            gender: "P",
            district: "Sukajadi",
            outcome: "Sembuh",
        },
        KaderRow {
            date: "2024-01-28",
            patient_type: "Kambuh",
            kader: "Ani",
            age: "7 Thn",
            gender: "L",
            district: "Sukajadi",
            outcome: "Pengobatan Lengkap",
        },
        KaderRow {
            date: "2024-02-03",
            patient_type: "Baru",
            kader: "Siti",
            age: "61 Thn",
            gender: "L",
            district: "Cicendo",
            outcome: "Sembuh",
        },
    ]
}

/// Recap columns by position: the facility (D) and notified-case (L)
/// headers are blank, as in the exported report.
pub const REKAP_HEADERS: [&str; 12] = [
    "No",
    "KATEGORI",
    "Kode",
    "",
    "Terduga TB",
    "Anak yang Mendapatkan TPT",
    "Kolom 6",
    "Kolom 7",
    "Kolom 8",
    "Kolom 9",
    "Kolom 10",
    "",
];

pub struct RekapRow {
    pub category: &'static str,
    pub facility: Option<&'static str>,
    pub suspected: Option<f64>,
    pub preventive: Option<f64>,
    pub notified: Option<f64>,
}

/// Recap report with nine title rows above the header.
pub fn rekap_workbook(dir: &Path, rows: &[RekapRow]) -> PathBuf {
    let path = dir.join("rekap.xlsx");
    let cells = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = vec![
                Value::from((i + 1) as f64),
                Value::from(r.category),
                Value::from(format!("K{:02}", i).as_str()),
                Value::from(r.facility),
                Value::from(r.suspected),
                Value::from(r.preventive),
            ];
            row.extend((6..11).map(|_| Value::from(0.0)));
            row.push(Value::from(r.notified));
            row
        })
        .collect();
    write_sheet(&path, 9, &REKAP_HEADERS, cells);
    path
}
