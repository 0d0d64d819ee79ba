//! Demo agricultural dataset.
//!
//! Crop production and rainfall figures for a handful of states, used to seed
//! an empty SQLite store and to back the mock client.

use super::{Column, Schema, Table};

/// (state, district, crop, season, year, area_ha, production_t)
const CROP_ROWS: &[(&str, &str, &str, &str, i64, f64, f64)] = &[
    ("Punjab", "Ludhiana", "Wheat", "Rabi", 2018, 252_000.0, 1_285_200.0),
    ("Punjab", "Ludhiana", "Wheat", "Rabi", 2019, 251_000.0, 1_305_200.0),
    ("Punjab", "Ludhiana", "Wheat", "Rabi", 2020, 250_500.0, 1_227_450.0),
    ("Punjab", "Ludhiana", "Wheat", "Rabi", 2021, 249_800.0, 1_324_000.0),
    ("Punjab", "Ludhiana", "Wheat", "Rabi", 2022, 249_000.0, 1_170_300.0),
    ("Punjab", "Sangrur", "Rice", "Kharif", 2018, 280_000.0, 1_848_000.0),
    ("Punjab", "Sangrur", "Rice", "Kharif", 2019, 282_000.0, 1_833_000.0),
    ("Punjab", "Sangrur", "Rice", "Kharif", 2020, 285_000.0, 1_938_000.0),
    ("Punjab", "Sangrur", "Rice", "Kharif", 2021, 284_000.0, 1_874_400.0),
    ("Punjab", "Sangrur", "Rice", "Kharif", 2022, 286_000.0, 1_944_800.0),
    ("Haryana", "Karnal", "Rice", "Kharif", 2020, 170_000.0, 680_000.0),
    ("Haryana", "Karnal", "Wheat", "Rabi", 2020, 165_000.0, 808_500.0),
    ("Haryana", "Karnal", "Wheat", "Rabi", 2021, 166_000.0, 830_000.0),
    ("Karnataka", "Raichur", "Rice", "Kharif", 2020, 160_000.0, 512_000.0),
    ("Karnataka", "Raichur", "Rice", "Kharif", 2021, 158_000.0, 490_000.0),
    ("Karnataka", "Belagavi", "Sugarcane", "Whole Year", 2021, 240_000.0, 21_600_000.0),
    ("Maharashtra", "Solapur", "Jowar", "Rabi", 2020, 310_000.0, 279_000.0),
    ("Maharashtra", "Solapur", "Jowar", "Rabi", 2021, 298_000.0, 250_300.0),
];

/// (state, year, annual_mm, monsoon_mm)
const RAINFALL_ROWS: &[(&str, i64, f64, f64)] = &[
    ("Punjab", 2018, 639.0, 480.0),
    ("Punjab", 2019, 584.0, 431.0),
    ("Punjab", 2020, 528.0, 389.0),
    ("Punjab", 2021, 612.0, 458.0),
    ("Punjab", 2022, 498.0, 362.0),
    ("Haryana", 2020, 545.0, 412.0),
    ("Haryana", 2021, 701.0, 540.0),
    ("Karnataka", 2020, 1_355.0, 1_010.0),
    ("Karnataka", 2021, 1_488.0, 1_102.0),
    ("Maharashtra", 2020, 1_273.0, 1_105.0),
    ("Maharashtra", 2021, 1_197.0, 1_020.0),
];

/// DDL for the demo tables.
pub const CREATE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS crop_production (
        id INTEGER PRIMARY KEY,
        state TEXT NOT NULL,
        district TEXT NOT NULL,
        crop TEXT NOT NULL,
        season TEXT,
        year INTEGER NOT NULL,
        area_hectares REAL,
        production_tonnes REAL,
        yield_tonnes_per_hectare REAL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS rainfall (
        id INTEGER PRIMARY KEY,
        state TEXT NOT NULL,
        year INTEGER NOT NULL,
        annual_rainfall_mm REAL NOT NULL,
        monsoon_rainfall_mm REAL
    )"#,
];

/// One demo row to insert.
pub enum SeedRow {
    Crop {
        state: &'static str,
        district: &'static str,
        crop: &'static str,
        season: &'static str,
        year: i64,
        area_hectares: f64,
        production_tonnes: f64,
    },
    Rainfall {
        state: &'static str,
        year: i64,
        annual_mm: f64,
        monsoon_mm: f64,
    },
}

impl SeedRow {
    /// Crop yield in tonnes per hectare, rounded to two decimals.
    pub fn yield_per_hectare(area_hectares: f64, production_tonnes: f64) -> f64 {
        if area_hectares <= 0.0 {
            return 0.0;
        }
        (production_tonnes / area_hectares * 100.0).round() / 100.0
    }
}

/// Returns every seed row in insertion order.
pub fn seed_rows() -> impl Iterator<Item = SeedRow> {
    let crops = CROP_ROWS.iter().map(
        |&(state, district, crop, season, year, area_hectares, production_tonnes)| SeedRow::Crop {
            state,
            district,
            crop,
            season,
            year,
            area_hectares,
            production_tonnes,
        },
    );
    let rainfall = RAINFALL_ROWS
        .iter()
        .map(|&(state, year, annual_mm, monsoon_mm)| SeedRow::Rainfall {
            state,
            year,
            annual_mm,
            monsoon_mm,
        });
    crops.chain(rainfall)
}

/// Schema of the demo tables, as introspection would report it.
pub fn demo_schema() -> Schema {
    Schema {
        tables: vec![
            Table::new("crop_production")
                .column(Column::new("id", "INTEGER").nullable(false))
                .column(Column::new("state", "TEXT").nullable(false))
                .column(Column::new("district", "TEXT").nullable(false))
                .column(Column::new("crop", "TEXT").nullable(false))
                .column(Column::new("season", "TEXT"))
                .column(Column::new("year", "INTEGER").nullable(false))
                .column(Column::new("area_hectares", "REAL"))
                .column(Column::new("production_tonnes", "REAL"))
                .column(Column::new("yield_tonnes_per_hectare", "REAL"))
                .primary_key(&["id"]),
            Table::new("rainfall")
                .column(Column::new("id", "INTEGER").nullable(false))
                .column(Column::new("state", "TEXT").nullable(false))
                .column(Column::new("year", "INTEGER").nullable(false))
                .column(Column::new("annual_rainfall_mm", "REAL").nullable(false))
                .column(Column::new("monsoon_rainfall_mm", "REAL"))
                .primary_key(&["id"]),
        ],
        foreign_keys: vec![],
    }
}
