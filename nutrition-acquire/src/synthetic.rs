//! Seeded synthetic stand-in for the malnutrition dataset.
//!
//! When no real source can be reached the pipeline falls back to a table
//! produced here. Rows are independent samples: anthropometry follows simple
//! age-dependent growth trends with Gaussian noise, and each categorical
//! nutritional label is derived from the z-score stored in the same row.
//!
//! Generation is fully determined by the `seed` argument; no process-wide
//! random state is touched.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::classifier::{classify, NutritionalStatus};
use crate::table::{Table, Value};

/// Column names, matching the header of the published dataset.
pub mod columns {
    pub const YEAR: &str = "AÑO";
    pub const QUARTER: &str = "TRIMESTRE";
    pub const LOCALITY: &str = "LOCALIDAD";
    pub const AGE_MONTHS: &str = "EDAD_MESES";
    pub const SEX: &str = "SEXO";
    pub const WEIGHT_KG: &str = "PESO_KG";
    pub const HEIGHT_CM: &str = "TALLA_CM";
    pub const WEIGHT_FOR_HEIGHT_Z: &str = "PESO_TALLA_Z";
    pub const HEIGHT_FOR_AGE_Z: &str = "TALLA_EDAD_Z";
    pub const WEIGHT_FOR_AGE_Z: &str = "PESO_EDAD_Z";
    pub const BMI_FOR_AGE_Z: &str = "IMC_EDAD_Z";
    pub const WEIGHT_FOR_HEIGHT_STATUS: &str = "CLASIFICACION_P_T";
    pub const HEIGHT_FOR_AGE_STATUS: &str = "CLASIFICACION_T_E";
    pub const WEIGHT_FOR_AGE_STATUS: &str = "CLASIFICACION_P_E";
    pub const BMI_FOR_AGE_STATUS: &str = "CLASIFICACION_IMC_E";
    pub const CARE_TYPE: &str = "TIPO_ATENCION";
    pub const AFFILIATION: &str = "REGIMEN_AFILIACION";
    pub const BMI: &str = "IMC";

    /// All synthetic columns in table order.
    pub const ALL: [&str; 18] = [
        YEAR,
        QUARTER,
        LOCALITY,
        AGE_MONTHS,
        SEX,
        WEIGHT_KG,
        HEIGHT_CM,
        WEIGHT_FOR_HEIGHT_Z,
        HEIGHT_FOR_AGE_Z,
        WEIGHT_FOR_AGE_Z,
        BMI_FOR_AGE_Z,
        WEIGHT_FOR_HEIGHT_STATUS,
        HEIGHT_FOR_AGE_STATUS,
        WEIGHT_FOR_AGE_STATUS,
        BMI_FOR_AGE_STATUS,
        CARE_TYPE,
        AFFILIATION,
        BMI,
    ];

    /// Numeric columns, for reporting.
    pub const NUMERIC: [&str; 9] = [
        AGE_MONTHS,
        WEIGHT_KG,
        HEIGHT_CM,
        WEIGHT_FOR_HEIGHT_Z,
        HEIGHT_FOR_AGE_Z,
        WEIGHT_FOR_AGE_Z,
        BMI_FOR_AGE_Z,
        BMI,
        YEAR,
    ];

    /// Categorical columns, for reporting.
    pub const CATEGORICAL: [&str; 9] = [
        QUARTER,
        LOCALITY,
        SEX,
        WEIGHT_FOR_HEIGHT_STATUS,
        HEIGHT_FOR_AGE_STATUS,
        WEIGHT_FOR_AGE_STATUS,
        BMI_FOR_AGE_STATUS,
        CARE_TYPE,
        AFFILIATION,
    ];
}

/// Upper bound (exclusive) of the sampled age, in months.
pub const MAX_AGE_MONTHS: i64 = 60;
/// Weight floor in kilograms.
pub const MIN_WEIGHT_KG: f64 = 2.0;
/// Height floor in centimetres.
pub const MIN_HEIGHT_CM: f64 = 40.0;

const YEARS: [(i64, f64); 6] = [
    (2019, 1.0),
    (2020, 1.0),
    (2021, 1.0),
    (2022, 1.0),
    (2023, 1.0),
    (2024, 1.0),
];

const QUARTERS: [(&str, f64); 4] = [("T1", 1.0), ("T2", 1.0), ("T3", 1.0), ("T4", 1.0)];

const LOCALITIES: [(&str, f64); 20] = [
    ("USAQUEN", 1.0),
    ("CHAPINERO", 1.0),
    ("SANTA FE", 1.0),
    ("SAN CRISTOBAL", 1.0),
    ("USME", 1.0),
    ("BOSA", 1.0),
    ("KENNEDY", 1.0),
    ("FONTIBON", 1.0),
    ("ENGATIVA", 1.0),
    ("SUBA", 1.0),
    ("BARRIOS UNIDOS", 1.0),
    ("TEUSAQUILLO", 1.0),
    ("LOS MARTIRES", 1.0),
    ("ANTONIO NARIÑO", 1.0),
    ("PUENTE ARANDA", 1.0),
    ("LA CANDELARIA", 1.0),
    ("RAFAEL URIBE URIBE", 1.0),
    ("CIUDAD BOLIVAR", 1.0),
    ("SUMAPAZ", 1.0),
    ("TUNJUELITO", 1.0),
];

const SEXES: [(&str, f64); 2] = [("MASCULINO", 1.0), ("FEMENINO", 1.0)];

const CARE_TYPES: [(&str, f64); 2] = [("PÚBLICA", 0.7), ("PRIVADA", 0.3)];

const AFFILIATIONS: [(&str, f64); 3] = [
    ("CONTRIBUTIVO", 0.4),
    ("SUBSIDIADO", 0.5),
    ("NO AFILIADO", 0.1),
];

/// Mean and standard deviation of a Gaussian draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    pub mean: f64,
    pub std_dev: f64,
}

impl Gaussian {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// Draws one sample with the Box-Muller transform.
    fn sample(&self, rng: &mut StdRng) -> f64 {
        // 1 - [0, 1) keeps the logarithm finite
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        self.mean + self.std_dev * z
    }
}

/// Weight-for-height z-score distribution.
pub const WEIGHT_FOR_HEIGHT_Z: Gaussian = Gaussian::new(0.0, 2.0);
/// Height-for-age z-score distribution.
pub const HEIGHT_FOR_AGE_Z: Gaussian = Gaussian::new(-0.5, 1.5);
/// Weight-for-age z-score distribution.
pub const WEIGHT_FOR_AGE_Z: Gaussian = Gaussian::new(-0.3, 1.8);
/// BMI-for-age z-score distribution.
pub const BMI_FOR_AGE_Z: Gaussian = Gaussian::new(0.2, 1.6);

const WEIGHT_NOISE: Gaussian = Gaussian::new(0.0, 1.0);
const HEIGHT_NOISE: Gaussian = Gaussian::new(0.0, 5.0);

fn pick<T: Copy>(rng: &mut StdRng, choices: &[(T, f64)]) -> T {
    let total: f64 = choices.iter().map(|(_, w)| w).sum();
    let mut target = rng.random::<f64>() * total;
    for (choice, weight) in choices {
        if target < *weight {
            return *choice;
        }
        target -= weight;
    }
    // rounding can leave a sliver past the last bucket
    choices[choices.len() - 1].0
}

/// Body-mass index from weight in kilograms and height in centimetres.
pub fn body_mass_index(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    weight_kg / (height_m * height_m)
}

/// One synthetic observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRow {
    pub year: i64,
    pub quarter: &'static str,
    pub locality: &'static str,
    pub age_months: i64,
    pub sex: &'static str,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub weight_for_height_z: f64,
    pub height_for_age_z: f64,
    pub weight_for_age_z: f64,
    pub bmi_for_age_z: f64,
    pub care_type: &'static str,
    pub affiliation: &'static str,
}

impl SyntheticRow {
    fn sample(rng: &mut StdRng) -> Self {
        let year = pick(rng, &YEARS);
        let quarter = pick(rng, &QUARTERS);
        let locality = pick(rng, &LOCALITIES);
        let age_months = rng.random_range(0..MAX_AGE_MONTHS);
        let sex = pick(rng, &SEXES);

        let age = age_months as f64;
        let weight_kg = (3.0 + age * 0.5 + WEIGHT_NOISE.sample(rng)).max(MIN_WEIGHT_KG);
        let height_cm = (50.0 + age * 1.5 + HEIGHT_NOISE.sample(rng)).max(MIN_HEIGHT_CM);

        Self {
            year,
            quarter,
            locality,
            age_months,
            sex,
            weight_kg,
            height_cm,
            weight_for_height_z: WEIGHT_FOR_HEIGHT_Z.sample(rng),
            height_for_age_z: HEIGHT_FOR_AGE_Z.sample(rng),
            weight_for_age_z: WEIGHT_FOR_AGE_Z.sample(rng),
            bmi_for_age_z: BMI_FOR_AGE_Z.sample(rng),
            care_type: pick(rng, &CARE_TYPES),
            affiliation: pick(rng, &AFFILIATIONS),
        }
    }

    pub fn weight_for_height_status(&self) -> NutritionalStatus {
        classify(self.weight_for_height_z)
    }

    pub fn height_for_age_status(&self) -> NutritionalStatus {
        classify(self.height_for_age_z)
    }

    pub fn weight_for_age_status(&self) -> NutritionalStatus {
        classify(self.weight_for_age_z)
    }

    pub fn bmi_for_age_status(&self) -> NutritionalStatus {
        classify(self.bmi_for_age_z)
    }

    pub fn body_mass_index(&self) -> f64 {
        body_mass_index(self.weight_kg, self.height_cm)
    }

    /// Cell values in [`columns::ALL`] order.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Int(self.year),
            Value::from(self.quarter),
            Value::from(self.locality),
            Value::Int(self.age_months),
            Value::from(self.sex),
            Value::Float(self.weight_kg),
            Value::Float(self.height_cm),
            Value::Float(self.weight_for_height_z),
            Value::Float(self.height_for_age_z),
            Value::Float(self.weight_for_age_z),
            Value::Float(self.bmi_for_age_z),
            Value::from(self.weight_for_height_status().label()),
            Value::from(self.height_for_age_status().label()),
            Value::from(self.weight_for_age_status().label()),
            Value::from(self.bmi_for_age_status().label()),
            Value::from(self.care_type),
            Value::from(self.affiliation),
            Value::Float(self.body_mass_index()),
        ]
    }
}

/// Produces synthetic malnutrition tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Draws `sample_count` independent rows from a generator seeded with `seed`.
    pub fn generate_rows(&self, sample_count: usize, seed: u64) -> Vec<SyntheticRow> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..sample_count)
            .map(|_| SyntheticRow::sample(&mut rng))
            .collect()
    }

    /// Generates a complete table. Equal seeds give identical tables.
    #[instrument(skip(self))]
    pub fn generate(&self, sample_count: usize, seed: u64) -> Table {
        let rows = self
            .generate_rows(sample_count, seed)
            .iter()
            .map(SyntheticRow::to_values)
            .collect();
        let table = Table::from_trusted_rows(
            columns::ALL.iter().map(|c| c.to_string()).collect(),
            rows,
        );
        debug!(rows = table.len(), "Synthetic table generated");
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_and_row_count() {
        let table = SyntheticGenerator::new().generate(50, 7);
        assert_eq!(table.len(), 50);
        assert_eq!(table.columns(), &columns::ALL);
        for record in table.records() {
            assert_eq!(record.len(), columns::ALL.len());
        }
    }

    #[test]
    fn test_same_seed_same_table() {
        let generator = SyntheticGenerator::new();
        assert_eq!(generator.generate(200, 42), generator.generate(200, 42));
    }

    #[test]
    fn test_different_seed_different_table() {
        let generator = SyntheticGenerator::new();
        assert_ne!(generator.generate(200, 42), generator.generate(200, 43));
    }

    #[test]
    fn test_zero_samples_keeps_schema() {
        let table = SyntheticGenerator::new().generate(0, 1);
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), columns::ALL.len());
    }

    #[test]
    fn test_floors_applied() {
        for row in SyntheticGenerator::new().generate_rows(5000, 3) {
            assert!(row.weight_kg >= MIN_WEIGHT_KG);
            assert!(row.height_cm >= MIN_HEIGHT_CM);
            assert!((0..MAX_AGE_MONTHS).contains(&row.age_months));
        }
    }

    #[test]
    fn test_categorical_weights_roughly_respected() {
        let rows = SyntheticGenerator::new().generate_rows(10_000, 11);
        let public = rows.iter().filter(|r| r.care_type == "PÚBLICA").count() as f64;
        let unaffiliated = rows
            .iter()
            .filter(|r| r.affiliation == "NO AFILIADO")
            .count() as f64;

        assert!((public / 10_000.0 - 0.7).abs() < 0.03);
        assert!((unaffiliated / 10_000.0 - 0.1).abs() < 0.02);
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = StdRng::seed_from_u64(5);
        let dist = Gaussian::new(-0.5, 1.5);
        let samples: Vec<f64> = (0..20_000).map(|_| dist.sample(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;

        assert!((mean + 0.5).abs() < 0.05);
        assert!((var.sqrt() - 1.5).abs() < 0.05);
    }

    #[test]
    fn test_body_mass_index() {
        assert!((body_mass_index(12.0, 100.0) - 12.0).abs() < 1e-12);
        assert!((body_mass_index(9.0, 75.0) - 16.0).abs() < 1e-12);
    }
}
