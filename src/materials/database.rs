//! Collection of element tables sharing one photon-energy grid.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AxisGrid, Table, ZoneMaterial};
use crate::error::{RadError, Result};

/// Zone-level transport coefficients (already multiplied by density)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneOptics {
    /// Absorption coefficient per photon bin (1/cm)
    pub absorption: Vec<f64>,
    /// Emissivity per photon bin (W/cm³/sr/eV)
    pub emission: Vec<f64>,
    /// Scattering coefficient per photon bin (1/cm)
    pub scattering: Vec<f64>,
    /// Electron density from charge neutrality (electrons/cm³)
    pub electron_density: f64,
}

impl ZoneOptics {
    /// All-zero coefficients for `nhv` bins
    pub fn vacuum(nhv: usize) -> Self {
        Self {
            absorption: vec![0.0; nhv],
            emission: vec![0.0; nhv],
            scattering: vec![0.0; nhv],
            electron_density: 0.0,
        }
    }

    pub fn nhv(&self) -> usize {
        self.absorption.len()
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct DatabaseRecord {
    #[serde(default = "default_label")]
    label: String,
    hv: Vec<f64>,
    tables: Vec<Table>,
}

fn default_label() -> String {
    "database".to_string()
}

/// Read-only material database shared by every ray of a tracing pass
#[derive(Debug, Clone)]
pub struct Database {
    label: String,
    hv: AxisGrid,
    tables: HashMap<String, Table>,
}

impl Database {
    /// Empty database on the given photon-energy grid (eV)
    pub fn new(label: impl Into<String>, hv: Vec<f64>) -> Result<Self> {
        let label = label.into();
        let hv = AxisGrid::new(&label, "hv", hv)?;
        Ok(Self {
            label,
            hv,
            tables: HashMap::new(),
        })
    }

    /// Add a table; its spectral size must match the hv grid
    pub fn insert(&mut self, table: Table) -> Result<()> {
        if table.get_nhv() != self.hv.len() {
            return Err(RadError::table(
                table.symbol(),
                format!(
                    "table has {} photon bins, database '{}' has {}",
                    table.get_nhv(),
                    self.label,
                    self.hv.len()
                ),
            ));
        }
        debug!(symbol = table.symbol(), "material table added");
        self.tables.insert(table.symbol().to_string(), table);
        Ok(())
    }

    /// Builder form of `insert`
    pub fn with_table(mut self, table: Table) -> Result<Self> {
        self.insert(table)?;
        Ok(self)
    }

    /// Load a database from JSON (`{"label", "hv", "tables": [...]}`)
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let record: DatabaseRecord = serde_json::from_reader(reader)?;
        let mut db = Self::new(record.label, record.hv)?;
        for table in record.tables {
            db.insert(table)?;
        }
        info!(label = %db.label, tables = db.tables.len(), nhv = db.get_nhv(), "material database loaded");
        Ok(db)
    }

    /// Serialize in the format read by `from_json_reader`
    pub fn to_json(&self) -> Result<String> {
        let mut tables: Vec<Table> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        let record = DatabaseRecord {
            label: self.label.clone(),
            hv: self.hv.values().to_vec(),
            tables,
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self, symbol: &str) -> Result<&Table> {
        self.tables
            .get(symbol)
            .ok_or_else(|| RadError::table(symbol, format!("no table in database '{}'", self.label)))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.tables.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn hv(&self) -> &[f64] {
        self.hv.values()
    }

    pub fn get_nhv(&self) -> usize {
        self.hv.len()
    }

    pub fn get_hv_at(&self, i: usize) -> Result<f64> {
        self.hv.get_at(i)
    }

    /// Electron density of a zone from charge neutrality: np·Σ fᵢ·z̄ᵢ
    pub fn electron_density(&self, material: &ZoneMaterial) -> Result<f64> {
        if material.is_vacuum() {
            return Ok(0.0);
        }
        let mut zsum = 0.0;
        for c in &material.components {
            zsum += c.fraction * self.get(&c.symbol)?.zbar(material.te, material.np);
        }
        Ok(material.np * zsum)
    }

    /// Transport coefficients of a zone: np·Σ fᵢ·σᵢ(te, np)
    pub fn zone_optics(&self, material: &ZoneMaterial) -> Result<ZoneOptics> {
        let nhv = self.get_nhv();
        if material.is_vacuum() {
            return Ok(ZoneOptics::vacuum(nhv));
        }
        if !(material.te.is_finite() && material.np.is_finite()) {
            return Err(RadError::table(
                self.label.as_str(),
                format!("non-finite zone state (te = {}, np = {})", material.te, material.np),
            ));
        }
        let mut optics = ZoneOptics::vacuum(nhv);
        for c in &material.components {
            let table = self.get(&c.symbol)?;
            let w = c.fraction * material.np;
            if w == 0.0 {
                continue;
            }
            let ab = table.absorption(material.te, material.np);
            let em = table.emission(material.te, material.np);
            let sc = table.scattering(material.te, material.np);
            for k in 0..nhv {
                optics.absorption[k] += w * ab[k];
                optics.emission[k] += w * em[k];
                optics.scattering[k] += w * sc[k];
            }
        }
        optics.electron_density = self.electron_density(material)?;
        Ok(optics)
    }
}
