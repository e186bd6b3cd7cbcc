//! Self-describing text serialization of standardized catalog tables.
//!
//! A saved catalog is one `#`-prefixed header line carrying the catalog
//! metadata and column layout as JSON, followed by a plain CSV body with one
//! row per star. Floats are written with `Display`, which emits the shortest
//! representation that parses back to the identical bit pattern, so a
//! written catalog round-trips exactly: reading it back and propagating both
//! copies to the same epoch yields identical positions.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::epoch::Epoch;
use crate::error::{CatalogError, Result};
use crate::table::{ErrorColumn, IdColumn, MagColumn, ObsTime, StandardizedTable};

const MAGIC: &str = "# asterism-catalog v1 ";

/// How the observation epoch is stored: once in the header, or as a CSV
/// column when it varies per row.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ObsTimeSpec {
    Scalar(f64),
    PerRow,
}

/// Header line payload: everything needed to rebuild the table shape.
#[derive(Debug, Serialize, Deserialize)]
struct TextHeader {
    meta: crate::table::CatalogMeta,
    id_keys: Vec<String>,
    filters: Vec<String>,
    error_fields: Vec<String>,
    has_proper_motion: bool,
    has_distance: bool,
    has_radial_velocity: bool,
    obstime: ObsTimeSpec,
    units: BTreeMap<String, String>,
}

impl TextHeader {
    fn from_table(table: &StandardizedTable) -> TextHeader {
        let mut units = BTreeMap::new();
        units.insert("ra".to_string(), "deg".to_string());
        units.insert("dec".to_string(), "deg".to_string());
        units.insert("obstime".to_string(), "yr".to_string());
        if table.pm_ra_cosdec.is_some() {
            units.insert("pm_ra_cosdec".to_string(), "mas / yr".to_string());
            units.insert("pm_dec".to_string(), "mas / yr".to_string());
        }
        if table.distance.is_some() {
            units.insert("distance".to_string(), "pc".to_string());
        }
        if table.radial_velocity.is_some() {
            units.insert("radial_velocity".to_string(), "km / s".to_string());
        }
        for col in &table.magnitudes {
            units.insert(format!("{}-mag", col.filter), "mag".to_string());
        }
        for col in &table.errors {
            units.insert(format!("{}-error", col.field), unit_for_field(&col.field));
        }

        TextHeader {
            meta: table.meta.clone(),
            id_keys: table.identifiers.iter().map(|c| c.key.clone()).collect(),
            filters: table.magnitudes.iter().map(|c| c.filter.clone()).collect(),
            error_fields: table.errors.iter().map(|c| c.field.clone()).collect(),
            has_proper_motion: table.pm_ra_cosdec.is_some(),
            has_distance: table.distance.is_some(),
            has_radial_velocity: table.radial_velocity.is_some(),
            obstime: match &table.obstime {
                ObsTime::Scalar(e) => ObsTimeSpec::Scalar(e.decimal_year()),
                ObsTime::PerRow(_) => ObsTimeSpec::PerRow,
            },
            units,
        }
    }

    /// CSV column names, in body order.
    fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.id_keys.iter().map(|k| format!("{k}-id")).collect();
        names.push("ra".to_string());
        names.push("dec".to_string());
        if self.has_proper_motion {
            names.push("pm_ra_cosdec".to_string());
            names.push("pm_dec".to_string());
        }
        if self.has_distance {
            names.push("distance".to_string());
        }
        if self.has_radial_velocity {
            names.push("radial_velocity".to_string());
        }
        if matches!(self.obstime, ObsTimeSpec::PerRow) {
            names.push("obstime".to_string());
        }
        for f in &self.filters {
            names.push(format!("{f}-mag"));
        }
        for e in &self.error_fields {
            names.push(format!("{e}-error"));
        }
        names
    }
}

/// Unit of a `<field>-error` column: the same unit as the field it estimates.
fn unit_for_field(field: &str) -> String {
    match field {
        "ra" | "dec" => "deg",
        "pm_ra_cosdec" | "pm_dec" => "mas / yr",
        "distance" => "pc",
        "radial_velocity" => "km / s",
        _ => "mag",
    }
    .to_string()
}

impl Catalog {
    /// Write this catalog to a self-describing text file.
    pub fn write_to_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let table = self.table();
        let header = TextHeader::from_table(table);
        let header_json = serde_json::to_string(&header).map_err(|e| CatalogError::Parse {
            line: 1,
            reason: format!("failed to encode header: {e}"),
        })?;

        let mut file = File::create(path)?;
        writeln!(file, "{MAGIC}{header_json}")?;

        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(header.column_names())
            .map_err(csv_io_error)?;

        for i in 0..table.len() {
            let mut record: Vec<String> = table
                .identifiers
                .iter()
                .map(|c| c.values[i].clone())
                .collect();
            record.push(table.ra[i].to_string());
            record.push(table.dec[i].to_string());
            for col in [&table.pm_ra_cosdec, &table.pm_dec] {
                if let Some(values) = col {
                    record.push(values[i].to_string());
                }
            }
            if let Some(values) = &table.distance {
                record.push(values[i].to_string());
            }
            if let Some(values) = &table.radial_velocity {
                record.push(values[i].to_string());
            }
            if let ObsTime::PerRow(v) = &table.obstime {
                record.push(v[i].decimal_year().to_string());
            }
            for col in &table.magnitudes {
                record.push(col.values[i].to_string());
            }
            for col in &table.errors {
                record.push(col.values[i].to_string());
            }
            writer.write_record(&record).map_err(csv_io_error)?;
        }
        writer.flush()?;

        info!(catalog = %table.meta.name, path = %path.display(), rows = table.len(), "saved catalog");
        Ok(())
    }

    /// Read a catalog previously written by [`Catalog::write_to_text`].
    pub fn from_text<P: AsRef<Path>>(path: P) -> Result<Catalog> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let mut first = String::new();
        reader.read_line(&mut first)?;
        let header_json = first
            .strip_prefix(MAGIC)
            .ok_or_else(|| CatalogError::Parse {
                line: 1,
                reason: format!("expected header starting with '{}'", MAGIC.trim_end()),
            })?;
        let header: TextHeader =
            serde_json::from_str(header_json.trim_end()).map_err(|e| CatalogError::Parse {
                line: 1,
                reason: format!("malformed header: {e}"),
            })?;

        let table = read_body(&header, reader)?;
        Catalog::new(table)
    }
}

fn read_body<R: Read>(header: &TextHeader, reader: R) -> Result<StandardizedTable> {
    let expected = header.column_names();
    let mut csv_reader = csv::Reader::from_reader(reader);

    let names: Vec<String> = csv_reader
        .headers()
        .map_err(|e| CatalogError::Parse {
            line: 2,
            reason: format!("missing csv header: {e}"),
        })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    if names != expected {
        return Err(CatalogError::Parse {
            line: 2,
            reason: format!("column names {names:?} do not match header layout {expected:?}"),
        });
    }

    let n_ids = header.id_keys.len();
    let mut id_values: Vec<Vec<String>> = vec![Vec::new(); n_ids];
    let mut ra = Vec::new();
    let mut dec = Vec::new();
    let mut pm_ra_cosdec = header.has_proper_motion.then(Vec::new);
    let mut pm_dec = header.has_proper_motion.then(Vec::new);
    let mut distance = header.has_distance.then(Vec::new);
    let mut radial_velocity = header.has_radial_velocity.then(Vec::new);
    let mut obstimes: Vec<Epoch> = Vec::new();
    let mut mag_values: Vec<Vec<f64>> = vec![Vec::new(); header.filters.len()];
    let mut err_values: Vec<Vec<f64>> = vec![Vec::new(); header.error_fields.len()];

    for (row_idx, record) in csv_reader.records().enumerate() {
        let line = row_idx + 3; // header line + csv header
        let record = record.map_err(|e| CatalogError::Parse {
            line,
            reason: e.to_string(),
        })?;
        if record.len() != expected.len() {
            return Err(CatalogError::Parse {
                line,
                reason: format!("expected {} fields, found {}", expected.len(), record.len()),
            });
        }

        let mut fields = record.iter();
        for values in id_values.iter_mut() {
            values.push(fields.next().unwrap_or("").to_string());
        }
        ra.push(parse_f64(fields.next(), line)?);
        dec.push(parse_f64(fields.next(), line)?);
        if let Some(values) = pm_ra_cosdec.as_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
        if let Some(values) = pm_dec.as_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
        if let Some(values) = distance.as_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
        if let Some(values) = radial_velocity.as_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
        if matches!(header.obstime, ObsTimeSpec::PerRow) {
            obstimes.push(Epoch::from_decimal_year(parse_f64(fields.next(), line)?));
        }
        for values in mag_values.iter_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
        for values in err_values.iter_mut() {
            values.push(parse_f64(fields.next(), line)?);
        }
    }

    Ok(StandardizedTable {
        identifiers: header
            .id_keys
            .iter()
            .zip(id_values)
            .map(|(key, values)| IdColumn {
                key: key.clone(),
                values,
            })
            .collect(),
        ra,
        dec,
        pm_ra_cosdec,
        pm_dec,
        distance,
        radial_velocity,
        obstime: match header.obstime {
            ObsTimeSpec::Scalar(year) => ObsTime::Scalar(Epoch::from_decimal_year(year)),
            ObsTimeSpec::PerRow => ObsTime::PerRow(obstimes),
        },
        magnitudes: header
            .filters
            .iter()
            .zip(mag_values)
            .map(|(filter, values)| MagColumn {
                filter: filter.clone(),
                values,
            })
            .collect(),
        errors: header
            .error_fields
            .iter()
            .zip(err_values)
            .map(|(field, values)| ErrorColumn {
                field: field.clone(),
                values,
            })
            .collect(),
        meta: header.meta.clone(),
    })
}

fn parse_f64(field: Option<&str>, line: usize) -> Result<f64> {
    let text = field.ok_or_else(|| CatalogError::Parse {
        line,
        reason: "truncated record".to_string(),
    })?;
    text.parse().map_err(|_| CatalogError::Parse {
        line,
        reason: format!("'{text}' is not a number"),
    })
}

fn csv_io_error(e: csv::Error) -> CatalogError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => CatalogError::Io(io),
        other => CatalogError::Parse {
            line: 0,
            reason: format!("{other:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CoordinateArrays;
    use crate::table::CatalogMeta;

    fn sample() -> Catalog {
        let mut catalog = Catalog::from_coordinates(CoordinateArrays {
            ra: vec![10.123456789012345, 250.0],
            dec: vec![-45.6, 33.3],
            mag: Some(vec![7.25, f64::NAN]),
            pm_ra_cosdec: Some(vec![101.5, -42.0]),
            pm_dec: Some(vec![-7.75, 0.125]),
            distance: Some(vec![14.2, 10000.0]),
            obstime: Epoch::from_decimal_year(2015.5),
            ..Default::default()
        })
        .unwrap();
        // exercise metadata round-tripping too
        let meta = CatalogMeta {
            name: "sample".to_string(),
            center_deg: Some((10.0, -45.0)),
            radius_deg: Some(0.25),
            query: Some("SELECT *".to_string()),
            ..CatalogMeta::custom()
        };
        let mut table = catalog.table().clone();
        table.meta = meta;
        catalog = Catalog::new(table).unwrap();
        catalog
    }

    #[test]
    fn round_trip_preserves_table_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");

        let catalog = sample();
        catalog.write_to_text(&path).unwrap();
        let restored = Catalog::from_text(&path).unwrap();

        assert_eq!(restored.ra(), catalog.ra());
        assert_eq!(restored.dec(), catalog.dec());
        assert_eq!(restored.pm_ra_cosdec(), catalog.pm_ra_cosdec());
        assert_eq!(restored.distance(), catalog.distance());
        assert_eq!(restored.obstime(), catalog.obstime());
        assert_eq!(restored.meta(), catalog.meta());
        // NaN magnitudes survive the trip
        assert!(restored.magnitude()[1].is_nan());
        assert_eq!(restored.magnitude()[0], catalog.magnitude()[0]);
    }

    #[test]
    fn round_trip_then_propagate_matches_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");

        let catalog = sample();
        catalog.write_to_text(&path).unwrap();
        let restored = Catalog::from_text(&path).unwrap();

        let a = catalog.at_epoch(2087.25);
        let b = restored.at_epoch(2087.25);
        assert_eq!(a.ra(), b.ra());
        assert_eq!(a.dec(), b.dec());
    }

    #[test]
    fn per_row_obstime_round_trips() {
        let mut table = sample().table().clone();
        table.obstime = ObsTime::PerRow(vec![
            Epoch::from_decimal_year(2015.5),
            Epoch::from_decimal_year(1991.25),
        ]);
        let catalog = Catalog::new(table).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("per_row.txt");
        catalog.write_to_text(&path).unwrap();
        let restored = Catalog::from_text(&path).unwrap();
        assert_eq!(restored.obstime(), catalog.obstime());
    }

    #[test]
    fn missing_magic_line_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.txt");
        std::fs::write(&path, "ra,dec\n1.0,2.0\n").unwrap();
        assert!(matches!(
            Catalog::from_text(&path),
            Err(CatalogError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Catalog::from_text("/nonexistent/catalog.txt"),
            Err(CatalogError::Io(_))
        ));
    }
}
