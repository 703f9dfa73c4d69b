//! Writers for contact metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use pflow_algorithms::{ClusterContact, ContactRecord};
use serde::Serialize;

use crate::Result;

/// One evaluated pair as written to JSON.
#[derive(Debug, Serialize)]
struct ContactEntry<'a> {
    daughter: usize,
    parent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<&'a ClusterContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a ContactRecord> for ContactEntry<'a> {
    fn from(record: &'a ContactRecord) -> Self {
        let (contact, error) = match &record.result {
            Ok(contact) => (Some(contact), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            daughter: record.pair.daughter,
            parent: record.pair.parent,
            contact,
            error,
        }
    }
}

/// Writer for contact metrics.
pub struct ContactFileWriter {
    writer: BufWriter<File>,
}

impl ContactFileWriter {
    /// Creates a new file writer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes every record as a JSON array; failed pairs carry their error.
    pub fn write_contacts_json(&mut self, records: &[ContactRecord]) -> Result<()> {
        let entries: Vec<ContactEntry<'_>> = records.iter().map(ContactEntry::from).collect();
        serde_json::to_writer_pretty(&mut self.writer, &entries)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes successful contacts as CSV, one row per pair.
    pub fn write_contacts_csv(&mut self, records: &[ContactRecord]) -> Result<()> {
        writeln!(
            self.writer,
            "daughter,parent,parent_cluster_energy,cone_fraction_1,cone_fraction_2,cone_fraction_3,\
             n_contact_layers,contact_fraction,close_hit_fraction_1,close_hit_fraction_2,\
             distance_to_closest_hit,mean_distance_to_helix,closest_distance_to_helix,parent_track_energy"
        )?;

        for record in records {
            let Ok(c) = &record.result else {
                continue;
            };
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                record.pair.daughter,
                record.pair.parent,
                c.parent_cluster_energy(),
                c.cone_fraction_1(),
                c.cone_fraction_2(),
                c.cone_fraction_3(),
                c.n_contact_layers(),
                c.contact_fraction(),
                c.close_hit_fraction_1(),
                c.close_hit_fraction_2(),
                c.distance_to_closest_hit(),
                c.mean_distance_to_helix(),
                c.closest_distance_to_helix(),
                c.parent_track_energy()
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
