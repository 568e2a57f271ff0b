//! CSV Connector - Chunked record parser over a decompressed archive stream
//!
//! Columns are found by alias rather than position, and every row is
//! validated once here so later stages receive typed `RawRow`s.

use crate::error::{RegistryError, Result};
use crate::ingestion::archive::ArchiveStream;
use crate::ingestion::connector::{Checkpoint, ConnectorResult, IngestionConnector};
use crate::vessel::{coerce_mmsi, parse_type_code, registry_key, strip_imo, RawRow};
use csv::{ByteRecord, Reader, ReaderBuilder};
use lazy_static::lazy_static;
use std::io::Read;
use tracing::warn;

lazy_static! {
    /// Accepted header names per logical field, first match wins.
    static ref MMSI_ALIASES: Vec<&'static str> = vec!["MMSI", "mmsi"];
    static ref VESSEL_NAME_ALIASES: Vec<&'static str> =
        vec!["VesselName", "Vessel Name", "vessel_name", "NAME", "name"];
    static ref IMO_ALIASES: Vec<&'static str> = vec!["IMO", "imo"];
    static ref VESSEL_TYPE_ALIASES: Vec<&'static str> =
        vec!["VesselType", "Vessel Type", "vessel_type", "TYPE", "type"];
}

/// Column positions of the four logical fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub mmsi: Option<usize>,
    pub vessel_name: Option<usize>,
    pub imo: Option<usize>,
    pub vessel_type: Option<usize>,
}

impl ColumnMap {
    /// Resolve columns from trimmed header names (exact, case-sensitive).
    pub fn resolve<'a>(headers: impl IntoIterator<Item = &'a str> + Clone) -> Self {
        let find = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| {
                headers
                    .clone()
                    .into_iter()
                    .position(|header| header.trim() == *alias)
            })
        };

        Self {
            mmsi: find(MMSI_ALIASES.as_slice()),
            vessel_name: find(VESSEL_NAME_ALIASES.as_slice()),
            imo: find(IMO_ALIASES.as_slice()),
            vessel_type: find(VESSEL_TYPE_ALIASES.as_slice()),
        }
    }

    /// Logical fields without which a batch cannot be used.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.vessel_type.is_none() {
            missing.push("VesselType");
        }
        if self.mmsi.is_none() {
            missing.push("MMSI");
        }
        missing
    }

    /// Validate one record. `None` means the row is malformed.
    pub fn parse_row(&self, record: &ByteRecord) -> Option<RawRow> {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|bytes| std::str::from_utf8(bytes).ok())
        };

        let mmsi = field(self.mmsi).and_then(coerce_mmsi)?;
        let vessel_name = field(self.vessel_name).and_then(registry_key)?;
        let imo = field(self.imo).and_then(strip_imo);
        let vessel_type_code = field(self.vessel_type).and_then(parse_type_code);

        Some(RawRow {
            mmsi,
            vessel_name,
            imo,
            vessel_type_code,
        })
    }
}

/// CSV Connector - reads bounded batches from an archive stream.
pub struct CsvConnector<R: Read> {
    source_id: String,
    source_uri: Option<String>,
    reader: Reader<R>,
    columns: ColumnMap,
    chunk_rows: usize,
    record: ByteRecord,
    checkpoint: Checkpoint,
    finished: bool,
}

impl CsvConnector<ArchiveStream> {
    /// Read the header row of an archive and resolve its columns.
    pub fn from_archive(
        stream: ArchiveStream,
        source_uri: Option<String>,
        chunk_rows: usize,
    ) -> Result<Self> {
        let source_id = stream.source_id().to_string();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .buffer_capacity(1 << 20)
            .from_reader(stream);

        let headers = match reader.byte_headers().map(|h| h.clone()) {
            Ok(headers) => headers,
            Err(e) => return Err(reader.get_ref().classify(e)),
        };

        let names: Vec<String> = headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        let columns = ColumnMap::resolve(names.iter().map(String::as_str));

        Ok(Self::with_columns(source_id, source_uri, reader, columns, chunk_rows))
    }
}

impl<R: Read> CsvConnector<R> {
    fn with_columns(
        source_id: String,
        source_uri: Option<String>,
        reader: Reader<R>,
        columns: ColumnMap,
        chunk_rows: usize,
    ) -> Self {
        Self {
            source_id,
            source_uri,
            reader,
            columns,
            chunk_rows: chunk_rows.max(1),
            record: ByteRecord::new(),
            checkpoint: Checkpoint::default(),
            finished: false,
        }
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    fn done(&self) -> ConnectorResult {
        ConnectorResult {
            rows: Vec::new(),
            checkpoint: self.checkpoint.clone(),
            has_more: false,
        }
    }

    fn read_error(&self, err: csv::Error) -> RegistryError {
        RegistryError::CorruptStream {
            source_id: self.source_id.clone(),
            reason: err.to_string(),
        }
    }
}

impl IngestionConnector for CsvConnector<ArchiveStream> {
    fn fetch(&mut self) -> Result<ConnectorResult> {
        if self.finished {
            return Ok(self.done());
        }

        let missing = self.columns.missing_required();
        if !missing.is_empty() {
            // The header is shared by every batch, so every batch would be
            // dropped; stop before decompressing the rest of the archive.
            let err = RegistryError::MalformedBatch(format!(
                "{}: header lacks {}",
                self.source_id,
                missing.join(", ")
            ));
            warn!("Skipping batches: {}", err);
            self.checkpoint.batches += 1;
            self.checkpoint.batches_skipped += 1;
            self.finished = true;
            return Ok(self.done());
        }

        let mut rows = Vec::with_capacity(self.chunk_rows.min(4096));
        let mut read_in_batch = 0usize;

        while read_in_batch < self.chunk_rows {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    read_in_batch += 1;
                    match self.columns.parse_row(&self.record) {
                        Some(row) => rows.push(row),
                        None => self.checkpoint.rows_dropped += 1,
                    }
                }
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    return Err(match e.kind() {
                        csv::ErrorKind::Io(_) => self.reader.get_ref().classify(e),
                        _ => self.read_error(e),
                    });
                }
            }
        }

        self.checkpoint.rows_read += read_in_batch as u64;
        if read_in_batch > 0 {
            self.checkpoint.batches += 1;
        }

        Ok(ConnectorResult {
            rows,
            checkpoint: self.checkpoint.clone(),
            has_more: !self.finished,
        })
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_type(&self) -> &str {
        "csv"
    }

    fn source_uri(&self) -> Option<&str> {
        self.source_uri.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn connector(csv_text: &'static str, chunk_rows: usize) -> CsvConnector<ArchiveStream> {
        let stream = ArchiveStream::new("test.csv", Box::new(Cursor::new(csv_text.as_bytes())));
        CsvConnector::from_archive(stream, None, chunk_rows).unwrap()
    }

    fn drain(mut connector: CsvConnector<ArchiveStream>) -> (Vec<Vec<RawRow>>, Checkpoint) {
        let mut batches = Vec::new();
        loop {
            let result = connector.fetch().unwrap();
            if !result.rows.is_empty() {
                batches.push(result.rows);
            }
            if !result.has_more {
                return (batches, result.checkpoint);
            }
        }
    }

    #[test]
    fn test_resolve_prefers_first_alias() {
        let columns = ColumnMap::resolve(["name", " VesselName ", "mmsi", "TYPE", "IMO"]);
        assert_eq!(columns.vessel_name, Some(1));
        assert_eq!(columns.mmsi, Some(2));
        assert_eq!(columns.vessel_type, Some(3));
        assert_eq!(columns.imo, Some(4));
        assert!(columns.missing_required().is_empty());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let columns = ColumnMap::resolve(["Mmsi", "VESSELTYPE"]);
        assert_eq!(columns.missing_required(), vec!["VesselType", "MMSI"]);
    }

    #[test]
    fn test_batches_are_bounded() {
        let (batches, checkpoint) = drain(connector(
            "MMSI,VesselName,VesselType\n1,A,70\n2,B,71\n3,C,72\n4,D,73\n5,E,74\n",
            2,
        ));
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(checkpoint.rows_read, 5);
        assert_eq!(checkpoint.batches, 3);
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let (batches, checkpoint) = drain(connector(
            "MMSI,VesselName,IMO,VesselType\n\
             ,NO MMSI,,70\n\
             abc,BAD MMSI,,70\n\
             1e30,HUGE MMSI,,70\n\
             7,nan,,70\n\
             8,   ,,70\n\
             9.0, ever web ,IMO 9703291,71.0\n",
            100,
        ));
        assert_eq!(checkpoint.rows_dropped, 5);
        let rows: Vec<RawRow> = batches.into_iter().flatten().collect();
        assert_eq!(
            rows,
            vec![RawRow {
                mmsi: "9".to_string(),
                vessel_name: "EVER WEB".to_string(),
                imo: Some("9703291".to_string()),
                vessel_type_code: Some(71),
            }]
        );
    }

    #[test]
    fn test_missing_required_column_skips_batches() {
        let mut connector = connector("MMSI,VesselName\n1,A\n2,B\n", 1);
        let result = connector.fetch().unwrap();
        assert!(result.rows.is_empty());
        assert!(!result.has_more);
        assert_eq!(result.checkpoint.batches_skipped, 1);
        assert_eq!(result.checkpoint.rows_read, 0);
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let (batches, checkpoint) = drain(connector(
            "MMSI,VesselName,VesselType\n1,A\n2,B,70\n",
            10,
        ));
        assert_eq!(checkpoint.rows_read, 2);
        let rows: Vec<RawRow> = batches.into_iter().flatten().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vessel_type_code, None);
        assert_eq!(rows[1].vessel_type_code, Some(70));
    }
}
