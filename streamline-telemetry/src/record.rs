/// One telemetry observation: a single message crossing a node's receive or
/// transmit boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Wall-clock time of the observation, in seconds since the epoch.
    pub ts: f64,
    /// The event kind, e.g. `"rx"` or `"tx"`.
    pub event: String,
    /// The node that observed the message.
    pub node: String,
    /// The node that created the message.
    pub origin: String,
    /// The message's own identifier.
    pub message_id: i64,
    /// The lineage identifier of the data source event the message descends
    /// from, if it has been stamped yet.
    pub data_source_id: Option<i64>,
    /// Size of the message's payload, in bytes.
    pub size_bytes: u64,
}

impl TelemetryRecord {
    /// Render this record as the row a [`crate::CsvTelemetryManager`] writes
    /// for it, in column order `ts,evt,node,origin,msg_id,src_id,size`.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.ts,
            self.event,
            csv_escape(&self.node),
            csv_escape(&self.origin),
            self.message_id,
            self.data_source_id.map(|id| id.to_string()).unwrap_or_default(),
            self.size_bytes,
        )
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
