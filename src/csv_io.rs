//! CSV interchange (§6.2): `items.csv`, `containers.csv`,
//! `cargo_arrangement.csv`, `waste_items.csv`, `logs.csv`. Column names and
//! the `coordinates`/`position` string formats are the adapter's external
//! contract and are independent of the in-memory model's field names.

use std::fs::OpenOptions;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;
use crate::geometry;
use crate::model::{Container, Item, Orientation, Placement, WasteEntry, WasteReason};
use crate::world::normalize_item_id;

fn csv_err(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::invalid_input(format!("{context}: {err}"))
}

fn format_triple(p: (f64, f64, f64)) -> String {
    format!("{:.3},{:.3},{:.3}", p.0, p.1, p.2)
}

fn parse_triple(raw: &str) -> Result<(f64, f64, f64), CoreError> {
    let nums: Vec<f64> = raw
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| csv_err("malformed coordinate triple", e))?;
    match nums[..] {
        [x, y, z] => Ok((x, y, z)),
        _ => Err(CoreError::invalid_input(format!(
            "expected exactly 3 coordinate components, got '{raw}'"
        ))),
    }
}

fn format_position(p: (f64, f64, f64)) -> String {
    format!("({})", format_triple(p))
}

fn parse_position(raw: &str) -> Result<(f64, f64, f64), CoreError> {
    let inner = raw
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| CoreError::invalid_input(format!("malformed position '{raw}'")))?;
    parse_triple(inner)
}

fn format_coordinates(min_corner: (f64, f64, f64), dims: (f64, f64, f64)) -> String {
    let max_corner = (min_corner.0 + dims.0, min_corner.1 + dims.1, min_corner.2 + dims.2);
    format!("({}),({})", format_triple(min_corner), format_triple(max_corner))
}

fn parse_coordinates(raw: &str) -> Result<((f64, f64, f64), (f64, f64, f64)), CoreError> {
    let inner = raw
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| CoreError::invalid_input(format!("malformed coordinates '{raw}'")))?;
    let parts: Vec<&str> = inner.split("),(").collect();
    let [lo, hi] = parts[..] else {
        return Err(CoreError::invalid_input(format!("malformed coordinates '{raw}'")));
    };
    Ok((parse_triple(lo)?, parse_triple(hi)?))
}

/// The orientation whose permutation of `item`'s catalog dims matches
/// `effective_dims`, for reconstructing a `Placement` from a CSV row that
/// carries no orientation column of its own.
fn resolve_orientation(item: &Item, effective_dims: (f64, f64, f64)) -> Orientation {
    Orientation::ALL
        .into_iter()
        .find(|o| {
            let d = o.apply(item.width, item.depth, item.height);
            (d.0 - effective_dims.0).abs() < geometry::EPSILON
                && (d.1 - effective_dims.1).abs() < geometry::EPSILON
                && (d.2 - effective_dims.2).abs() < geometry::EPSILON
        })
        .unwrap_or(Orientation::Wdh)
}

#[derive(Deserialize)]
struct ItemRow {
    #[serde(rename = "itemId")]
    item_id: String,
    name: String,
    width: f64,
    depth: f64,
    height: f64,
    mass: f64,
    priority: u8,
    #[serde(rename = "preferredZone")]
    preferred_zone: String,
    #[serde(rename = "expiryDate", default)]
    expiry_date: Option<DateTime<Utc>>,
    #[serde(rename = "usageLimit", default)]
    usage_limit: Option<u32>,
}

#[derive(Serialize)]
struct ItemRowOut {
    #[serde(rename = "itemId")]
    item_id: String,
    name: String,
    width: f64,
    depth: f64,
    height: f64,
    mass: f64,
    priority: u8,
    #[serde(rename = "preferredZone")]
    preferred_zone: String,
    #[serde(rename = "expiryDate")]
    expiry_date: Option<DateTime<Utc>>,
    #[serde(rename = "usageLimit")]
    usage_limit: u32,
}

/// Reads `items.csv`. A missing `usageLimit` column means unlimited uses.
pub fn read_items(path: impl AsRef<Path>) -> Result<Vec<Item>, CoreError> {
    let mut reader = ReaderBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("opening items.csv", e))?;
    let mut items = Vec::new();
    for record in reader.deserialize::<ItemRow>() {
        let row = record.map_err(|e| csv_err("parsing items.csv row", e))?;
        let id = normalize_item_id(&row.item_id)?;
        items.push(Item::new(
            id,
            row.name,
            row.width,
            row.depth,
            row.height,
            row.mass,
            row.priority,
            row.preferred_zone,
            row.expiry_date,
            row.usage_limit.unwrap_or(u32::MAX),
        )?);
    }
    Ok(items)
}

pub fn write_items(path: impl AsRef<Path>, items: &[Item]) -> Result<(), CoreError> {
    let mut writer = WriterBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("creating items.csv", e))?;
    for item in items {
        writer
            .serialize(ItemRowOut {
                item_id: item.id.clone(),
                name: item.name.clone(),
                width: item.width,
                depth: item.depth,
                height: item.height,
                mass: item.mass,
                priority: item.priority,
                preferred_zone: item.preferred_zone.clone(),
                expiry_date: item.expiry_date,
                usage_limit: item.usage_limit,
            })
            .map_err(|e| csv_err("writing items.csv row", e))?;
    }
    writer.flush().map_err(|e| csv_err("flushing items.csv", e))
}

#[derive(Deserialize, Serialize)]
struct ContainerRow {
    #[serde(rename = "containerId")]
    container_id: String,
    zone: String,
    width: f64,
    depth: f64,
    height: f64,
}

pub fn read_containers(path: impl AsRef<Path>) -> Result<Vec<Container>, CoreError> {
    let mut reader = ReaderBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("opening containers.csv", e))?;
    let mut containers = Vec::new();
    for record in reader.deserialize::<ContainerRow>() {
        let row = record.map_err(|e| csv_err("parsing containers.csv row", e))?;
        containers.push(Container::new(row.container_id, row.zone, row.width, row.depth, row.height)?);
    }
    Ok(containers)
}

pub fn write_containers(path: impl AsRef<Path>, containers: &[Container]) -> Result<(), CoreError> {
    let mut writer = WriterBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("creating containers.csv", e))?;
    for container in containers {
        writer
            .serialize(ContainerRow {
                container_id: container.id.clone(),
                zone: container.zone.clone(),
                width: container.width,
                depth: container.depth,
                height: container.height,
            })
            .map_err(|e| csv_err("writing containers.csv row", e))?;
    }
    writer.flush().map_err(|e| csv_err("flushing containers.csv", e))
}

#[derive(Deserialize, Serialize)]
struct CargoArrangementRow {
    #[serde(rename = "itemId")]
    item_id: String,
    zone: String,
    #[serde(rename = "containerId")]
    container_id: String,
    coordinates: String,
}

/// Reads `cargo_arrangement.csv`. `items` resolves each row back to an
/// `Orientation`, since the column set carries only the effective box, not
/// which of the (<=6) permutations produced it.
pub fn read_cargo_arrangement(path: impl AsRef<Path>, items: &[Item]) -> Result<Vec<Placement>, CoreError> {
    let mut reader = ReaderBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("opening cargo_arrangement.csv", e))?;
    let mut placements = Vec::new();
    for record in reader.deserialize::<CargoArrangementRow>() {
        let row = record.map_err(|e| csv_err("parsing cargo_arrangement.csv row", e))?;
        let (min_corner, max_corner) = parse_coordinates(&row.coordinates)?;
        let effective_dims = (
            max_corner.0 - min_corner.0,
            max_corner.1 - min_corner.1,
            max_corner.2 - min_corner.2,
        );
        let item_id = normalize_item_id(&row.item_id)?;
        let orientation = items
            .iter()
            .find(|i| i.id == item_id)
            .map(|item| resolve_orientation(item, effective_dims))
            .unwrap_or(Orientation::Wdh);
        placements.push(Placement {
            item_id,
            container_id: row.container_id,
            orientation,
            min_corner,
            effective_dims,
        });
    }
    Ok(placements)
}

pub fn write_cargo_arrangement(
    path: impl AsRef<Path>,
    placements: &[Placement],
    containers: &[Container],
) -> Result<(), CoreError> {
    let mut writer = WriterBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("creating cargo_arrangement.csv", e))?;
    for placement in placements {
        let zone = containers
            .iter()
            .find(|c| c.id == placement.container_id)
            .map(|c| c.zone.clone())
            .unwrap_or_default();
        writer
            .serialize(CargoArrangementRow {
                item_id: placement.item_id.clone(),
                zone,
                container_id: placement.container_id.clone(),
                coordinates: format_coordinates(placement.min_corner, placement.effective_dims),
            })
            .map_err(|e| csv_err("writing cargo_arrangement.csv row", e))?;
    }
    writer.flush().map_err(|e| csv_err("flushing cargo_arrangement.csv", e))
}

#[derive(Deserialize, Serialize)]
struct WasteRow {
    #[serde(rename = "itemId")]
    item_id: String,
    name: String,
    reason: String,
    #[serde(rename = "containerId")]
    container_id: String,
    position: String,
}

fn reason_to_str(reason: WasteReason) -> &'static str {
    match reason {
        WasteReason::Expired => "expired",
        WasteReason::OutOfUses => "out-of-uses",
        WasteReason::Damaged => "damaged",
        WasteReason::Manual => "manual",
    }
}

fn reason_from_str(raw: &str) -> Result<WasteReason, CoreError> {
    match raw {
        "expired" => Ok(WasteReason::Expired),
        "out-of-uses" => Ok(WasteReason::OutOfUses),
        "damaged" => Ok(WasteReason::Damaged),
        "manual" => Ok(WasteReason::Manual),
        other => Err(CoreError::invalid_input(format!("unknown waste reason '{other}'"))),
    }
}

pub fn read_waste(path: impl AsRef<Path>) -> Result<Vec<WasteEntry>, CoreError> {
    let mut reader = ReaderBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("opening waste_items.csv", e))?;
    let mut out = Vec::new();
    for record in reader.deserialize::<WasteRow>() {
        let row = record.map_err(|e| csv_err("parsing waste_items.csv row", e))?;
        out.push(WasteEntry {
            item_id: normalize_item_id(&row.item_id)?,
            name: row.name,
            reason: reason_from_str(&row.reason)?,
            container_id: row.container_id,
            position: parse_position(&row.position)?,
        });
    }
    Ok(out)
}

/// Overwrites `waste_items.csv` with the full current manifest. The waste
/// list is derived fresh from the world on every classification pass, so
/// there is nothing to append to (§4.G: the core only classifies).
pub fn write_waste(path: impl AsRef<Path>, entries: &[WasteEntry]) -> Result<(), CoreError> {
    let mut writer = WriterBuilder::new()
        .from_path(path.as_ref())
        .map_err(|e| csv_err("creating waste_items.csv", e))?;
    for entry in entries {
        writer
            .serialize(WasteRow {
                item_id: entry.item_id.clone(),
                name: entry.name.clone(),
                reason: reason_to_str(entry.reason).to_string(),
                container_id: entry.container_id.clone(),
                position: format_position(entry.position),
            })
            .map_err(|e| csv_err("writing waste_items.csv row", e))?;
    }
    writer.flush().map_err(|e| csv_err("flushing waste_items.csv", e))
}

/// One parsed/about-to-be-written row of `logs.csv`.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action_type: String,
    #[serde(rename = "itemId")]
    pub item_id: Option<String>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

#[derive(Deserialize, Serialize)]
struct LogRow {
    timestamp: String,
    user_id: String,
    action_type: String,
    #[serde(rename = "itemId")]
    item_id: i64,
    details: String,
}

impl LogEntry {
    fn to_row(&self) -> LogRow {
        let item_id = self
            .item_id
            .as_deref()
            .and_then(|id| id.parse::<i64>().ok())
            .unwrap_or(0);
        LogRow {
            timestamp: self.timestamp.to_rfc3339(),
            user_id: self.user_id.clone(),
            action_type: self.action_type.clone(),
            item_id,
            details: self.details.to_string(),
        }
    }

    fn from_row(row: LogRow) -> Result<Self, CoreError> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| csv_err("parsing logs.csv timestamp", e))?
            .with_timezone(&Utc);
        let details: serde_json::Value =
            serde_json::from_str(&row.details).map_err(|e| csv_err("parsing logs.csv details JSON", e))?;
        Ok(Self {
            timestamp,
            user_id: row.user_id,
            action_type: row.action_type,
            item_id: if row.item_id == 0 { None } else { Some(row.item_id.to_string()) },
            details,
        })
    }
}

/// Appends one row, writing a header only when the file did not already
/// exist (mirrors the Python reference's rewrite-whole-dataframe approach,
/// generalized to an append since this adapter never holds the whole log in
/// memory between requests).
pub fn append_log(path: impl AsRef<Path>, entry: &LogEntry) -> Result<(), CoreError> {
    let path = path.as_ref();
    let needs_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| csv_err("opening logs.csv", e))?;
    let mut writer = WriterBuilder::new().has_headers(needs_header).from_writer(file);
    writer
        .serialize(entry.to_row())
        .map_err(|e| csv_err("writing logs.csv row", e))?;
    writer.flush().map_err(|e| csv_err("flushing logs.csv", e))
}

pub fn read_logs(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, CoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| csv_err("opening logs.csv", e))?;
    let mut out = Vec::new();
    for record in reader.deserialize::<LogRow>() {
        let row = record.map_err(|e| csv_err("parsing logs.csv row", e))?;
        out.push(LogEntry::from_row(row)?);
    }
    Ok(out)
}

/// Truncates the log file to nothing (`/api/clear`, §6).
pub fn clear_logs(path: impl AsRef<Path>) -> Result<(), CoreError> {
    delete_if_exists(path)
}

/// Removes a file if present; a no-op otherwise. Used by `/api/clear` to
/// drop imported `items.csv`/`containers.csv`/`cargo_arrangement.csv` copies
/// alongside the log.
pub fn delete_if_exists(path: impl AsRef<Path>) -> Result<(), CoreError> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| csv_err(&format!("removing {}", path.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn items_round_trip_through_csv() {
        let file = NamedTempFile::new().unwrap();
        let items = vec![
            Item::new("1", "widget", 2.0, 3.0, 4.0, 1.5, 50, "Z", None, 3).unwrap(),
            Item::new("2", "gadget", 1.0, 1.0, 1.0, 0.5, 10, "Z", None, 1).unwrap(),
        ];
        write_items(file.path(), &items).unwrap();
        let read_back = read_items(file.path()).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].id, "1");
        assert_eq!(read_back[1].name, "gadget");
    }

    #[test]
    fn containers_round_trip_through_csv() {
        let file = NamedTempFile::new().unwrap();
        let containers = vec![Container::new("C1", "Z", 10.0, 10.0, 10.0).unwrap()];
        write_containers(file.path(), &containers).unwrap();
        let read_back = read_containers(file.path()).unwrap();
        assert_eq!(read_back[0].id, "C1");
        assert_eq!(read_back[0].zone, "Z");
    }

    #[test]
    fn cargo_arrangement_round_trip_preserves_box() {
        let file = NamedTempFile::new().unwrap();
        let containers = vec![Container::new("C1", "Z", 10.0, 10.0, 10.0).unwrap()];
        let items = vec![Item::new("1", "widget", 2.0, 3.0, 4.0, 1.0, 50, "Z", None, 1).unwrap()];
        let placements = vec![Placement {
            item_id: "1".into(),
            container_id: "C1".into(),
            orientation: Orientation::Wdh,
            min_corner: (0.0, 0.0, 0.0),
            effective_dims: (2.0, 3.0, 4.0),
        }];
        write_cargo_arrangement(file.path(), &placements, &containers).unwrap();
        let read_back = read_cargo_arrangement(file.path(), &items).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].min_corner, (0.0, 0.0, 0.0));
        assert_eq!(read_back[0].effective_dims, (2.0, 3.0, 4.0));
        assert_eq!(read_back[0].orientation, Orientation::Wdh);
    }

    #[test]
    fn waste_round_trip_preserves_reason() {
        let file = NamedTempFile::new().unwrap();
        let entries = vec![WasteEntry {
            item_id: "1".into(),
            name: "widget".into(),
            reason: WasteReason::Expired,
            container_id: "C1".into(),
            position: (1.0, 2.0, 3.0),
        }];
        write_waste(file.path(), &entries).unwrap();
        let read_back = read_waste(file.path()).unwrap();
        assert_eq!(read_back[0].reason, WasteReason::Expired);
        assert_eq!(read_back[0].position, (1.0, 2.0, 3.0));
    }

    #[test]
    fn log_append_then_read_preserves_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.csv");
        let entry = LogEntry {
            timestamp: Utc::now(),
            user_id: "alice".into(),
            action_type: "place".into(),
            item_id: Some("42".into()),
            details: serde_json::json!({"containerId": "C1"}),
        };
        append_log(&path, &entry).unwrap();
        let read_back = read_logs(&path).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].user_id, "alice");
        assert_eq!(read_back[0].item_id, Some("42".into()));
    }

    #[test]
    fn log_with_no_item_id_writes_zero_and_reads_back_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.csv");
        let entry = LogEntry {
            timestamp: Utc::now(),
            user_id: "bob".into(),
            action_type: "clear".into(),
            item_id: None,
            details: serde_json::json!({}),
        };
        append_log(&path, &entry).unwrap();
        let read_back = read_logs(&path).unwrap();
        assert_eq!(read_back[0].item_id, None);
    }

    #[test]
    fn clear_logs_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.csv");
        std::fs::write(&path, "timestamp,user_id,action_type,itemId,details\n").unwrap();
        clear_logs(&path).unwrap();
        assert!(!path.exists());
    }
}
