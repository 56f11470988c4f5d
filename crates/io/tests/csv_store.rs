use std::fs;

use keros_engine::{ColumnKind, RowFilter, Schema, View};
use keros_io::{CsvStore, Store, StoreError};
use keros_recon::{reconcile, EditDelta};
use serde_json::json;
use tempfile::TempDir;

const REGISTER: &str = "\
Date,Area,Trench,Name,Complete,Notes
01.07.2025,Kavos,1,L1,TRUE,first pass
01.07.2025,Dhaskalio,A,L2,FALSE,
02.07.2025,Kavos,2,L3,FALSE,\"wet, dark\"
";

fn schema() -> Schema {
    Schema::new()
        .with_kind("Date", ColumnKind::Date)
        .with_kind("Complete", ColumnKind::Bool)
}

fn setup(content: impl AsRef<[u8]>) -> (TempDir, CsvStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("register.csv");
    fs::write(&path, content).unwrap();
    let store = CsvStore::new(path, schema());
    (dir, store)
}

#[test]
fn save_without_edits_rewrites_identical_bytes() {
    let (_dir, store) = setup(REGISTER);
    let snap = store.load().unwrap();

    let views = vec![
        View::render("All Areas", &snap.table, Vec::new()),
        View::render("Kavos", &snap.table, vec![RowFilter::eq("Area", "Kavos")]),
    ];
    let out = reconcile(&snap.table, &views, &[EditDelta::default(), EditDelta::default()]).unwrap();

    let version = store.save(&out.table, &snap.version).unwrap();
    assert_eq!(version, snap.version);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), REGISTER);
}

/// Load, reconcile with nothing edited, save.
fn save_untouched(store: &CsvStore) {
    let snap = store.load().unwrap();
    let all = View::render("All Areas", &snap.table, Vec::new());
    let out = reconcile(&snap.table, &[all], &[EditDelta::default()]).unwrap();
    let version = store.save(&out.table, &snap.version).unwrap();
    assert_eq!(version, snap.version);
}

#[test]
fn ragged_row_keeps_its_extra_fields() {
    let content = "Area,Name,Complete,Notes\nKavos,L1,TRUE,wet, dark\nSDS,L2,FALSE,\n";
    let (_dir, store) = setup(content);
    save_untouched(&store);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), content);
}

#[test]
fn windows_1252_file_stays_windows_1252() {
    // "Kástro" with á as 0xE1
    let mut content = b"Area,Name,Complete\nK".to_vec();
    content.extend([0xE1]);
    content.extend(b"stro,L1,TRUE\nSDS,L2,FALSE\n");
    let (_dir, store) = setup(&content);

    let snap = store.load().unwrap();
    assert_eq!(snap.table.text_at(0, "Area"), "Kástro");
    save_untouched(&store);
    assert_eq!(fs::read(store.path()).unwrap(), content);

    // An edit is written in the same encoding
    let all = View::render("All Areas", &snap.table, Vec::new());
    let out = reconcile(&snap.table, &[all], &[EditDelta::default().modify(1, "Area", json!("Kástro"))]).unwrap();
    store.save(&out.table, &snap.version).unwrap();
    let written = fs::read(store.path()).unwrap();
    assert_eq!(written.iter().filter(|&&b| b == 0xE1).count(), 2);
    assert!(std::str::from_utf8(&written).is_err());
}

#[test]
fn bom_and_spacer_rows_survive_a_save() {
    let content = "\u{feff}Area,Name,Complete\nKavos,L1,TRUE\n,,\nSDS,L2,FALSE\n";
    let (_dir, store) = setup(content);
    assert_eq!(store.load().unwrap().table.len(), 2);
    save_untouched(&store);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), content);
}

#[test]
fn spacer_stays_put_when_its_row_is_removed() {
    let (_dir, store) = setup("Area,Name\nKavos,L1\nSDS,L2\n,\nKavos,L3\n");
    let snap = store.load().unwrap();
    let sds = View::render("SDS", &snap.table, vec![RowFilter::exact("Area", "SDS")]);
    let out = reconcile(&snap.table, &[sds], &[EditDelta::default().remove(0)]).unwrap();
    store.save(&out.table, &snap.version).unwrap();
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "Area,Name\nKavos,L1\n,\nKavos,L3\n");
}

#[test]
fn edit_creates_configured_flag_column() {
    let (_dir, store) = setup("Area,Name,Complete\nKavos,L1,TRUE\nSDS,L2,FALSE\n");
    let store = CsvStore::new(
        store.path().to_path_buf(),
        schema().with_kind("GIS uploaded", ColumnKind::Bool),
    );
    let snap = store.load().unwrap();
    let all = View::render("All Areas", &snap.table, Vec::new());
    let out = reconcile(&snap.table, &[all], &[EditDelta::default().modify(0, "GIS uploaded", json!("1"))]).unwrap();
    assert_eq!(out.summary.created_columns, vec!["GIS uploaded"]);
    store.save(&out.table, &snap.version).unwrap();

    let expected = "Area,Name,Complete,GIS uploaded\nKavos,L1,TRUE,TRUE\nSDS,L2,FALSE,FALSE\n";
    assert_eq!(fs::read_to_string(store.path()).unwrap(), expected);
    save_untouched(&store);
    assert_eq!(fs::read_to_string(store.path()).unwrap(), expected);
}

#[test]
fn truthy_spellings_normalize_once_then_stay() {
    let (_dir, store) = setup("Name,Complete\nL1,yes\nL2,x\nL3,0\nL4,\n");
    let snap = store.load().unwrap();
    let v1 = store.save(&snap.table, &snap.version).unwrap();
    assert_eq!(
        fs::read_to_string(store.path()).unwrap(),
        "Name,Complete\nL1,TRUE\nL2,TRUE\nL3,FALSE\nL4,FALSE\n"
    );

    let again = store.load().unwrap();
    assert_eq!(again.version, v1);
    assert_eq!(store.save(&again.table, &again.version).unwrap(), v1);
}

#[test]
fn edit_in_tab_is_written_back() {
    let (_dir, store) = setup(REGISTER);
    let snap = store.load().unwrap();
    let kavos = View::render("Kavos", &snap.table, vec![RowFilter::eq("Area", "Kavos")]);

    let delta = EditDelta::default().modify(1, "Complete", json!(true));
    let out = reconcile(&snap.table, &[kavos], &[delta]).unwrap();
    store.save(&out.table, &snap.version).unwrap();

    let reloaded = store.load().unwrap();
    assert_eq!(reloaded.table.text_at(2, "Complete"), "TRUE");
    assert_eq!(reloaded.table.text_at(1, "Complete"), "FALSE");
    assert_eq!(reloaded.table.text_at(2, "Notes"), "wet, dark");
}

#[test]
fn concurrent_change_is_a_version_conflict() {
    let (_dir, store) = setup(REGISTER);
    let snap = store.load().unwrap();

    // Someone else saved in the meantime
    let theirs = format!("{REGISTER}03.07.2025,SDS,B,L4,FALSE,\n");
    fs::write(store.path(), &theirs).unwrap();

    let err = store.save(&snap.table, &snap.version).unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), theirs);
}

#[test]
fn read_only_dataset_is_never_written() {
    let (_dir, store) = setup(REGISTER);
    let store = store.read_only(true);
    let snap = store.load().unwrap();

    let err = store.save(&snap.table, &snap.version).unwrap_err();
    assert!(matches!(err, StoreError::ReadOnly { .. }));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), REGISTER);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let store = CsvStore::new(dir.path().join("absent.csv"), schema());
    assert!(matches!(store.load().unwrap_err(), StoreError::Read { .. }));
}

#[test]
fn semicolon_crlf_layout_survives_a_save() {
    let content = "Area;Name;Complete\r\nKavos;L1;TRUE\r\nSDS;L2;FALSE\r\n";
    let (_dir, store) = setup(content);
    let snap = store.load().unwrap();

    let all = View::render("All Areas", &snap.table, Vec::new());
    let out = reconcile(&snap.table, &[all], &[EditDelta::default().remove(0)]).unwrap();
    store.save(&out.table, &snap.version).unwrap();

    assert_eq!(
        fs::read_to_string(store.path()).unwrap(),
        "Area;Name;Complete\r\nSDS;L2;FALSE\r\n"
    );
}
