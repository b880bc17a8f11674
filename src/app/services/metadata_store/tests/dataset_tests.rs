//! Tests for dataset creation, lookup and removal

use super::*;
use crate::Error;
use crate::app::models::DatasetKind;
use crate::app::services::metadata_store::TemporalDatabaseConnection;
use crate::app::services::metadata_store::schema::schema_version;
use crate::constants::SCHEMA_VERSION;
use tempfile::TempDir;

#[test]
fn test_create_and_get_dataset() {
    let mut store = store();
    store.create_dataset(&absolute_dataset("A"), false).unwrap();

    let dataset = store.get_dataset("A@PERMANENT").unwrap();
    assert_eq!(dataset.kind, DatasetKind::Strds);
    assert_eq!(dataset.title, "Dataset A");
    assert_eq!(dataset.aggregate.map_count, 0);
    assert!(dataset.aggregate.extent.is_none());
}

#[test]
fn test_unknown_dataset() {
    let store = store();
    assert!(matches!(
        store.get_dataset("missing@PERMANENT"),
        Err(Error::UnknownDataset { .. })
    ));
    assert!(store.find_dataset("missing@PERMANENT").unwrap().is_none());
}

#[test]
fn test_create_requires_overwrite() {
    let mut store = store();
    store.create_dataset(&absolute_dataset("A"), false).unwrap();
    assert!(matches!(
        store.create_dataset(&absolute_dataset("A"), false),
        Err(Error::Registration { .. })
    ));

    store.register_maps("A@PERMANENT", &four_months()).unwrap();
    store
        .create_dataset(&absolute_dataset("A").with_title("replaced"), true)
        .unwrap();
    let dataset = store.get_dataset("A@PERMANENT").unwrap();
    assert_eq!(dataset.title, "replaced");
    assert_eq!(dataset.aggregate.map_count, 0);
    assert!(store.owner_of("a1@PERMANENT").unwrap().is_none());
}

#[test]
fn test_unqualified_dataset_id_is_rejected() {
    let mut store = store();
    let dataset = crate::app::models::SpaceTimeDataset::new(
        "A",
        DatasetKind::Strds,
        crate::app::models::TemporalType::Absolute,
    );
    assert!(matches!(
        store.create_dataset(&dataset, false),
        Err(Error::InvalidValue { .. })
    ));
}

#[test]
fn test_list_datasets_by_kind() {
    let mut store = store();
    store.create_dataset(&absolute_dataset("B"), false).unwrap();
    store.create_dataset(&absolute_dataset("A"), false).unwrap();
    let vector = crate::app::models::SpaceTimeDataset::new(
        "V@PERMANENT",
        DatasetKind::Stvds,
        crate::app::models::TemporalType::Absolute,
    );
    store.create_dataset(&vector, false).unwrap();

    let all: Vec<String> = store
        .list_datasets(None)
        .unwrap()
        .into_iter()
        .map(|dataset| dataset.id)
        .collect();
    assert_eq!(all, vec!["A@PERMANENT", "B@PERMANENT", "V@PERMANENT"]);

    let vectors = store.list_datasets(Some(DatasetKind::Stvds)).unwrap();
    assert_eq!(vectors.len(), 1);
    assert_eq!(vectors[0].id, "V@PERMANENT");
}

#[test]
fn test_remove_dataset_detaches_maps() {
    let mut store = store();
    store.create_dataset(&absolute_dataset("A"), false).unwrap();
    store.register_maps("A@PERMANENT", &four_months()).unwrap();

    assert_eq!(store.remove_dataset("A@PERMANENT").unwrap(), 4);
    assert!(store.find_dataset("A@PERMANENT").unwrap().is_none());
    assert!(store.owner_of("a1@PERMANENT").unwrap().is_none());

    // Detached maps can join another dataset
    store.create_dataset(&absolute_dataset("B"), false).unwrap();
    assert_eq!(store.register_maps("B@PERMANENT", &four_months()).unwrap(), 4);

    assert!(matches!(
        store.remove_dataset("A@PERMANENT"),
        Err(Error::UnknownDataset { .. })
    ));
}

#[test]
fn test_file_database_persists_between_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("tgis.db");

    let mut store = TemporalDatabaseConnection::open(&path, "PERMANENT").unwrap();
    assert_eq!(schema_version(store.connection()).unwrap(), SCHEMA_VERSION);
    store.create_dataset(&absolute_dataset("A"), false).unwrap();
    store.register_maps("A@PERMANENT", &four_months()).unwrap();
    store.close().unwrap();

    let reopened = TemporalDatabaseConnection::open(&path, "PERMANENT").unwrap();
    let dataset = reopened.get_dataset("A@PERMANENT").unwrap();
    assert_eq!(dataset.aggregate.map_count, 4);
    assert_eq!(reopened.path(), Some(path.as_path()));
}

#[test]
fn test_empty_mapset_is_rejected() {
    assert!(matches!(
        TemporalDatabaseConnection::open_in_memory(" "),
        Err(Error::Configuration { .. })
    ));
}
