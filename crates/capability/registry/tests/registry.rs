use domain::{DataType, PlcStatus, StorageType};
use plcdash_registry::{
    NewColumn, NewPlc, NewTag, NewTagMapping, NewTable, PlcUpdate, Registry, RegistryError,
};

fn sample_plc(name: &str) -> NewPlc {
    NewPlc {
        name: name.to_string(),
        ip_address: "10.0.0.5".to_string(),
        rack: 0,
        slot: 2,
        active: true,
    }
}

fn sample_tag(plc_id: i64, name: &str, data_type: DataType) -> NewTag {
    NewTag {
        plc_id,
        name: name.to_string(),
        db_number: 1,
        byte_offset: 0,
        data_type,
        can_write: false,
        scan_rate_ms: 1000,
        monitor_changes: true,
        active: true,
    }
}

fn timeseries_table(name: &str) -> NewTable {
    NewTable {
        name: name.to_string(),
        storage_type: StorageType::Timeseries,
        retention_days: Some(30),
    }
}

fn permanent_table(name: &str) -> NewTable {
    NewTable {
        name: name.to_string(),
        storage_type: StorageType::Permanent,
        retention_days: None,
    }
}

fn value_column(table_id: i64, name: &str, data_type: DataType) -> NewColumn {
    NewColumn {
        table_id,
        name: name.to_string(),
        data_type,
        tag_id: None,
        is_timestamp: false,
    }
}

#[test]
fn crud_round_trip() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let tag = registry
        .create_tag(sample_tag(plc.plc_id, "temp", DataType::Float))
        .expect("tag");
    assert_eq!(tag.plc_id, plc.plc_id);

    let listed = registry.list_tags(plc.plc_id).expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "temp");

    let renamed = registry
        .update_plc(
            plc.plc_id,
            PlcUpdate {
                name: Some("line-1b".to_string()),
                ..PlcUpdate::default()
            },
        )
        .expect("update");
    assert_eq!(renamed.name, "line-1b");
    assert_eq!(renamed.status, PlcStatus::Unknown);
}

#[test]
fn tag_requires_existing_plc() {
    let registry = Registry::new();
    let err = registry
        .create_tag(sample_tag(99, "temp", DataType::Float))
        .expect_err("dangling plc");
    assert!(matches!(err, RegistryError::NotFound { kind: "plc", .. }));
}

#[test]
fn active_tag_requires_positive_scan_rate() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let mut tag = sample_tag(plc.plc_id, "temp", DataType::Float);
    tag.scan_rate_ms = 0;
    let err = registry.create_tag(tag).expect_err("zero scan rate");
    assert!(matches!(err, RegistryError::Invalid(_)));
}

#[test]
fn retention_iff_timeseries() {
    let registry = Registry::new();
    let mut table = timeseries_table("history");
    table.retention_days = None;
    assert!(matches!(
        registry.create_table(table).expect_err("missing retention"),
        RegistryError::Invalid(_)
    ));

    let mut table = permanent_table("current");
    table.retention_days = Some(7);
    assert!(matches!(
        registry.create_table(table).expect_err("stray retention"),
        RegistryError::Invalid(_)
    ));
}

#[test]
fn timestamp_column_unique_per_table() {
    let registry = Registry::new();
    let table = registry.create_table(timeseries_table("history")).expect("table");
    registry
        .create_column(NewColumn {
            table_id: table.table_id,
            name: "ts".to_string(),
            data_type: DataType::Int,
            tag_id: None,
            is_timestamp: true,
        })
        .expect("timestamp column");
    let err = registry
        .create_column(NewColumn {
            table_id: table.table_id,
            name: "ts2".to_string(),
            data_type: DataType::Int,
            tag_id: None,
            is_timestamp: true,
        })
        .expect_err("second timestamp column");
    assert!(matches!(err, RegistryError::Conflict(_)));
}

#[test]
fn mapping_uniqueness_and_collision() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let tag_a = registry
        .create_tag(sample_tag(plc.plc_id, "temp", DataType::Float))
        .expect("tag a");
    let tag_b = registry
        .create_tag(sample_tag(plc.plc_id, "pressure", DataType::Float))
        .expect("tag b");
    let table = registry.create_table(permanent_table("current")).expect("table");
    let column_a = registry
        .create_column(value_column(table.table_id, "temp", DataType::Float))
        .expect("column a");
    let column_b = registry
        .create_column(value_column(table.table_id, "pressure", DataType::Float))
        .expect("column b");

    registry
        .create_mapping(NewTagMapping {
            tag_id: tag_a.tag_id,
            table_id: table.table_id,
            column_id: column_a.column_id,
        })
        .expect("first mapping");

    // 同一 (tag, table) 第二条映射
    let err = registry
        .create_mapping(NewTagMapping {
            tag_id: tag_a.tag_id,
            table_id: table.table_id,
            column_id: column_b.column_id,
        })
        .expect_err("duplicate tag/table");
    assert!(matches!(err, RegistryError::Conflict(_)));

    // 另一标签写同一列
    let err = registry
        .create_mapping(NewTagMapping {
            tag_id: tag_b.tag_id,
            table_id: table.table_id,
            column_id: column_a.column_id,
        })
        .expect_err("write collision");
    assert!(matches!(err, RegistryError::WriteCollision { .. }));
}

#[test]
fn mapping_rejects_type_mismatch() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let tag = registry
        .create_tag(sample_tag(plc.plc_id, "running", DataType::Bool))
        .expect("tag");
    let table = registry.create_table(permanent_table("current")).expect("table");
    let column = registry
        .create_column(value_column(table.table_id, "count", DataType::Int))
        .expect("column");
    let err = registry
        .create_mapping(NewTagMapping {
            tag_id: tag.tag_id,
            table_id: table.table_id,
            column_id: column.column_id,
        })
        .expect_err("bool into int column");
    assert!(matches!(err, RegistryError::TypeMismatch { .. }));
}

#[test]
fn mapping_is_denormalized() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let tag = registry
        .create_tag(sample_tag(plc.plc_id, "temp", DataType::Int))
        .expect("tag");
    let table = registry.create_table(timeseries_table("history")).expect("table");
    let column = registry
        .create_column(value_column(table.table_id, "temp", DataType::Float))
        .expect("column");
    let mapping = registry
        .create_mapping(NewTagMapping {
            tag_id: tag.tag_id,
            table_id: table.table_id,
            column_id: column.column_id,
        })
        .expect("mapping");
    assert_eq!(mapping.plc_id, plc.plc_id);
    assert_eq!(mapping.storage_type, StorageType::Timeseries);
}

#[test]
fn status_survives_config_edit() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    registry
        .update_plc_status(plc.plc_id, PlcStatus::Online, 1_000)
        .expect("status");
    let edited = registry
        .update_plc(
            plc.plc_id,
            PlcUpdate {
                ip_address: Some("10.0.0.6".to_string()),
                ..PlcUpdate::default()
            },
        )
        .expect("edit");
    assert_eq!(edited.status, PlcStatus::Online);
    assert_eq!(edited.last_update_ms, Some(1_000));
}

#[test]
fn snapshot_is_point_in_time() {
    let registry = Registry::new();
    let plc = registry.create_plc(sample_plc("line-1")).expect("plc");
    let snapshot = registry.snapshot().expect("snapshot");
    let generation = snapshot.generation;

    registry
        .create_tag(sample_tag(plc.plc_id, "temp", DataType::Float))
        .expect("tag");

    // 已取出的快照不受后续编辑影响
    assert!(snapshot.tags.is_empty());
    let fresh = registry.snapshot().expect("fresh snapshot");
    assert_eq!(fresh.tags.len(), 1);
    assert!(fresh.generation > generation);
}

#[test]
fn generation_watch_fires_on_mutation() {
    let registry = Registry::new();
    let mut rx = registry.subscribe_generation();
    let before = *rx.borrow_and_update();
    registry.create_plc(sample_plc("line-1")).expect("plc");
    assert!(rx.has_changed().expect("watch alive"));
    assert!(*rx.borrow_and_update() > before);

    // 派生状态写入不触发配置代次
    let plc = registry.list_plcs().expect("list")[0].clone();
    registry
        .update_plc_status(plc.plc_id, PlcStatus::Online, 1)
        .expect("status");
    assert!(!rx.has_changed().expect("watch alive"));
}
