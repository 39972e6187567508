use domain::{DataType, StorageType};
use plcdash_registry::{
    ColumnRecord, NewColumn, NewPlc, NewTag, NewTagMapping, NewTable, Registry, RegistrySnapshot,
    TableRecord, TagMappingRecord, TagRecord,
};
use plcdash_resolver::{CompileError, SharedRouting, compile};

fn registry_with_fanout() -> (Registry, i64) {
    let registry = Registry::new();
    let plc = registry
        .create_plc(NewPlc {
            name: "line-1".to_string(),
            ip_address: "10.0.0.5".to_string(),
            rack: 0,
            slot: 2,
            active: true,
        })
        .expect("plc");
    let tag = registry
        .create_tag(NewTag {
            plc_id: plc.plc_id,
            name: "temp".to_string(),
            db_number: 1,
            byte_offset: 0,
            data_type: DataType::Float,
            can_write: false,
            scan_rate_ms: 1000,
            monitor_changes: true,
            active: true,
        })
        .expect("tag");
    let current = registry
        .create_table(NewTable {
            name: "current".to_string(),
            storage_type: StorageType::Permanent,
            retention_days: None,
        })
        .expect("permanent table");
    let history = registry
        .create_table(NewTable {
            name: "history".to_string(),
            storage_type: StorageType::Timeseries,
            retention_days: Some(7),
        })
        .expect("timeseries table");
    let current_col = registry
        .create_column(NewColumn {
            table_id: current.table_id,
            name: "temp".to_string(),
            data_type: DataType::Float,
            tag_id: Some(tag.tag_id),
            is_timestamp: false,
        })
        .expect("current column");
    registry
        .create_column(NewColumn {
            table_id: history.table_id,
            name: "ts".to_string(),
            data_type: DataType::Int,
            tag_id: None,
            is_timestamp: true,
        })
        .expect("ts column");
    let history_col = registry
        .create_column(NewColumn {
            table_id: history.table_id,
            name: "temp".to_string(),
            data_type: DataType::Float,
            tag_id: Some(tag.tag_id),
            is_timestamp: false,
        })
        .expect("history column");
    registry
        .create_mapping(NewTagMapping {
            tag_id: tag.tag_id,
            table_id: current.table_id,
            column_id: current_col.column_id,
        })
        .expect("permanent mapping");
    registry
        .create_mapping(NewTagMapping {
            tag_id: tag.tag_id,
            table_id: history.table_id,
            column_id: history_col.column_id,
        })
        .expect("timeseries mapping");
    (registry, tag.tag_id)
}

#[test]
fn compiles_fanout_routes() {
    let (registry, tag_id) = registry_with_fanout();
    let snapshot = registry.snapshot().expect("snapshot");
    let table = compile(&snapshot).expect("compile");

    let routes = table.routes_for(tag_id).expect("routes");
    assert_eq!(routes.len(), 2);
    let timeseries = routes
        .iter()
        .find(|target| target.storage_type == StorageType::Timeseries)
        .expect("timeseries route");
    assert_eq!(timeseries.retention_days, Some(7));
    assert!(timeseries.timestamp_column_id.is_some());
    assert_eq!(table.retention_rules().len(), 1);

    // 无路由标签：查询返回 None，而不是错误
    assert!(table.routes_for(9999).is_none());
}

fn tag(tag_id: i64, data_type: DataType) -> TagRecord {
    TagRecord {
        tag_id,
        plc_id: 1,
        name: format!("tag-{tag_id}"),
        db_number: 1,
        byte_offset: 0,
        data_type,
        can_write: false,
        scan_rate_ms: 1000,
        monitor_changes: false,
        active: true,
    }
}

fn column(column_id: i64, table_id: i64, data_type: DataType, is_timestamp: bool) -> ColumnRecord {
    ColumnRecord {
        column_id,
        table_id,
        name: format!("col-{column_id}"),
        data_type,
        tag_id: None,
        plc_id: None,
        is_timestamp,
    }
}

fn mapping(mapping_id: i64, tag_id: i64, table_id: i64, column_id: i64) -> TagMappingRecord {
    TagMappingRecord {
        mapping_id,
        tag_id,
        plc_id: 1,
        table_id,
        column_id,
        storage_type: StorageType::Permanent,
    }
}

/// 直接构造快照以覆盖注册表不会产出的非法组合。
fn raw_snapshot() -> RegistrySnapshot {
    let mut snapshot = RegistrySnapshot::default();
    snapshot.tables.insert(
        10,
        TableRecord {
            table_id: 10,
            name: "current".to_string(),
            storage_type: StorageType::Permanent,
            retention_days: None,
        },
    );
    snapshot.tags.insert(1, tag(1, DataType::Float));
    snapshot.columns.insert(20, column(20, 10, DataType::Float, false));
    snapshot
}

#[test]
fn rejects_type_mismatch() {
    let mut snapshot = raw_snapshot();
    snapshot.tags.insert(1, tag(1, DataType::String));
    snapshot.mappings.insert(100, mapping(100, 1, 10, 20));
    assert!(matches!(
        compile(&snapshot).expect_err("mismatch"),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn rejects_write_collision() {
    let mut snapshot = raw_snapshot();
    snapshot.tags.insert(2, tag(2, DataType::Float));
    snapshot.mappings.insert(100, mapping(100, 1, 10, 20));
    snapshot.mappings.insert(101, mapping(101, 2, 10, 20));
    assert!(matches!(
        compile(&snapshot).expect_err("collision"),
        CompileError::WriteCollision { column_id: 20, .. }
    ));
}

#[test]
fn rejects_dangling_reference() {
    let mut snapshot = raw_snapshot();
    snapshot.mappings.insert(100, mapping(100, 42, 10, 20));
    assert!(matches!(
        compile(&snapshot).expect_err("dangling"),
        CompileError::DanglingReference { kind: "tag", id: 42, .. }
    ));
}

#[test]
fn rejects_timeseries_without_timestamp_column() {
    let mut snapshot = raw_snapshot();
    snapshot.tables.insert(
        11,
        TableRecord {
            table_id: 11,
            name: "history".to_string(),
            storage_type: StorageType::Timeseries,
            retention_days: Some(7),
        },
    );
    snapshot.columns.insert(21, column(21, 11, DataType::Float, false));
    let mut bad = mapping(100, 1, 11, 21);
    bad.storage_type = StorageType::Timeseries;
    snapshot.mappings.insert(100, bad);
    assert!(matches!(
        compile(&snapshot).expect_err("no axis"),
        CompileError::MissingTimestampColumn { table_id: 11 }
    ));
}

#[test]
fn failed_recompile_keeps_previous_table() {
    let (registry, tag_id) = registry_with_fanout();
    let snapshot = registry.snapshot().expect("snapshot");
    let shared = SharedRouting::new(compile(&snapshot).expect("compile"));
    assert_eq!(shared.current().route_count(), 2);

    // 人为构造损坏的快照：编译失败，旧表继续生效
    let mut broken = (*snapshot).clone();
    broken.tags.clear();
    assert!(shared.recompile_from(&broken).is_err());
    assert_eq!(shared.current().route_count(), 2);
    assert!(shared.current().routes_for(tag_id).is_some());
}
