//! JSON wire-format checks: field names and `type` discriminators must
//! match exactly, since the lock journal is expected to be round-trip
//! compatible across implementations.

use lockbox_types::{
    Interval, LockGranularity, LockKind, PartialShardSpec, ShardSpec, TaskLock,
};

#[test]
fn task_lock_wire_fields_and_enum_tags() {
    let lease = TaskLock {
        kind: LockKind::Exclusive,
        granularity: LockGranularity::TimeChunk,
        group_id: "group-1".into(),
        data_source: "ds".into(),
        interval: Interval::new(0, 1000).unwrap(),
        version: "v1".into(),
        priority: 5,
        revoked: false,
        upgraded: false,
    };
    let json: serde_json::Value = serde_json::to_value(&lease).unwrap();
    assert_eq!(json["groupId"], "group-1");
    assert_eq!(json["dataSource"], "ds");
    assert_eq!(json["kind"], "EXCLUSIVE");
    assert_eq!(json["granularity"], "TIME_CHUNK");

    let round_tripped: TaskLock = serde_json::from_value(json).unwrap();
    assert_eq!(round_tripped, lease);
}

#[test]
fn shard_spec_tags_and_renamed_fields() {
    let numbered = ShardSpec::Numbered {
        partition_num: 3,
        num_core_partitions: 4,
    };
    let json = serde_json::to_value(&numbered).unwrap();
    assert_eq!(json["type"], "numbered");
    assert_eq!(json["partitionNum"], 3);
    assert_eq!(json["numCorePartitions"], 4);

    let single_dim = ShardSpec::SingleDim {
        partition_num: 1,
        dim: "host".into(),
        start: Some("c".into()),
        end: None,
    };
    let json = serde_json::to_value(&single_dim).unwrap();
    assert_eq!(json["type"], "single_dim");
    assert_eq!(json["dim"], "host");
    assert_eq!(json["start"], "c");
    assert!(json["end"].is_null());

    let round_tripped: ShardSpec = serde_json::from_value(json).unwrap();
    assert_eq!(round_tripped, single_dim);
}

#[test]
fn partial_shard_spec_tags_match_full_variants() {
    let partial = PartialShardSpec::Hashed {
        dims: vec!["host".into()],
        bucket_id: 2,
        num_buckets: 8,
    };
    let json = serde_json::to_value(&partial).unwrap();
    assert_eq!(json["type"], "hashed");
    assert_eq!(json["bucketId"], 2);
    assert_eq!(json["numBuckets"], 8);

    let round_tripped: PartialShardSpec = serde_json::from_value(json).unwrap();
    assert_eq!(round_tripped, partial);
}
