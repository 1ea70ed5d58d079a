//! Normalized integer properties

use feature_table::prelude::*;

#[test]
fn test_decoded_range() {
    for ty in ComponentType::ALL.into_iter().filter(|t| t.is_integer()) {
        let (min, max) = (ty.min_value(), ty.max_value());
        let samples = [min, min + 1.0, -1.0, 0.0, 1.0, (max / 2.0).floor(), max - 1.0, max];
        for raw in samples.into_iter().filter(|r| *r >= min && *r <= max) {
            let v = ty.normalize(raw);
            if ty.is_signed_integer() {
                assert!((-1.0..=1.0).contains(&v), "{ty}: {raw} -> {v}");
            } else {
                assert!((0.0..=1.0).contains(&v), "{ty}: {raw} -> {v}");
            }
        }
        assert_eq!(ty.normalize(max), 1.0, "{ty}");
    }
}

#[test]
fn test_normalized_table_round_trip() {
    let schema = TableSchema::from_value(serde_json::json!({
        "count": 4,
        "properties": {
            "weights": {"accessor": {"componentType": "INT16", "type": "MAT3", "count": 4, "normalized": true}}
        }
    }))
    .unwrap();
    let cache = ResourceCache::new(
        CacheConfig::new(url::Url::parse("https://example.com/").unwrap()),
        Arc::new(MemoryFetcher::new()),
    );
    let table = FeatureTable::new(&schema, &cache, &[], TableOptions::default()).unwrap();

    let m = DMat3::from_cols_array(&[-1.0, -0.5, -0.25, 0.0, 0.1, 0.25, 0.5, 0.75, 1.0]);
    table.set_property_value(3, "weights", m).unwrap();

    let mut out = PropertyValue::Mat3(DMat3::IDENTITY);
    assert!(table.get_property_value_into(3, "weights", &mut out).unwrap());
    let PropertyValue::Mat3(read) = out else {
        panic!("expected Mat3");
    };
    for (a, b) in read.to_cols_array().iter().zip(m.to_cols_array()) {
        assert!((a - b).abs() <= 1.0 / 32767.0);
    }
    assert_eq!(
        table.get_property_value(0, "weights").unwrap(),
        Some(PropertyValue::Mat3(DMat3::ZERO))
    );
}
