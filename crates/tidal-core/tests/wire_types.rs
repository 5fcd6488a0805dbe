use tidal_core::{
    decode_value, encode_value, Bound, Datetime, Decimal, Duration, Geometry, Point, Range,
    RecordId, Table, Uuid, Value,
};

#[test]
fn domain_values_survive_the_wire() {
    let uuid = Uuid::parse("0189d7e5-6b4b-7e2a-9b55-0a0b0c0d0e0f").expect("valid uuid");
    let params = Value::Array(vec![
        RecordId::new("person", "tobie").into(),
        Table::new("person").into(),
        uuid.into(),
        Datetime::new(1_700_000_000, 123).into(),
        Duration::parse("1d2h").expect("valid duration").into(),
        Decimal::parse("12.3400").expect("valid decimal").into(),
        Range::new(Bound::Included(1_i64.into()), Bound::Unbounded).into(),
        Geometry::Point(Point::new(51.5, -0.12)).into(),
        Value::Undefined,
    ]);

    let bytes = encode_value(&params).expect("params should encode");
    let decoded = decode_value(&bytes).expect("params should decode");
    let items = decoded.as_array().expect("array");

    assert_eq!(RecordId::try_from(&items[0]), Ok(RecordId::new("person", "tobie")));
    assert_eq!(Table::try_from(&items[1]), Ok(Table::new("person")));
    assert_eq!(Uuid::try_from(&items[2]), Ok(uuid));
    assert_eq!(Datetime::try_from(&items[3]), Ok(Datetime::new(1_700_000_000, 123)));
    assert_eq!(
        Duration::try_from(&items[4]).map(|d| d.to_string()),
        Ok("1d2h".to_string())
    );
    assert_eq!(
        Decimal::try_from(&items[5]).map(|d| d.to_string()),
        Ok("12.3400".to_string())
    );
    assert_eq!(
        Range::try_from(&items[6]),
        Ok(Range::new(Bound::Included(1_i64.into()), Bound::Unbounded))
    );
    assert_eq!(
        Geometry::try_from(&items[7]),
        Ok(Geometry::Point(Point::new(51.5, -0.12)))
    );
    assert_eq!(items[8], Value::Undefined);
}
