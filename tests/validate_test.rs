use tablecheck::{
    assert_valid, validate, Difference, Expected, Key, Predicate, RequiredFuzzy, RequiredUnique,
    Subject, Value,
};

#[test]
fn element_against_value() {
    assert!(validate(Value::text("foo"), "foo").is_ok());

    let err = validate(Value::text("foo"), "bar").unwrap_err();
    assert_eq!(
        err.differences().as_unkeyed().unwrap(),
        &[Difference::invalid_expected("foo", "bar")]
    );
}

#[test]
fn element_against_regex() {
    let re = Predicate::regex("^[A-Z]{2}$").unwrap();
    assert!(validate(Value::text("CA"), Expected::Predicate(re.clone())).is_ok());

    let err = validate(Value::text("cal"), Expected::Predicate(re)).unwrap_err();
    assert_eq!(err.message(), "does not satisfy /^[A-Z]{2}$/");
}

#[test]
fn group_against_set() {
    let data: Vec<Value> = vec!["a".into(), "b".into(), "c".into()];
    assert!(validate(data.clone(), Expected::set(["a", "b", "c"])).is_ok());

    let err = validate(data, Expected::set(["a", "b", "d"])).unwrap_err();
    assert_eq!(
        err.differences().as_unkeyed().unwrap(),
        &[Difference::missing("d"), Difference::extra("c")]
    );
}

#[test]
fn group_against_sequence_reports_positions() {
    let data: Vec<Value> = vec!["a".into(), "x".into()];
    let required: Vec<Value> = vec!["a".into(), "b".into()];
    let err = validate(data, required).unwrap_err();
    let diffs = err.differences().as_unkeyed().unwrap();
    assert_eq!(
        diffs,
        &[
            Difference::missing(Value::list([Value::Int(1), Value::text("b")])),
            Difference::extra(Value::list([Value::Int(1), Value::text("x")])),
        ]
    );
}

#[test]
fn mapping_against_mapping() {
    let data = Subject::mapping([
        ("precinct 1", Value::Int(100)),
        ("precinct 2", Value::Int(95)),
    ]);
    let required = Expected::mapping([("precinct 1", 100i64), ("precinct 2", 100i64)]);
    let err = validate(data, required).unwrap_err();
    let keyed = err.differences().as_keyed().unwrap();
    assert_eq!(keyed.len(), 1);
    assert_eq!(
        keyed[&Key::from("precinct 2")],
        vec![Difference::deviation(-5.0, 100)]
    );
}

#[test]
fn keyed_groups_against_single_requirement() {
    let data = Subject::mapping([
        ("a", Subject::Group(vec!["x".into(), "y".into()])),
        ("b", Subject::Group(vec!["x".into(), "z".into()])),
    ]);
    let err = validate(data, Expected::set(["x", "y"])).unwrap_err();
    let keyed = err.differences().as_keyed().unwrap();
    assert_eq!(keyed.len(), 1);
    assert_eq!(
        keyed[&Key::from("b")],
        vec![Difference::missing("y"), Difference::extra("z")]
    );
}

#[test]
fn custom_requirement() {
    let data: Vec<Value> = vec!["a".into(), "b".into(), "a".into()];
    let err = validate(data, Expected::custom(RequiredUnique)).unwrap_err();
    assert_eq!(err.message(), "elements should be unique");
    assert_eq!(
        err.differences().as_unkeyed().unwrap(),
        &[Difference::extra("a")]
    );
}

#[test]
fn fuzzy_requirement() {
    let data: Vec<Value> = vec!["Rockerville".into(), "Vandenburg".into()];
    let err = validate(data, Expected::custom(RequiredFuzzy::new("Rockville"))).unwrap_err();
    assert_eq!(
        err.differences().as_unkeyed().unwrap(),
        &[Difference::invalid("Vandenburg")]
    );
}

#[test]
fn error_message_is_readable() {
    let data: Vec<Value> = vec!["a".into()];
    let err = validate(data, Expected::set(["a", "b"])).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("does not satisfy set membership"));
    assert!(text.contains("Missing('b')"));
}

#[test]
fn assert_valid_macro_passes() {
    let data: Vec<Value> = vec!["a".into(), "b".into()];
    assert_valid!(data, Expected::set(["a", "b"]));
}

#[test]
#[should_panic(expected = "Missing('b')")]
fn assert_valid_macro_reports_differences() {
    let data: Vec<Value> = vec!["a".into()];
    assert_valid!(data, Expected::set(["a", "b"]));
}
