use tablecheck::{
    allowed_deviation, allowed_extra, allowed_key, allowed_limit, allowed_missing,
    allowed_percent_deviation, allowed_specific, allowed_where, validate, Difference, Expected,
    Key, Subject, Value,
};

fn town_counts(observed: [(&'static str, i64); 3]) -> Subject {
    Subject::mapping(observed.map(|(town, n)| (town, Value::Int(n))))
}

fn required_counts() -> Expected {
    Expected::mapping([("aaa", 100i64), ("bbb", 60i64), ("ccc", 20i64)])
}

#[test]
fn deviation_allowance_excuses_small_errors() {
    let data = town_counts([("aaa", 102), ("bbb", 59), ("ccc", 20)]);
    let err = validate(data, required_counts()).unwrap_err();
    assert!(allowed_deviation(3.0).apply(err).is_ok());
}

#[test]
fn deviation_allowance_keeps_large_errors() {
    let data = town_counts([("aaa", 110), ("bbb", 59), ("ccc", 20)]);
    let err = validate(data, required_counts()).unwrap_err();
    let err = allowed_deviation(3.0).apply(err).unwrap_err();
    let keyed = err.differences().as_keyed().unwrap();
    assert_eq!(keyed.len(), 1);
    assert_eq!(
        keyed[&Key::from("aaa")],
        vec![Difference::deviation(10.0, 100)]
    );
}

#[test]
fn percent_deviation_scales_with_expected() {
    let data = town_counts([("aaa", 102), ("bbb", 61), ("ccc", 21)]);
    let err = validate(data, required_counts()).unwrap_err();
    // Two percent excuses aaa and bbb but not the five percent gap on ccc.
    let err = allowed_percent_deviation(0.02).apply(err).unwrap_err();
    let keyed = err.differences().as_keyed().unwrap();
    assert_eq!(keyed.len(), 1);
    assert!(keyed.contains_key(&Key::from("ccc")));
}

#[test]
fn union_excuses_either_kind() {
    let data: Vec<Value> = vec!["a".into(), "x".into()];
    let err = validate(data, Expected::set(["a", "b"])).unwrap_err();
    assert!((allowed_missing() | allowed_extra()).apply(err).is_ok());
}

#[test]
fn intersection_with_key_scopes_an_allowance() {
    let data = town_counts([("aaa", 110), ("bbb", 70), ("ccc", 20)]);
    let err = validate(data, required_counts()).unwrap_err();
    let scoped = allowed_key(|k| k.values() == [Value::from("aaa")])
        & allowed_where(Difference::is_deviation);
    let err = scoped.apply(err).unwrap_err();
    let keyed = err.differences().as_keyed().unwrap();
    assert_eq!(keyed.len(), 1);
    assert!(keyed.contains_key(&Key::from("bbb")));
}

#[test]
fn specific_allowance_cancels_named_differences() {
    let data: Vec<Value> = vec!["a".into(), "x".into()];
    let err = validate(data, Expected::set(["a", "b"])).unwrap_err();
    let allowance = allowed_specific([Difference::missing("b"), Difference::extra("x")]);
    assert!(allowance.apply(err).is_ok());
}

#[test]
fn limit_is_all_or_nothing() {
    let data: Vec<Value> = vec!["a".into()];
    let err = validate(data.clone(), Expected::set(["a", "b"])).unwrap_err();
    assert!(allowed_limit(1).apply(err).is_ok());

    let err = validate(data, Expected::set(["a", "b", "c"])).unwrap_err();
    let err = allowed_limit(1).apply(err).unwrap_err();
    assert_eq!(err.differences().len(), 2);
}

#[test]
fn limit_union_covers_the_remainder() {
    let data: Vec<Value> = vec!["a".into(), "x".into()];
    let err = validate(data, Expected::set(["a", "b"])).unwrap_err();
    // Missing('b') is excused by the filter, Extra('x') by the limit.
    assert!((allowed_limit(1) | allowed_missing()).apply(err).is_ok());
}

#[test]
fn custom_message_survives_on_the_remainder() {
    let data: Vec<Value> = vec!["a".into(), "x".into()];
    let err = validate(data, Expected::set(["a", "b"])).unwrap_err();
    let err = allowed_missing()
        .with_message("unexpected town names")
        .apply(err)
        .unwrap_err();
    assert_eq!(err.message(), "unexpected town names");
}
